//! Exit code logic for the fwfetch process.

use crate::ProcessExit;

/// Maps a finished run to the process exit outcome.
///
/// An interrupted run is a failure regardless of what completed.
pub(crate) fn determine_exit_outcome(succeeded: usize, failed: usize, interrupted: bool) -> ProcessExit {
    if interrupted {
        ProcessExit::Failure
    } else if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}
