//! CLI entry point for fwfetch.

use std::process::ExitCode;

use clap::Parser;

mod app;
mod cli;

use cli::Cli;

/// How the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every job succeeded, or there was nothing to do.
    Success,
    /// Some jobs succeeded and some failed.
    Partial,
    /// Every job failed, the run was interrupted, or setup failed.
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse before tracing so --help works without logs.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return if error.use_stderr() {
                ExitCode::from(ProcessExit::Failure.code())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match app::runtime::run_fwfetch(cli).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
