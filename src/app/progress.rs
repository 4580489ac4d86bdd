//! Progress bar for fetch runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the progress bar when `enabled`.
///
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When disabled, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    enabled: bool,
    processed: Arc<AtomicUsize>,
    total: usize,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !enabled {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_bar(processed, total, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_bar(
    processed: Arc<AtomicUsize>,
    total: usize,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message("fetching firmware");
        bar.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            bar.set_position(processed.load(Ordering::SeqCst).min(total) as u64);
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        bar.finish_and_clear();
    })
}
