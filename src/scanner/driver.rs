use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    time::{sleep_until, Instant},
};

use crate::{config::ScannerConfig, infrastructure::shutdown::ShutdownListener};

use super::{ChangeFeed, Completion, FeedScanner, ScanTrigger};

/// Event loop around a [`FeedScanner`]. Feed batches push a debounced scan
/// deadline forward; settings changes and rescan ticks may scan right away.
pub struct ScannerTask {
    scanner: FeedScanner,
    completions: mpsc::UnboundedReceiver<Completion>,
    debounce: Duration,
    initial_delay: Duration,
}

impl ScannerTask {
    pub fn new(
        scanner: FeedScanner,
        completions: mpsc::UnboundedReceiver<Completion>,
        config: &ScannerConfig,
    ) -> Self {
        Self::with_timing(scanner, completions, config.debounce, config.initial_delay)
    }

    pub fn with_timing(
        scanner: FeedScanner,
        completions: mpsc::UnboundedReceiver<Completion>,
        debounce: Duration,
        initial_delay: Duration,
    ) -> Self {
        Self {
            scanner,
            completions,
            debounce,
            initial_delay,
        }
    }

    /// Runs until shutdown, or until the feed has closed and every
    /// dispatched unit has been answered. Hands the scanner back.
    pub async fn run<F>(
        self,
        mut feed: F,
        mut settings: watch::Receiver<u64>,
        mut rescans: mpsc::UnboundedReceiver<()>,
        mut shutdown: ShutdownListener,
    ) -> FeedScanner
    where
        F: ChangeFeed,
    {
        let Self {
            mut scanner,
            mut completions,
            debounce,
            initial_delay,
        } = self;
        let mut deadline = Some(Instant::now() + initial_delay);
        let mut backend_ready = false;
        let mut feed_open = true;
        let mut settings_open = true;

        tracing::info!(
            target: "scanner",
            debounce_ms = debounce.as_millis() as u64,
            initial_delay_ms = initial_delay.as_millis() as u64,
            "scanner started"
        );

        loop {
            if !feed_open && deadline.is_none() && scanner.pending() == 0 {
                tracing::info!(target: "scanner", tracked = scanner.table().len(), "feed closed; scanner drained");
                break;
            }

            let mut scan_now = false;
            tokio::select! {
                _ = shutdown.notified() => break,
                batch = feed.next_batch(), if feed_open => match batch {
                    Some(batch) => {
                        if scanner.observe(batch) > 0 {
                            deadline = Some(Instant::now() + debounce);
                        }
                    }
                    None => feed_open = false,
                },
                Some(completion) = completions.recv() => scanner.apply_completion(completion),
                changed = settings.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                    } else {
                        match scanner.reload_settings() {
                            ScanTrigger::Immediate => scan_now = true,
                            ScanTrigger::Debounced => deadline = Some(Instant::now() + debounce),
                            ScanTrigger::None => {}
                        }
                    }
                }
                Some(()) = rescans.recv() => scan_now = true,
                _ = wait_until(deadline) => scan_now = true,
            }

            if scan_now {
                deadline = None;
                if !scan(&mut scanner, &mut backend_ready).await {
                    deadline = Some(Instant::now() + debounce);
                }
            }
        }
        scanner
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Returns `false` when the scan has to be retried later.
async fn scan(scanner: &mut FeedScanner, backend_ready: &mut bool) -> bool {
    if !scanner.is_enabled() {
        return true;
    }
    if !*backend_ready {
        *backend_ready = scanner.backend_ready().await;
        if !*backend_ready {
            tracing::debug!(target: "scanner", "classifier not ready; postponing scan");
            return false;
        }
        tracing::info!(target: "scanner", "classifier ready");
    }
    scanner.scan_pass();
    true
}
