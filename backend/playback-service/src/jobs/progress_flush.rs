use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::services::{FlushReport, SessionManager};

/// Flush interval for buffered progress updates.
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Background job that moves buffered progress into the durable store.
///
/// Each tick drains the pending map in one swap and persists every entry on
/// its own. On shutdown one last flush runs before the task exits.
#[derive(Clone)]
pub struct ProgressFlushJob {
    sessions: Arc<SessionManager>,
    interval: Duration,
}

impl ProgressFlushJob {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the flush loop until `shutdown` fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Progress flush job started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
                _ = shutdown.changed() => {
                    let report = self.flush_once().await;
                    info!(persisted = report.persisted, retried = report.retried, "Progress flush job stopped after final flush");
                    return;
                }
            }
        }
    }

    /// Spawn the flush loop as a Tokio task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn flush_once(&self) -> FlushReport {
        let report = self.sessions.flush_pending().await;
        if report.retried > 0 || report.superseded > 0 {
            warn!(
                persisted = report.persisted,
                retried = report.retried,
                superseded = report.superseded,
                "Progress flush finished with failures"
            );
        } else if !report.is_empty() {
            debug!(persisted = report.persisted, "Progress flushed");
        }
        report
    }
}
