//! Periodic expiry of lapsed allocations.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::{AllocationEngine, ExpirySummary};
use crate::config::InventoryConfig;
use crate::error::Result;
use crate::repository::InventoryRepository;

/// Cancels PENDING allocations past their expiry, with reason `EXPIRED`.
pub struct AllocationSweeper<R> {
    engine: AllocationEngine<R>,
    interval: Duration,
    batch_size: usize,
}

impl<R: InventoryRepository> AllocationSweeper<R> {
    pub fn new(engine: AllocationEngine<R>, config: &InventoryConfig) -> Self {
        Self {
            engine,
            interval: config.sweeper_interval,
            batch_size: config.sweeper_batch_size,
        }
    }

    /// Runs one pass over allocations due now.
    pub async fn sweep_once(&self) -> Result<ExpirySummary> {
        self.engine.expire_due(Utc::now(), self.batch_size).await
    }

    /// Runs until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        // A full batch means more may be due; keep going.
                        Ok(summary) if summary.expired >= self.batch_size => {
                            ticker.reset_immediately();
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "allocation expiry pass failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("allocation sweeper stopped");
                        break;
                    }
                }
            }
        }
    }
}
