//! Outbox draining.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{RwLock, watch};

use super::{InventoryNotification, OutboxMessage};
use crate::config::InventoryConfig;
use crate::error::RepositoryError;
use crate::repository::InventoryRepository;

/// Delivery failure reported by a sink.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Destination for outbound notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, message: &OutboxMessage) -> Result<(), SinkError>;
}

/// Sink that writes each notification to the log.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, message: &OutboxMessage) -> Result<(), SinkError> {
        let payload =
            serde_json::to_string(&message.notification).map_err(|e| SinkError(e.to_string()))?;
        tracing::info!(
            message_id = %message.id,
            event_type = message.notification.event_type(),
            %payload,
            "inventory notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemorySinkState {
    delivered: Vec<InventoryNotification>,
    fail: bool,
}

/// Sink that keeps delivered notifications in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    state: Arc<RwLock<InMemorySinkState>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent deliveries fail until reset.
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    pub async fn delivered(&self) -> Vec<InventoryNotification> {
        self.state.read().await.delivered.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemorySink {
    async fn deliver(&self, message: &OutboxMessage) -> Result<(), SinkError> {
        let mut state = self.state.write().await;
        if state.fail {
            return Err(SinkError("sink unavailable".to_string()));
        }
        state.delivered.push(message.notification.clone());
        Ok(())
    }
}

/// Counts from one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub dispatched: usize,
    pub failed: usize,
}

/// Drains pending outbox messages to a sink.
pub struct OutboxDispatcher<R: InventoryRepository, S: NotificationSink> {
    repository: Arc<R>,
    sink: S,
    batch_size: usize,
    max_attempts: u32,
    interval: Duration,
}

impl<R: InventoryRepository, S: NotificationSink> OutboxDispatcher<R, S> {
    pub fn new(repository: Arc<R>, sink: S, config: &InventoryConfig) -> Self {
        Self {
            repository,
            sink,
            batch_size: config.outbox_batch_size,
            max_attempts: config.outbox_max_attempts,
            interval: config.outbox_interval,
        }
    }

    /// Delivers one batch of pending messages.
    ///
    /// A message that fails stays pending with its attempt count raised;
    /// after `max_attempts` it is no longer picked up.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_pending(&self) -> Result<DispatchSummary, RepositoryError> {
        let pending = self
            .repository
            .pending_outbox(self.batch_size, self.max_attempts)
            .await?;

        let mut summary = DispatchSummary::default();
        for message in pending {
            match self.sink.deliver(&message).await {
                Ok(()) => {
                    self.repository
                        .mark_dispatched(message.id, Utc::now())
                        .await?;
                    metrics::counter!("outbox_dispatched_total").increment(1);
                    summary.dispatched += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        attempts = message.attempts + 1,
                        error = %e,
                        "notification delivery failed"
                    );
                    self.repository
                        .mark_failed(message.id, &e.to_string())
                        .await?;
                    metrics::counter!("outbox_dispatch_failures_total").increment(1);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Runs until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_pending().await {
                        tracing::error!(error = %e, "outbox dispatch pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("outbox dispatcher stopped");
                        break;
                    }
                }
            }
        }
    }
}
