//! Event consumer: the inbound loop.
//!
//! ```text
//! loop:
//!   cancelled? ─► stop
//!   fetch(batch_size) with retry ─ failed ─► idle
//!   empty ─► idle
//!   spawn one task per event (each retried on its own) ─► wait for all
//! ```

use std::sync::Arc;
use std::time::Duration;

use narasla_core::cancel::{self, cancellable};
use narasla_core::config::ConsumerConfig;
use narasla_core::error::{NaraslaError, Result};
use narasla_core::retry::{self, RetryPolicy};
use narasla_core::traits::{Fetcher, Processor};
use narasla_core::types::Event;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct EventConsumer {
    fetcher: Arc<dyn Fetcher>,
    processor: Arc<dyn Processor>,
    batch_size: usize,
    retry: RetryPolicy,
    idle: Duration,
}

impl EventConsumer {
    pub fn new(fetcher: Arc<dyn Fetcher>, processor: Arc<dyn Processor>, batch_size: usize) -> Self {
        Self {
            fetcher,
            processor,
            batch_size,
            retry: RetryPolicy::default(),
            idle: Duration::from_secs(1),
        }
    }

    pub fn from_config(fetcher: Arc<dyn Fetcher>, processor: Arc<dyn Processor>, config: &ConsumerConfig) -> Self {
        Self::new(fetcher, processor, config.batch_size)
            .with_retry(config.retry_policy())
            .with_idle(config.idle())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Run until `cancel` fires. Only ever returns an error: `Cancelled` on
    /// shutdown.
    pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!("📥 Event consumer started (batch size {})", self.batch_size);

        loop {
            if cancel.is_cancelled() {
                tracing::info!("📥 Event consumer stopped");
                return Err(NaraslaError::Cancelled);
            }

            let fetched = self
                .retry
                .run(
                    &cancel,
                    || cancellable(&cancel, self.fetcher.fetch(self.batch_size)),
                    retry::classify,
                )
                .await;

            let batch = match fetched {
                Ok(batch) => batch,
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    tracing::warn!("consumer: fetch failed: {e}");
                    cancel::sleep(&cancel, self.idle).await?;
                    continue;
                }
            };

            if batch.is_empty() {
                cancel::sleep(&cancel, self.idle).await?;
                continue;
            }

            tracing::debug!("consumer: got {} events", batch.len());
            self.dispatch(&cancel, batch).await;
        }
    }

    /// One task per event; returns once every task has finished.
    async fn dispatch(&self, cancel: &CancellationToken, batch: Vec<Event>) {
        let mut tasks = JoinSet::new();

        for event in batch {
            let processor = Arc::clone(&self.processor);
            let policy = self.retry;
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let res = policy
                    .run(&cancel, || cancellable(&cancel, processor.process(&event)), retry::classify)
                    .await;
                match res {
                    Ok(()) | Err(NaraslaError::Cancelled) => {}
                    Err(e) => tracing::warn!("consumer: can't handle event: {e}"),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("consumer: event task panicked: {e}");
            }
        }
    }
}
