//! Long-running queue consumer with explicit admission control.
//!
//! At most `concurrency` units are processed at once. A message is deleted
//! only after its unit was emitted or skipped; failed messages are left alone
//! and reappear once their visibility timeout lapses.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::adapters::log_query::LogInsights;
use crate::adapters::queue::{MessageSource, ReceivedMessage, MAX_RECEIVE_BATCH};
use crate::adapters::record_sink::RecordSink;
use crate::adapters::AdapterError;
use crate::handlers::worker::{handle_message_body, WorkOutcome, WorkerSettings};

const COMPONENT: &str = "queue_dispatcher";

/// Pause after an empty or failed receive before asking again.
const IDLE_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: usize,
    pub emitted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchStats {
    fn record(&mut self, settled: Result<Settlement, JoinError>) {
        match settled {
            Ok(Settlement::Emitted) => self.emitted += 1,
            Ok(Settlement::Skipped) => self.skipped += 1,
            Ok(Settlement::Failed) => self.failed += 1,
            Err(error) => {
                tracing::error!(
                    component = COMPONENT,
                    event = "worker_task_aborted",
                    error = %error,
                );
                self.failed += 1;
            }
        }
    }

    fn absorb(&mut self, other: DispatchStats) {
        self.received += other.received;
        self.emitted += other.emitted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Emitted,
    Skipped,
    Failed,
}

pub struct Dispatcher<M, L, S> {
    source: Arc<M>,
    insights: Arc<L>,
    sink: Arc<S>,
    settings: WorkerSettings,
    permits: Arc<Semaphore>,
}

impl<M, L, S> Dispatcher<M, L, S>
where
    M: MessageSource + 'static,
    L: LogInsights + 'static,
    S: RecordSink + 'static,
{
    pub fn new(
        source: Arc<M>,
        insights: Arc<L>,
        sink: Arc<S>,
        settings: WorkerSettings,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            insights,
            sink,
            settings,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Receives one batch, processes it under the concurrency cap and waits
    /// for every unit of it to settle.
    pub async fn run_once(&self) -> Result<DispatchStats, AdapterError> {
        let batch = self.permits.available_permits().clamp(1, MAX_RECEIVE_BATCH);
        let messages = self.source.receive(batch).await?;

        let mut stats = DispatchStats {
            received: messages.len(),
            ..DispatchStats::default()
        };
        let mut tasks = JoinSet::new();
        for message in messages {
            let permit = self.admit().await?;
            self.spawn_settlement(&mut tasks, message, permit);
        }
        while let Some(settled) = tasks.join_next().await {
            stats.record(settled);
        }
        Ok(stats)
    }

    /// Keeps receiving while permits are free until `shutdown` resolves, then
    /// waits for in-flight units to settle.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> DispatchStats {
        tokio::pin!(shutdown);
        let mut stats = DispatchStats::default();
        let mut tasks = JoinSet::new();

        tracing::info!(
            component = COMPONENT,
            event = "dispatcher_started",
            concurrency = self.permits.available_permits(),
        );

        loop {
            while let Some(settled) = tasks.try_join_next() {
                stats.record(settled);
            }

            let free = self.permits.available_permits();
            if free == 0 {
                tokio::select! {
                    _ = &mut shutdown => break,
                    Some(settled) = tasks.join_next() => stats.record(settled),
                }
                continue;
            }

            let received = tokio::select! {
                _ = &mut shutdown => break,
                received = self.source.receive(free.min(MAX_RECEIVE_BATCH)) => received,
            };

            match received {
                Ok(messages) if messages.is_empty() => tokio::time::sleep(IDLE_PAUSE).await,
                Ok(messages) => {
                    stats.absorb(DispatchStats {
                        received: messages.len(),
                        ..DispatchStats::default()
                    });
                    for message in messages {
                        match self.admit().await {
                            Ok(permit) => self.spawn_settlement(&mut tasks, message, permit),
                            // Unadmitted messages stay hidden until their
                            // visibility lapses.
                            Err(error) => {
                                tracing::error!(
                                    component = COMPONENT,
                                    event = "admission_failed",
                                    error = %error,
                                );
                                stats.failed += 1;
                            }
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        component = COMPONENT,
                        event = "receive_failed",
                        error = %error,
                    );
                    tokio::time::sleep(IDLE_PAUSE).await;
                }
            }
        }

        while let Some(settled) = tasks.join_next().await {
            stats.record(settled);
        }
        tracing::info!(
            component = COMPONENT,
            event = "dispatcher_stopped",
            received = stats.received,
            emitted = stats.emitted,
            skipped = stats.skipped,
            failed = stats.failed,
        );
        stats
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit, AdapterError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AdapterError::new("dispatcher admission semaphore is closed"))
    }

    fn spawn_settlement(
        &self,
        tasks: &mut JoinSet<Settlement>,
        message: ReceivedMessage,
        permit: OwnedSemaphorePermit,
    ) {
        let source = Arc::clone(&self.source);
        let insights = Arc::clone(&self.insights);
        let sink = Arc::clone(&self.sink);
        let settings = self.settings;

        tasks.spawn(async move {
            let settlement = settle_message(
                &message,
                source.as_ref(),
                insights.as_ref(),
                sink.as_ref(),
                settings,
            )
            .await;
            drop(permit);
            settlement
        });
    }
}

async fn settle_message(
    message: &ReceivedMessage,
    source: &impl MessageSource,
    insights: &impl LogInsights,
    sink: &impl RecordSink,
    settings: WorkerSettings,
) -> Settlement {
    let outcome = match handle_message_body(&message.body, settings, insights, sink, Utc::now())
        .await
    {
        Ok(outcome) => outcome,
        // Already logged by the worker; leaving the message un-acknowledged
        // hands it back to the queue.
        Err(_) => return Settlement::Failed,
    };

    if let Err(error) = source.acknowledge(&message.receipt).await {
        tracing::warn!(
            component = COMPONENT,
            event = "acknowledge_failed",
            outcome = outcome.as_str(),
            error = %error,
        );
        return Settlement::Failed;
    }

    match outcome {
        WorkOutcome::Emitted { .. } => Settlement::Emitted,
        WorkOutcome::LogGroupMissing | WorkOutcome::NoResults => Settlement::Skipped,
    }
}
