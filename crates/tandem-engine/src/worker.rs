//! Asynchronous event worker.
//!
//! Polls the event log for unprocessed rows, dispatches them through the
//! processor registry, and marks them processed. The queue hand-off is
//! at-least-once: a worker that dies mid-run leaves its claim to expire and
//! the event is redelivered, which is safe because every downstream
//! mutation is idempotent. The triggering request never waits on any of
//! this — `record_event` returns as soon as the row commits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use tandem_core::{defaults, Event, EventRepository, Result};

use crate::dispatcher::Dispatcher;

/// Configuration for the event worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the log is drained.
    pub poll_interval_ms: u64,
    /// Maximum number of events processed concurrently.
    pub max_concurrent_events: usize,
    /// Whether to enable event processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            max_concurrent_events: defaults::WORKER_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `EVENT_WORKER_ENABLED` | `true` | Enable/disable event processing |
    /// | `EVENT_MAX_CONCURRENT` | `4` | Max concurrent events |
    /// | `EVENT_POLL_INTERVAL_MS` | `500` | Polling interval when the log is drained |
    pub fn from_env() -> Self {
        let enabled = std::env::var("EVENT_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_events = std::env::var("EVENT_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("EVENT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_events,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent events.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_events = max;
        self
    }

    /// Enable or disable event processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Lifecycle event emitted by the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// An event claim started processing.
    EventStarted { event_id: Uuid },
    /// An event was fully processed.
    EventProcessed { event_id: Uuid },
    /// Processing failed; the event stays unprocessed for redelivery.
    EventFailed { event_id: Uuid, error: String },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| tandem_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Event worker that drains the event log.
pub struct EventWorker {
    dispatcher: Arc<Dispatcher>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl EventWorker {
    /// Create a new event worker over a dispatcher.
    pub fn new(dispatcher: Dispatcher, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::WORKER_EVENT_CAPACITY);
        Self {
            dispatcher: Arc::new(dispatcher),
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of events awaiting processing.
    pub async fn backlog(&self) -> Result<i64> {
        self.dispatcher.store().events.unprocessed_count().await
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let worker = Arc::new(self);
        let worker_clone = worker.clone();

        tokio::spawn(async move {
            worker_clone.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent event processing.
    ///
    /// Claims up to `max_concurrent_events` at a time and processes them
    /// concurrently. Only sleeps when the log is drained.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Event worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_events,
            "Event worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent_events;

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Event worker received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..max_concurrent {
                match self.claim_event().await {
                    Some(event) => {
                        claimed += 1;
                        let dispatcher = self.dispatcher.clone();
                        let event_tx = self.event_tx.clone();
                        tasks.spawn(async move {
                            process_event(dispatcher, event_tx, event).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                // Log drained — sleep before polling again.
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Event worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent event batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Event task panicked");
                    }
                }
                // No sleep — immediately try to claim more events.
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Event worker stopped");
    }

    /// Claim the next unprocessed event without processing it.
    async fn claim_event(&self) -> Option<Event> {
        match self
            .dispatcher
            .store()
            .events
            .claim_next_unprocessed()
            .await
        {
            Ok(Some(event)) => Some(event),
            Ok(None) => None,
            Err(e) => {
                error!(error = ?e, "Failed to claim event");
                None
            }
        }
    }
}

/// Dispatch one claimed event and record the outcome.
async fn process_event(
    dispatcher: Arc<Dispatcher>,
    event_tx: broadcast::Sender<WorkerEvent>,
    event: Event,
) {
    let start = Instant::now();
    let event_id = event.id;

    info!(
        event_id = %event_id,
        subject_kind = %event.subject.kind,
        action = %event.action,
        "Processing event"
    );
    let _ = event_tx.send(WorkerEvent::EventStarted { event_id });

    match dispatcher.dispatch(&event).await {
        Ok(_) => {
            if let Err(e) = dispatcher.store().events.mark_processed(event_id).await {
                error!(error = ?e, event_id = %event_id, "Failed to mark event processed");
            } else {
                debug!(
                    event_id = %event_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Event processed"
                );
                let _ = event_tx.send(WorkerEvent::EventProcessed { event_id });
            }
        }
        Err(error) => {
            // Leave the event unprocessed: the claim expires and the event
            // is redelivered with backoff by the reclaim window.
            warn!(
                event_id = %event_id,
                %error,
                duration_ms = start.elapsed().as_millis() as u64,
                "Event processing failed; leaving for redelivery"
            );
            let _ = event_tx.send(WorkerEvent::EventFailed {
                event_id,
                error: error.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, defaults::WORKER_POLL_INTERVAL_MS);
        assert_eq!(config.max_concurrent_events, 4);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(1000)
            .with_max_concurrent(8)
            .with_enabled(false);

        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.max_concurrent_events, 8);
        assert!(!config.enabled);
    }

    #[test]
    fn test_worker_config_chaining_order_independence() {
        let config1 = WorkerConfig::default()
            .with_enabled(false)
            .with_max_concurrent(10)
            .with_poll_interval(3000);

        let config2 = WorkerConfig::default()
            .with_poll_interval(3000)
            .with_enabled(false)
            .with_max_concurrent(10);

        assert_eq!(config1.poll_interval_ms, config2.poll_interval_ms);
        assert_eq!(config1.max_concurrent_events, config2.max_concurrent_events);
        assert_eq!(config1.enabled, config2.enabled);
    }

    #[test]
    fn test_worker_event_variants() {
        let event_id = Uuid::new_v4();
        let event = WorkerEvent::EventFailed {
            event_id,
            error: "boom".to_string(),
        };
        match event {
            WorkerEvent::EventFailed { event_id: id, error } => {
                assert_eq!(id, event_id);
                assert_eq!(error, "boom");
            }
            _ => panic!("Wrong event variant"),
        }

        assert!(matches!(WorkerEvent::WorkerStarted, WorkerEvent::WorkerStarted));
        assert!(matches!(WorkerEvent::WorkerStopped, WorkerEvent::WorkerStopped));
    }
}
