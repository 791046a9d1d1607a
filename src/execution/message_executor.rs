//! # Message Action Executor
//!
//! Executes commands by posting correlated messages to the input processor and
//! waiting on a watchdog for the response the output processor delivers.
//!
//! ```text
//! commit/rollback ─▶ send ─▶ [input queue] ─▶ InputProcessor ─▶ worker task
//!        ▲                                                         │
//!        └── receive ◀── MessageWatchdog ◀── OutputProcessor ◀─ [output queue]
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::action_executor::ActionExecutor;
use crate::commands::CommandError;
use crate::config::EngineConfig;
use crate::constants::messaging::{INPUT_PROCESSOR_NAME, OUTPUT_PROCESSOR_NAME};
use crate::context::ExecutionContext;
use crate::error::{CampusError, Result};
use crate::messaging::{
    CommandMessage, Direction, InputProcessor, MessageWatchdog, MessagingError, OutputProcessor,
    ProcessorStatus, TransportFrame, WatchdogStatus,
};
use crate::registry::CommandRegistry;

struct Transport {
    input: mpsc::Sender<TransportFrame>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

#[derive(Debug, Default)]
struct ExecutorCounters {
    sent: AtomicU64,
    completed: AtomicU64,
    expired: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time view of the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub sent: u64,
    pub completed: u64,
    pub expired: u64,
    pub rejected: u64,
    pub in_flight: usize,
    pub input_active: bool,
    pub output_active: bool,
    pub available_workers: usize,
}

/// Action executor backed by the in-process message transport
pub struct MessageActionExecutor {
    registry: Arc<CommandRegistry>,
    config: EngineConfig,
    in_flight: Arc<DashMap<String, Arc<MessageWatchdog>>>,
    input_status: Arc<ProcessorStatus>,
    output_status: Arc<ProcessorStatus>,
    worker_pool: Arc<Semaphore>,
    transport: Mutex<Option<Transport>>,
    counters: ExecutorCounters,
}

impl MessageActionExecutor {
    pub fn new(registry: Arc<CommandRegistry>, config: EngineConfig) -> Self {
        let worker_pool = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        Self {
            registry,
            config,
            in_flight: Arc::new(DashMap::new()),
            input_status: Arc::new(ProcessorStatus::new(INPUT_PROCESSOR_NAME)),
            output_status: Arc::new(ProcessorStatus::new(OUTPUT_PROCESSOR_NAME)),
            worker_pool,
            transport: Mutex::new(None),
            counters: ExecutorCounters::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start both processors and wait until each reports it is running
    pub async fn start(&self) -> Result<()> {
        let (input_ready, output_ready) = {
            let mut transport = self.transport.lock();
            if transport.is_some() {
                return Err(MessagingError::lifecycle("message executor already running").into());
            }

            let capacity = self.config.input_queue_capacity;
            let (input_tx, input_rx) = mpsc::channel(capacity);
            let (output_tx, output_rx) = mpsc::channel(capacity);
            let (input_ready_tx, input_ready_rx) = oneshot::channel();
            let (output_ready_tx, output_ready_rx) = oneshot::channel();

            let input = InputProcessor::new(
                input_rx,
                output_tx,
                self.registry.clone(),
                self.worker_pool.clone(),
                self.input_status.clone(),
                self.config.encode_messages,
            );
            let output =
                OutputProcessor::new(output_rx, self.in_flight.clone(), self.output_status.clone());

            let handles = vec![
                (OUTPUT_PROCESSOR_NAME, tokio::spawn(output.run(output_ready_tx))),
                (INPUT_PROCESSOR_NAME, tokio::spawn(input.run(input_ready_tx))),
            ];
            *transport = Some(Transport {
                input: input_tx,
                handles,
            });
            (input_ready_rx, output_ready_rx)
        };

        let ready = tokio::time::timeout(self.config.shutdown_timeout(), async move {
            input_ready.await.is_ok() && output_ready.await.is_ok()
        })
        .await;

        match ready {
            Ok(true) => {
                info!(
                    worker_pool_size = self.config.worker_pool_size,
                    encode_messages = self.config.encode_messages,
                    "Message executor started"
                );
                Ok(())
            }
            Ok(false) => Err(CampusError::MessagingError(
                "processor exited before reporting ready".to_string(),
            )),
            Err(_) => Err(CampusError::MessagingError(format!(
                "processors not ready within {}ms",
                self.config.shutdown_timeout_ms
            ))),
        }
    }

    /// Push the last-message sentinel and wait for both processors to stop
    pub async fn stop(&self) -> Result<()> {
        let Some(transport) = self.transport.lock().take() else {
            debug!("Message executor already stopped");
            return Ok(());
        };

        let sentinel = TransportFrame::Message(Box::new(CommandMessage::last_message()));
        if transport.input.send(sentinel).await.is_err() {
            warn!("Input processor already gone while stopping");
        }
        drop(transport.input);

        for (name, handle) in transport.handles {
            match tokio::time::timeout(self.config.shutdown_timeout(), handle).await {
                Ok(Ok(())) => debug!(processor = name, "Processor stopped"),
                Ok(Err(join_error)) => {
                    error!(processor = name, error = %join_error, "Processor task failed");
                }
                Err(_) => {
                    return Err(MessagingError::ShutdownTimeout {
                        processor: name.to_string(),
                        timeout_ms: self.config.shutdown_timeout_ms,
                    }
                    .into())
                }
            }
        }

        if self.input_status.is_active() || self.output_status.is_active() {
            return Err(MessagingError::lifecycle("processors still active after stop").into());
        }

        info!(in_flight = self.in_flight.len(), "Message executor stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.transport.lock().is_some()
            && self.input_status.is_active()
            && self.output_status.is_active()
    }

    /// Register a watchdog for `message` and queue it for the input processor
    pub fn send(&self, message: CommandMessage) -> std::result::Result<(), MessagingError> {
        let sender = self
            .transport
            .lock()
            .as_ref()
            .map(|transport| transport.input.clone())
            .ok_or_else(|| MessagingError::processor_inactive(INPUT_PROCESSOR_NAME))?;
        if !self.input_status.is_active() {
            return Err(MessagingError::processor_inactive(INPUT_PROCESSOR_NAME));
        }

        let correlation_id = message.correlation_id.clone();
        match self.in_flight.entry(correlation_id.clone()) {
            Entry::Occupied(_) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(MessagingError::duplicate_correlation(correlation_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(MessageWatchdog::new(
                    message.clone(),
                    self.config.watchdog_timeout(),
                    self.config.watchdog_poll_interval(),
                )));
            }
        }

        let frame = TransportFrame::pack(message, self.config.encode_messages);
        if let Err(e) = sender.try_send(frame) {
            self.in_flight.remove(&correlation_id);
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(match e {
                TrySendError::Full(_) => {
                    MessagingError::queue_rejected(INPUT_PROCESSOR_NAME, "input queue is full")
                }
                TrySendError::Closed(_) => MessagingError::processor_inactive(INPUT_PROCESSOR_NAME),
            });
        }

        self.counters.sent.fetch_add(1, Ordering::Relaxed);
        debug!(correlation_id = %correlation_id, "Command message queued");
        Ok(())
    }

    /// Wait for the response to `correlation_id`; `None` when nothing is in flight under it
    pub async fn receive(&self, command_id: &str, correlation_id: &str) -> Option<CommandMessage> {
        let watchdog = self
            .in_flight
            .get(correlation_id)
            .map(|entry| entry.value().clone());
        let Some(watchdog) = watchdog else {
            warn!(
                command_id = %command_id,
                correlation_id = %correlation_id,
                "No message in flight for correlation id"
            );
            return None;
        };

        let response = watchdog.wait_for_message_complete().await;
        self.in_flight.remove(correlation_id);

        match watchdog.status() {
            WatchdogStatus::Expired => {
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                warn!(
                    command_id = %command_id,
                    correlation_id = %correlation_id,
                    elapsed_ms = watchdog.elapsed().as_millis() as u64,
                    "Command response timed out"
                );
            }
            _ => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
        }

        if response.command_id() != command_id {
            warn!(
                expected = %command_id,
                actual = %response.command_id(),
                correlation_id = %correlation_id,
                "Response names a different command"
            );
        }
        Some(response)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            in_flight: self.in_flight.len(),
            input_active: self.input_status.is_active(),
            output_active: self.output_status.is_active(),
            available_workers: self.worker_pool.available_permits(),
        }
    }

    async fn dispatch(&self, context: ExecutionContext, direction: Direction) -> ExecutionContext {
        let message = CommandMessage::new(direction, context);
        let correlation_id = message.correlation_id.clone();
        let command_id = message.command_id().to_string();
        let mut fallback = message.context.clone();

        if let Err(e) = self.send(message) {
            warn!(command_id = %command_id, error = %e, "Unable to dispatch command message");
            fallback.fail_if_not_failed(CommandError::transport(e.to_string()));
            return fallback;
        }

        match self.receive(&command_id, &correlation_id).await {
            Some(response) => response.into_context(),
            None => {
                fallback.fail_if_not_failed(CommandError::transport(format!(
                    "no response for correlation id {correlation_id}"
                )));
                fallback
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for MessageActionExecutor {
    async fn commit(&self, context: ExecutionContext) -> ExecutionContext {
        self.dispatch(context, Direction::Do).await
    }

    async fn rollback(&self, context: ExecutionContext) -> ExecutionContext {
        self.dispatch(context, Direction::Undo).await
    }
}
