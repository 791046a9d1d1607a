//! # Message Processors
//!
//! Two long-running tasks move messages for the message executor. The input
//! processor hands each request to a worker task that runs the command; the
//! output processor delivers each response to the watchdog waiting for it.
//! Both stop when they see the last-message sentinel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error, info, warn};

use super::message::{CommandMessage, TransportFrame};
use super::watchdog::MessageWatchdog;
use crate::commands::{CommandError, CommandFamily};
use crate::execution::runner::execute_context;
use crate::logging::log_processor_lifecycle;
use crate::registry::CommandRegistry;

/// Liveness and throughput of one processor
#[derive(Debug)]
pub struct ProcessorStatus {
    name: &'static str,
    active: AtomicBool,
    processed: AtomicU64,
    skipped: AtomicU64,
}

impl ProcessorStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            active: AtomicBool::new(false),
            processed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Takes requests off the input queue and runs each on its own worker task
pub struct InputProcessor {
    receiver: mpsc::Receiver<TransportFrame>,
    output: mpsc::Sender<TransportFrame>,
    registry: Arc<CommandRegistry>,
    workers: Arc<Semaphore>,
    status: Arc<ProcessorStatus>,
    encode: bool,
}

impl InputProcessor {
    pub fn new(
        receiver: mpsc::Receiver<TransportFrame>,
        output: mpsc::Sender<TransportFrame>,
        registry: Arc<CommandRegistry>,
        workers: Arc<Semaphore>,
        status: Arc<ProcessorStatus>,
        encode: bool,
    ) -> Self {
        Self {
            receiver,
            output,
            registry,
            workers,
            status,
            encode,
        }
    }

    /// Process requests until the last-message sentinel arrives
    pub async fn run(mut self, ready: oneshot::Sender<()>) {
        self.status.set_active(true);
        log_processor_lifecycle(self.status.name(), "started", None);
        let _ = ready.send(());

        while let Some(frame) = self.receiver.recv().await {
            let message = frame.unpack();

            if message.is_last_message() {
                debug!(processor = self.status.name(), "Last message received, forwarding to output");
                if self
                    .output
                    .send(TransportFrame::pack(message, self.encode))
                    .await
                    .is_err()
                {
                    warn!(processor = self.status.name(), "Output processor already gone");
                }
                break;
            }

            if message.is_empty() {
                self.status.record_skipped();
                warn!(processor = self.status.name(), "Skipping empty message");
                continue;
            }

            self.status.record_processed();
            self.spawn_worker(message);
        }

        self.status.set_active(false);
        log_processor_lifecycle(self.status.name(), "stopped", None);
    }

    fn spawn_worker(&self, message: CommandMessage) {
        let registry = self.registry.clone();
        let workers = self.workers.clone();
        let output = self.output.clone();
        let encode = self.encode;

        tokio::spawn(async move {
            let correlation_id = message.correlation_id.clone();
            let response = process_message(&registry, &workers, message).await;

            if let Err(e) = output.send(TransportFrame::pack(response, encode)).await {
                error!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Failed to send response - output processor closed"
                );
            }
        });
    }
}

/// Run the command a request names and build the response.
///
/// Leaf commands hold a worker permit while they run. Composite commands do not:
/// their nested commands need permits of their own.
async fn process_message(
    registry: &CommandRegistry,
    workers: &Arc<Semaphore>,
    message: CommandMessage,
) -> CommandMessage {
    let command = match registry.get(message.command_id()) {
        Ok(command) => command,
        Err(cause) => {
            warn!(
                correlation_id = %message.correlation_id,
                command_id = %message.command_id(),
                "Request names an unregistered command"
            );
            let mut context = message.context.clone();
            context.fail_if_not_failed(cause);
            return message.respond_with(context);
        }
    };

    let _permit = if command.family() == CommandFamily::Macro {
        None
    } else {
        match workers.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                error!(
                    correlation_id = %message.correlation_id,
                    "Worker pool closed - cannot execute command, generating failure"
                );
                let mut context = message.context.clone();
                context.fail_if_not_failed(CommandError::execution("worker pool closed"));
                return message.respond_with(context);
            }
        }
    };

    let context = execute_context(command.as_ref(), message.context.clone(), message.direction).await;
    message.respond_with(context)
}

/// Delivers responses to the watchdogs waiting for them
pub struct OutputProcessor {
    receiver: mpsc::Receiver<TransportFrame>,
    in_flight: Arc<DashMap<String, Arc<MessageWatchdog>>>,
    status: Arc<ProcessorStatus>,
}

impl OutputProcessor {
    pub fn new(
        receiver: mpsc::Receiver<TransportFrame>,
        in_flight: Arc<DashMap<String, Arc<MessageWatchdog>>>,
        status: Arc<ProcessorStatus>,
    ) -> Self {
        Self {
            receiver,
            in_flight,
            status,
        }
    }

    pub async fn run(mut self, ready: oneshot::Sender<()>) {
        self.status.set_active(true);
        log_processor_lifecycle(self.status.name(), "started", None);
        let _ = ready.send(());

        while let Some(frame) = self.receiver.recv().await {
            let message = frame.unpack();

            if message.is_last_message() {
                info!(processor = self.status.name(), "Last message received");
                break;
            }

            if message.is_empty() {
                self.status.record_skipped();
                warn!(processor = self.status.name(), "Skipping empty response");
                continue;
            }

            let watchdog = self
                .in_flight
                .get(&message.correlation_id)
                .map(|entry| entry.value().clone());

            match watchdog {
                Some(watchdog) => {
                    self.status.record_processed();
                    watchdog.complete(message);
                }
                None => {
                    self.status.record_skipped();
                    warn!(
                        correlation_id = %message.correlation_id,
                        command_id = %message.command_id(),
                        "No watchdog waiting for response, dropping it"
                    );
                }
            }
        }

        self.status.set_active(false);
        log_processor_lifecycle(self.status.name(), "stopped", None);
    }
}
