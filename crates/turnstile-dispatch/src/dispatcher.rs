//! Side-effect dispatcher: crossbeam-channel bounded queues, dedicated worker
//! threads.
//!
//! Door commands and alerts travel on separate queues so a burst of alerts
//! cannot crowd out a lock. Detection records skip the queues and land in
//! the record log on submit.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use turnstile_core::config::DispatchConfig;
use turnstile_core::errors::{DispatchError, GatewayError};
use turnstile_core::models::DeviceCommand;
use turnstile_core::traits::{CommandSink, DeviceGateway};

use crate::record_log::DetectionRecordLog;
use crate::stats::{Counters, DispatchStats};

/// Fire-and-forget delivery of device commands.
///
/// `submit` never blocks: a full queue drops the command. Workers call the
/// gateway, retrying a failed call at most once, and always take pending
/// door commands before alerts. Dropping the dispatcher (or calling
/// `shutdown`) closes the queues and waits for the workers to drain them.
pub struct SideEffectDispatcher {
    queues: Option<Queues>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    records: Arc<DetectionRecordLog>,
    capacity: usize,
}

struct Queues {
    doors: Sender<DeviceCommand>,
    alerts: Sender<DeviceCommand>,
}

impl Queues {
    fn for_command(&self, command: &DeviceCommand) -> &Sender<DeviceCommand> {
        match command {
            DeviceCommand::RaiseAlert(_) => &self.alerts,
            _ => &self.doors,
        }
    }
}

struct Worker {
    doors: Receiver<DeviceCommand>,
    alerts: Receiver<DeviceCommand>,
    gateway: Arc<dyn DeviceGateway>,
    counters: Arc<Counters>,
    retry_once: bool,
}

impl SideEffectDispatcher {
    pub fn start(
        gateway: Arc<dyn DeviceGateway>,
        config: &DispatchConfig,
    ) -> Result<Self, DispatchError> {
        let records = DetectionRecordLog::with_limit(config.effective_record_limit());
        Self::with_record_log(gateway, config, Arc::new(records))
    }

    pub fn with_record_log(
        gateway: Arc<dyn DeviceGateway>,
        config: &DispatchConfig,
        records: Arc<DetectionRecordLog>,
    ) -> Result<Self, DispatchError> {
        let capacity = config.effective_queue_capacity().max(1);
        let worker_count = config.effective_workers().max(1);
        let (door_tx, door_rx) = bounded(capacity);
        let (alert_tx, alert_rx) = bounded(capacity);
        let counters = Arc::new(Counters::default());

        let mut dispatcher = Self {
            queues: Some(Queues {
                doors: door_tx,
                alerts: alert_tx,
            }),
            workers: Vec::with_capacity(worker_count),
            counters: Arc::clone(&counters),
            records,
            capacity,
        };
        for i in 0..worker_count {
            let worker = Worker {
                doors: door_rx.clone(),
                alerts: alert_rx.clone(),
                gateway: Arc::clone(&gateway),
                counters: Arc::clone(&counters),
                retry_once: config.effective_retry_once(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("turnstile-dispatch-{i}"))
                .spawn(move || worker.run())
                .map_err(|e| DispatchError::WorkerSpawn {
                    message: e.to_string(),
                })?;
            dispatcher.workers.push(handle);
        }
        info!(workers = worker_count, queue_capacity = capacity, "side-effect dispatcher started");
        Ok(dispatcher)
    }

    /// Queue a command without waiting. Detection records are logged in
    /// place and never occupy a queue slot.
    pub fn try_submit(&self, command: DeviceCommand) -> Result<(), DispatchError> {
        let queues = self.queues.as_ref().ok_or(DispatchError::Disconnected)?;
        if let DeviceCommand::RecordDetection(record) = command {
            self.records.insert(record);
            self.counters.submitted();
            self.counters.delivered();
            return Ok(());
        }
        match queues.for_command(&command).try_send(command) {
            Ok(()) => {
                self.counters.submitted();
                Ok(())
            }
            Err(TrySendError::Full(command)) => {
                self.counters.dropped();
                warn!(
                    command_kind = command.kind(),
                    queue_depth = self.capacity,
                    "side-effect queue full, command dropped"
                );
                Err(DispatchError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Disconnected(command)) => {
                self.counters.dropped();
                warn!(command_kind = command.kind(), "side-effect queue closed, command dropped");
                Err(DispatchError::Disconnected)
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Commands waiting for a worker, across both queues.
    pub fn queue_depth(&self) -> usize {
        self.queues
            .as_ref()
            .map_or(0, |q| q.doors.len() + q.alerts.len())
    }

    pub fn records(&self) -> &Arc<DetectionRecordLog> {
        &self.records
    }

    /// Close the queues, let the workers drain them, and return the final
    /// counters.
    pub fn shutdown(mut self) -> Result<DispatchStats, DispatchError> {
        self.close()?;
        Ok(self.stats())
    }

    fn close(&mut self) -> Result<(), DispatchError> {
        self.queues.take();
        let mut panicked = false;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                panicked = true;
            }
        }
        if panicked {
            error!("side-effect worker panicked");
            return Err(DispatchError::WorkerPanicked);
        }
        debug!(stats = ?self.counters.snapshot(), "side-effect dispatcher stopped");
        Ok(())
    }
}

impl CommandSink for SideEffectDispatcher {
    fn submit(&self, command: DeviceCommand) -> bool {
        self.try_submit(command).is_ok()
    }
}

impl Drop for SideEffectDispatcher {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.close();
        }
    }
}

impl Worker {
    fn run(self) {
        loop {
            if let Ok(command) = self.doors.try_recv() {
                self.deliver(command);
                continue;
            }
            select! {
                recv(self.doors) -> msg => match msg {
                    Ok(command) => self.deliver(command),
                    Err(_) => break,
                },
                recv(self.alerts) -> msg => match msg {
                    Ok(command) => self.deliver(command),
                    Err(_) => break,
                },
            }
        }
        // Closed: drain whatever is left, door commands first.
        for command in self.doors.iter() {
            self.deliver(command);
        }
        for command in self.alerts.iter() {
            self.deliver(command);
        }
    }

    fn deliver(&self, command: DeviceCommand) {
        let first = self.execute(&command);
        let outcome = match first {
            Err(e) if self.retry_once => {
                self.counters.retried();
                debug!(command_kind = command.kind(), error = %e, "device command failed, retrying");
                self.execute(&command)
            }
            other => other,
        };
        match outcome {
            Ok(()) => self.counters.delivered(),
            Err(e) => {
                self.counters.failed();
                error!(command_kind = command.kind(), error = %e, "device command failed");
            }
        }
    }

    fn execute(&self, command: &DeviceCommand) -> Result<(), GatewayError> {
        match command {
            DeviceCommand::LockDoors { door_ids, hold, .. } => {
                self.gateway.lock_doors(door_ids, *hold)
            }
            DeviceCommand::UnlockDoors { door_ids, .. } => self.gateway.unlock_doors(door_ids),
            DeviceCommand::RaiseAlert(alert) => self.gateway.raise_alert(alert),
            // Logged on submit; never queued.
            DeviceCommand::RecordDetection(_) => Ok(()),
        }
    }
}
