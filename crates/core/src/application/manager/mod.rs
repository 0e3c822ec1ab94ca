//! Manager - owns worker capacity, queue rotation and shutdown
//!
//! Runs as a single task draining one mailbox, so its state (ready pool,
//! busy set, rotation, stopped flag) is never touched concurrently.
//!
//! Capacity accounting: one fetch cycle is issued per ready processor at
//! start, one per processor freed afterwards, and one per empty fetch.
//! The number of fetches in flight therefore never exceeds the number of
//! ready processors, which is what makes `assign` safe.

mod handle;
mod message;
mod snapshot;

pub use handle::ManagerHandle;
pub use message::ManagerMessage;
pub use snapshot::PoolSnapshot;

use crate::application::fetcher::FetcherHandle;
use crate::application::worker::{
    execute_guarded, PanicGuardResult, ProcessorHandle, ProcessorSpawner, ShutdownSender,
};
use crate::config::PoolConfig;
use crate::domain::{ProcessorId, QueueName, QueueRotation, WorkItem};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub struct Manager {
    concurrency: usize,
    rotation: QueueRotation,
    ready: Vec<ProcessorHandle>,
    busy: HashMap<ProcessorId, ProcessorHandle>,
    started: bool,
    stopped: bool,
    shutdown_signalled: bool,
    invariant_violations: u64,
    empty_queue_delay: Duration,
    fetcher: FetcherHandle,
    spawner: ProcessorSpawner,
    shutdown: ShutdownSender,
    mailbox: ManagerHandle,
}

impl Manager {
    /// Build the manager and its `concurrency` idle processors
    ///
    /// # Arguments
    /// * `config` - concurrency and weighted queue list
    /// * `fetcher` - address of the fetcher actor
    /// * `spawner` - creates processors linked back to `mailbox`
    /// * `shutdown` - fired once `stop` has run
    /// * `mailbox` - this manager's own address (self-scheduled messages)
    pub fn new(
        config: &PoolConfig,
        fetcher: FetcherHandle,
        spawner: ProcessorSpawner,
        shutdown: ShutdownSender,
        mailbox: ManagerHandle,
    ) -> Result<Self> {
        config.validate()?;
        let rotation = QueueRotation::new(&config.queues)?;
        let ready = (0..config.concurrency)
            .map(|_| spawner.spawn_linked())
            .collect();

        Ok(Self {
            concurrency: config.concurrency,
            rotation,
            ready,
            busy: HashMap::new(),
            started: false,
            stopped: false,
            shutdown_signalled: false,
            invariant_violations: 0,
            empty_queue_delay: config.empty_queue_delay,
            fetcher,
            spawner,
            shutdown,
            mailbox,
        })
    }

    /// Drain the mailbox until stopped, signalled and no processor is busy
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ManagerMessage>) {
        while let Some(message) = inbox.recv().await {
            self.handle(message);

            if self.is_drained() {
                info!("All processors drained, manager exiting");
                break;
            }
        }
    }

    /// Run one handler inside the fault containment boundary
    pub fn handle(&mut self, message: ManagerMessage) {
        let label = message.label();

        match execute_guarded(label, || self.handle_message(message)) {
            PanicGuardResult::Success(Ok(())) => {}
            PanicGuardResult::Success(Err(e)) => {
                error!(handler = %label, error = %e, "{} failed", label);
            }
            // Already logged by the guard
            PanicGuardResult::Panicked(_) => {}
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            concurrency: self.concurrency,
            ready: self.ready.iter().map(ProcessorHandle::id).collect(),
            busy: self.busy.keys().copied().collect(),
            rotation: self.rotation.entries(),
            stopped: self.stopped,
            shutdown_signalled: self.shutdown_signalled,
            invariant_violations: self.invariant_violations,
        }
    }

    fn is_drained(&self) -> bool {
        self.stopped && self.shutdown_signalled && self.busy.is_empty()
    }

    fn handle_message(&mut self, message: ManagerMessage) -> Result<()> {
        match message {
            ManagerMessage::Start => self.start(),
            ManagerMessage::Stop => self.stop(),
            ManagerMessage::Dispatch => self.dispatch(),
            ManagerMessage::Assign { queue, item } => self.assign(queue, item),
            ManagerMessage::WorkNotFound { queue } => self.work_not_found(&queue),
            ManagerMessage::ProcessorDone { queue, processor } => {
                self.processor_done(&queue, processor)
            }
            ManagerMessage::ProcessorDied { processor, reason } => {
                self.processor_died(processor, &reason)
            }
            ManagerMessage::SignalShutdown => {
                self.signal_shutdown();
                Ok(())
            }
            ManagerMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                Ok(())
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.started {
            warn!("Start requested twice, ignoring");
            return Ok(());
        }
        self.started = true;

        info!(
            concurrency = self.concurrency,
            queues = ?self.rotation.entries(),
            "Starting"
        );

        for _ in 0..self.ready.len() {
            self.dispatch()?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.stopped {
            warn!("Stop requested twice, ignoring");
            return Ok(());
        }

        info!(busy = self.busy.len(), ready = self.ready.len(), "Bye");
        self.stopped = true;

        if self.fetcher.is_alive() {
            self.fetcher.terminate();
        }

        for processor in self.ready.drain(..) {
            if processor.is_alive() {
                processor.terminate();
            }
        }

        // Busy processors are not waited for: the signal fires on the next turn
        self.mailbox.signal_shutdown()
    }

    fn signal_shutdown(&mut self) {
        self.shutdown_signalled = true;
        self.shutdown.shutdown();
        info!(busy = self.busy.len(), "Shutdown signalled");
    }

    fn dispatch(&mut self) -> Result<()> {
        if self.stopped {
            debug!("Dispatch skipped, manager stopped");
            return Ok(());
        }

        let queue = self
            .rotation
            .next_queue()
            .ok_or_else(|| AppError::InvalidState("queue rotation is empty".to_string()))?;

        debug!(queue = %queue, "Dispatching fetch");
        self.fetcher.fetch(queue)
    }

    fn assign(&mut self, queue: QueueName, item: WorkItem) -> Result<()> {
        if self.stopped {
            error!(
                queue = %queue,
                item_id = %item.id,
                "Work item arrived after stop, dropping"
            );
            return Ok(());
        }

        info!(queue = %queue, item_id = %item.id, "Assigning work item");

        let Some(processor) = self.ready.pop() else {
            self.invariant_violations += 1;
            error!(
                queue = %queue,
                item_id = %item.id,
                busy = self.busy.len(),
                concurrency = self.concurrency,
                violations = self.invariant_violations,
                "Capacity invariant violated: work fetched with no ready processor"
            );
            return Err(AppError::InvariantBroken(format!(
                "no ready processor for item {} from queue '{}'",
                item.id, queue
            )));
        };

        let id = processor.id();
        let sent = processor.process(queue, item);
        self.busy.insert(id, processor);
        sent
    }

    fn processor_done(&mut self, queue: &str, id: ProcessorId) -> Result<()> {
        info!(queue = %queue, processor_id = %id, "Process done");

        let Some(processor) = self.busy.remove(&id) else {
            warn!(processor_id = %id, "Done reported by untracked processor, ignoring");
            return Ok(());
        };

        if self.stopped {
            if processor.is_alive() {
                processor.terminate();
            }
        } else {
            self.ready.push(processor);
        }

        self.work_found(queue);
        self.dispatch()
    }

    fn processor_died(&mut self, id: ProcessorId, reason: &str) -> Result<()> {
        error!(processor_id = %id, reason = %reason, "Process died");

        let was_busy = self.busy.remove(&id).is_some();
        let was_ready = match self.ready.iter().position(|p| p.id() == id) {
            Some(index) => {
                self.ready.remove(index);
                true
            }
            None => false,
        };

        if self.stopped {
            return Ok(());
        }
        if !was_busy && !was_ready {
            warn!(processor_id = %id, "Death of untracked processor, not replacing");
            return Ok(());
        }

        let replacement = self.spawner.spawn_linked();
        info!(
            processor_id = %id,
            replacement_id = %replacement.id(),
            "Replacing dead processor"
        );
        self.ready.push(replacement);

        // A dead ready processor still has its fetch cycle in flight
        if was_busy {
            self.dispatch()?;
        }
        Ok(())
    }

    fn work_not_found(&mut self, queue: &str) -> Result<()> {
        if let Some(weight) = self.rotation.work_not_found(queue) {
            info!(
                queue = %queue,
                weight = weight,
                original = self.rotation.original_weight(queue),
                "Temporarily decreasing queue weight"
            );
        }

        self.redispatch_later()
    }

    fn work_found(&mut self, queue: &str) {
        if let Some(weight) = self.rotation.work_found(queue) {
            info!(
                queue = %queue,
                weight = weight,
                original = self.rotation.original_weight(queue),
                "Increasing queue weight"
            );
        }
    }

    /// Re-issue an empty fetch cycle after `empty_queue_delay`
    fn redispatch_later(&self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        if self.empty_queue_delay.is_zero() {
            return self.mailbox.dispatch();
        }

        let mailbox = self.mailbox.clone();
        let delay = self.empty_queue_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if mailbox.dispatch().is_err() {
                debug!("Manager gone, delayed dispatch dropped");
            }
        });
        Ok(())
    }
}
