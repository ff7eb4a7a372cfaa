/// Ordered command queue with a single consumer.
///
/// Producers (MQTT delivery thread, CLI drivers, tests) push through cheap
/// [`InvokerHandle`] clones. Exactly one drain loop pops and executes at a
/// time, so device access is serialized in enqueue order.
use flume::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::command::{Command, Outcome};

enum Job {
    Run(Command),
    /// Stop the consumer once every earlier command has run.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerState {
    Idle,
    Draining,
}

/// Result of one executed command, in execution order.
#[derive(Debug)]
pub struct Report {
    pub action: &'static str,
    pub target: Option<String>,
    pub outcome: Outcome,
}

/// Producer side of the queue.
#[derive(Clone)]
pub struct InvokerHandle {
    tx: Sender<Job>,
}

impl InvokerHandle {
    /// Append a command to the tail of the queue. Never blocks.
    ///
    /// Returns `false` only when the invoker itself has been dropped.
    pub fn enqueue(&self, command: Command) -> bool {
        let action = command.name();
        match self.tx.send(Job::Run(command)) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Invoker is gone, dropping {action}");
                false
            }
        }
    }

    /// Ask the running consumer to stop after the commands already queued.
    pub fn shutdown(&self) {
        if self.tx.send(Job::Shutdown).is_err() {
            log::debug!("Invoker already gone, shutdown ignored");
        }
    }
}

pub struct Invoker {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    draining: AtomicBool,
    stopped: AtomicBool,
    executed: AtomicU64,
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new()
    }
}

impl Invoker {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            draining: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            executed: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> InvokerHandle {
        InvokerHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn enqueue(&self, command: Command) {
        // The invoker holds its own receiver, so this send cannot fail.
        let _ = self.tx.send(Job::Run(command));
    }

    /// Number of jobs waiting in the queue.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn state(&self) -> InvokerState {
        if self.draining.load(Ordering::Acquire) {
            InvokerState::Draining
        } else {
            InvokerState::Idle
        }
    }

    /// Total commands executed over the invoker's lifetime.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish(&self) {
        self.draining.store(false, Ordering::Release);
    }

    fn run_one(&self, command: Command) -> Report {
        let action = command.name();
        let target = command.target_id();
        log::debug!("Executing {command:?}");

        let outcome = command.execute();
        self.executed.fetch_add(1, Ordering::Relaxed);

        match &outcome {
            Outcome::Failed(err) => log::warn!("{action} failed: {err}"),
            Outcome::Validated(result) if !result.is_consistent() => {
                log::warn!("{action} on {target:?}: {result:?}")
            }
            _ => log::debug!("{action} on {target:?}: {outcome:?}"),
        }

        Report {
            action,
            target,
            outcome,
        }
    }

    /// Execute queued commands in FIFO order until the queue is observed empty.
    ///
    /// Returns immediately with no reports if another drain (or [`Invoker::run`])
    /// is already consuming; the active consumer will pick the new commands up.
    pub fn drain(&self) -> Vec<Report> {
        if !self.try_begin() {
            log::debug!("Drain already in progress");
            return Vec::new();
        }

        let mut reports = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(Job::Run(command)) => reports.push(self.run_one(command)),
                Ok(Job::Shutdown) => {
                    self.stopped.store(true, Ordering::Release);
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        self.finish();
        reports
    }

    /// Blocking consumer loop for the lifetime of the process.
    ///
    /// Waits on the queue without polling and exits after a
    /// [`InvokerHandle::shutdown`] request has been reached. Returns the number
    /// of commands executed by this call.
    pub fn run(&self) -> u64 {
        if !self.try_begin() {
            log::warn!("Invoker already has a consumer, run() ignored");
            return 0;
        }
        log::info!("Invoker consumer started");

        let mut count = 0;
        while let Ok(job) = self.rx.recv() {
            match job {
                Job::Run(command) => {
                    self.run_one(command);
                    count += 1;
                }
                Job::Shutdown => {
                    self.stopped.store(true, Ordering::Release);
                    break;
                }
            }
        }

        self.finish();
        log::info!("Invoker consumer stopped after {count} commands");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::controller::Controller,
        testing::{Call, MockDevice},
    };
    use std::{sync::Arc, thread};

    #[test]
    fn test_drain_empty_queue() {
        let invoker = Invoker::new();
        assert!(invoker.drain().is_empty());
        assert_eq!(invoker.state(), InvokerState::Idle);
    }

    #[test]
    fn test_drain_runs_in_fifo_order_once() {
        let mock = MockDevice::new("mock", 4);
        let plc = Controller::new("plc1", Box::new(mock.clone()), 4).into_shared();
        let invoker = Invoker::new();

        invoker.enqueue(Command::coils_on(Some(plc.clone()), vec![0]));
        invoker.enqueue(Command::coils_on(Some(plc.clone()), vec![1]));
        invoker.enqueue(Command::coils_off(Some(plc.clone()), vec![0]));
        assert_eq!(invoker.pending(), 3);

        let reports = invoker.drain();

        assert_eq!(
            reports.iter().map(|r| r.action).collect::<Vec<_>>(),
            vec!["coils_on", "coils_on", "coils_off"]
        );
        assert_eq!(
            mock.calls(),
            vec![
                Call::WriteBit {
                    address: 0,
                    value: true
                },
                Call::WriteBit {
                    address: 1,
                    value: true
                },
                Call::WriteBit {
                    address: 0,
                    value: false
                },
            ]
        );
        assert_eq!(invoker.pending(), 0);
        assert_eq!(invoker.executed(), 3);
        assert!(invoker.drain().is_empty());
    }

    #[test]
    fn test_no_target_does_not_stop_the_drain() {
        let mock = MockDevice::new("mock", 4);
        let plc = Controller::new("plc1", Box::new(mock.clone()), 4).into_shared();
        let invoker = Invoker::new();

        invoker.enqueue(Command::coils_on(None, vec![0]));
        invoker.enqueue(Command::coils_on(Some(plc), vec![2]));

        let reports = invoker.drain();
        assert!(matches!(reports[0].outcome, Outcome::NoTarget));
        assert!(matches!(reports[1].outcome, Outcome::Applied));
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_shutdown_stops_run_after_pending_commands() {
        let mock = MockDevice::new("mock", 4);
        let plc = Controller::new("plc1", Box::new(mock.clone()), 4).into_shared();
        let invoker = Arc::new(Invoker::new());
        let handle = invoker.handle();

        let consumer = {
            let invoker = Arc::clone(&invoker);
            thread::spawn(move || invoker.run())
        };

        handle.enqueue(Command::coils_on(Some(plc.clone()), vec![3]));
        handle.enqueue(Command::validate(Some(plc)));
        handle.shutdown();

        assert_eq!(consumer.join().unwrap(), 2);
        assert!(invoker.is_stopped());
        assert_eq!(invoker.state(), InvokerState::Idle);
        assert_eq!(mock.calls().len(), 2);
    }

    #[test]
    fn test_enqueue_after_invoker_dropped() {
        let handle = Invoker::new().handle();
        assert!(!handle.enqueue(Command::validate(None)));
    }
}
