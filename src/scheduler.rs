//! One-shot delayed callbacks.
//!
//! The periodic check is not an interval timer: each run registers the next one
//! through `Scheduler::after`. `TimerScheduler` runs tasks on one worker thread,
//! one at a time, in due order. `ManualScheduler` only queues them, so tests can
//! step the switcher deterministically.

use std::collections::BinaryHeap;
use std::cmp::Ordering;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::logger::Log;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Run `task` once, no sooner than `delay` from now.
    fn after(&self, delay: Duration, task: Task);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Command {
    Schedule { due: Instant, task: Task },
    Shutdown,
}

struct Pending {
    due: Instant,
    seq: u64,
    task: Task,
}

// Min-heap on (due, seq): earliest first, ties in registration order.
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Pending {}

/// Scheduler backed by a single worker thread.
pub struct TimerScheduler {
    sender: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Command>();

        let worker = thread::spawn(move || {
            let mut queue: BinaryHeap<Pending> = BinaryHeap::new();
            let mut seq: u64 = 0;

            loop {
                let command = match queue.peek() {
                    None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    Some(next) => {
                        let wait = next.due.saturating_duration_since(Instant::now());
                        receiver.recv_timeout(wait)
                    }
                };

                match command {
                    Ok(Command::Schedule { due, task }) => {
                        queue.push(Pending { due, seq, task });
                        seq += 1;
                    }
                    Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let now = Instant::now();
                while queue.peek().is_some_and(|p| p.due <= now) {
                    if let Some(pending) = queue.pop() {
                        if catch_unwind(AssertUnwindSafe(pending.task)).is_err() {
                            Log::log_error("Scheduled task panicked; continuing");
                        }
                    }
                }
            }
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop the worker, dropping tasks that have not run yet.
    ///
    /// Safe to call more than once, and from inside a scheduled task.
    pub fn shutdown(&self) {
        if let Some(sender) = lock(&self.sender).take() {
            let _ = sender.send(Command::Shutdown);
        }
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.sender).is_some()
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Scheduler for TimerScheduler {
    fn after(&self, delay: Duration, task: Task) {
        let guard = lock(&self.sender);
        match guard.as_ref() {
            Some(sender) => {
                let due = Instant::now() + delay;
                if sender.send(Command::Schedule { due, task }).is_err() {
                    Log::log_debug("Timer worker has exited; task dropped");
                }
            }
            None => Log::log_debug("Timer is shut down; task dropped"),
        }
    }
}

/// Scheduler that only records tasks until the caller runs them.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<(Duration, Task)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.pending).iter().map(|(d, _)| *d).collect()
    }

    /// Run the oldest queued task. Returns false if nothing was queued.
    pub fn run_next(&self) -> bool {
        let next = {
            let mut pending = lock(&self.pending);
            if pending.is_empty() {
                None
            } else {
                Some(pending.remove(0))
            }
        };
        match next {
            Some((_, task)) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Drop everything queued without running it.
    pub fn clear(&self) {
        lock(&self.pending).clear();
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: Task) {
        lock(&self.pending).push((delay, task));
    }
}
