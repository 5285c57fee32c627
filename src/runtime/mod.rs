//! Threads, periodic tasks and their lifecycle
//!
//! - `pool`: fixed worker pool running per-tick advance jobs
//! - `scheduler`: periodic tasks (spawners, cleanup, stats)
//! - `spawners`: the bodies of those periodic tasks
//! - `lifecycle`: start / bounded shutdown / restart of a whole generation

pub mod lifecycle;
pub mod pool;
pub mod scheduler;
pub mod spawners;

pub use lifecycle::{LifecycleManager, Session};
pub use pool::WorkerPool;
pub use scheduler::Scheduler;
pub use spawners::{Spawner, StatsReporter};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::error::{CoreError, CoreResult};

/// Tells the owner a thread has left its body, even when unwinding
struct ExitGuard {
    index: usize,
    running: Arc<AtomicUsize>,
    tx: Sender<usize>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
        let _ = self.tx.send(self.index);
    }
}

/// Named threads that can be joined against a deadline
pub(crate) struct ThreadSet {
    handles: Vec<Option<JoinHandle<()>>>,
    running: Arc<AtomicUsize>,
    exit_tx: Sender<usize>,
    exit_rx: Receiver<usize>,
}

impl ThreadSet {
    pub(crate) fn new() -> Self {
        let (exit_tx, exit_rx) = unbounded();
        Self {
            handles: Vec::new(),
            running: Arc::new(AtomicUsize::new(0)),
            exit_tx,
            exit_rx,
        }
    }

    pub(crate) fn spawn(&mut self, name: String, body: impl FnOnce() + Send + 'static) -> CoreResult<()> {
        let guard = ExitGuard {
            index: self.handles.len(),
            running: Arc::clone(&self.running),
            tx: self.exit_tx.clone(),
        };
        self.running.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let _guard = guard;
            body();
        });
        match spawned {
            Ok(handle) => {
                self.handles.push(Some(handle));
                Ok(())
            }
            Err(e) => Err(CoreError::ThreadSpawn {
                name,
                reason: e.to_string(),
            }),
        }
    }

    /// Threads that have not finished their body yet
    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Join every thread that exits before `timeout`; detach the rest.
    /// Returns how many were abandoned.
    pub(crate) fn join_within(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        while self.handles.iter().any(Option::is_some) {
            match self.exit_rx.recv_deadline(deadline) {
                Ok(index) => {
                    if let Some(handle) = self.handles.get_mut(index).and_then(Option::take) {
                        if handle.join().is_err() {
                            log::error!("Thread {} panicked on exit", index);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut abandoned = 0;
        for handle in self.handles.iter_mut().filter_map(Option::take) {
            log::warn!(
                "Abandoning thread {:?} after {:?}",
                handle.thread().name().unwrap_or("unnamed"),
                timeout
            );
            abandoned += 1;
        }
        abandoned
    }
}
