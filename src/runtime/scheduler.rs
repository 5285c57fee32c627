//! Periodic tasks
//!
//! Each task is a thread that sleeps on the shared stop channel between runs.
//! Dropping the stop sender wakes every task at once. A task returns the
//! delay until its next run, so intervals are re-read every time.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use super::ThreadSet;
use crate::error::{CoreError, CoreResult};

pub struct Scheduler {
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
    threads: ThreadSet,
    names: Vec<&'static str>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = bounded(0);
        Self {
            stop_tx: Some(stop_tx),
            stop_rx,
            threads: ThreadSet::new(),
            names: Vec::new(),
        }
    }

    /// Run `task` after `initial`, then after whatever delay it returns.
    /// Returning `None` ends the task.
    pub fn spawn_periodic(
        &mut self,
        name: &'static str,
        initial: Duration,
        mut task: impl FnMut() -> Option<Duration> + Send + 'static,
    ) -> CoreResult<()> {
        if self.stop_tx.is_none() {
            return Err(CoreError::NotRunning);
        }
        let stop = self.stop_rx.clone();
        self.threads.spawn(format!("task-{name}"), move || {
            let mut delay = initial;
            loop {
                match stop.recv_timeout(delay) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                match panic::catch_unwind(AssertUnwindSafe(&mut task)) {
                    Ok(Some(next)) => delay = next,
                    Ok(None) => break,
                    Err(_) => log::error!("Periodic task {} panicked, will retry", name),
                }
            }
            log::trace!("Periodic task {} exiting", name);
        })?;
        self.names.push(name);
        Ok(())
    }

    /// Tasks whose thread is still alive
    pub fn running_count(&self) -> usize {
        self.threads.running()
    }

    pub fn task_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Signal every task and wait for them, at most `timeout`
    pub fn shutdown(&mut self, timeout: Duration) -> CoreResult<()> {
        if self.stop_tx.take().is_none() {
            return Ok(());
        }
        let abandoned = self.threads.join_within(timeout);
        if abandoned > 0 {
            return Err(CoreError::ShutdownTimedOut { abandoned, timeout });
        }
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(crate::consts::SHUTDOWN_TIMEOUT) {
            log::warn!("Scheduler dropped: {}", e);
        }
    }
}
