//! Fixed-size worker pool
//!
//! Workers pull boxed jobs from one shared queue until the queue's sender is
//! dropped. A panicking job is logged and the worker carries on.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded, unbounded};

use super::ThreadSet;
use crate::consts::SHUTDOWN_TIMEOUT;
use crate::error::{CoreError, CoreResult};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    name: String,
    job_tx: Option<Sender<Job>>,
    threads: ThreadSet,
}

impl WorkerPool {
    pub fn new(name: &str, size: usize) -> CoreResult<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let mut threads = ThreadSet::new();

        for index in 0..size.max(1) {
            let rx = job_rx.clone();
            let spawned = threads.spawn(format!("{name}-{index}"), move || {
                for job in rx.iter() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("Worker job panicked");
                    }
                }
            });
            if let Err(e) = spawned {
                // Dropping the sender lets the workers already started exit
                drop(job_tx);
                threads.join_within(SHUTDOWN_TIMEOUT);
                return Err(e);
            }
        }

        log::debug!("Worker pool {} started with {} threads", name, threads.len());
        Ok(Self {
            name: name.to_string(),
            job_tx: Some(job_tx),
            threads,
        })
    }

    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Workers still alive
    pub fn running(&self) -> usize {
        self.threads.running()
    }

    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> CoreResult<()> {
        let tx = self.job_tx.as_ref().ok_or(CoreError::NotRunning)?;
        tx.send(Box::new(job)).map_err(|_| CoreError::NotRunning)
    }

    /// Run every job and wait for all of them, at most `timeout`
    pub fn run_batch(&self, jobs: Vec<Job>, timeout: Duration) -> CoreResult<()> {
        let total = jobs.len();
        if total == 0 {
            return Ok(());
        }
        let (done_tx, done_rx) = bounded::<()>(total);
        for job in jobs {
            let done = done_tx.clone();
            self.execute(move || {
                job();
                let _ = done.send(());
            })?;
        }
        drop(done_tx);

        let deadline = Instant::now() + timeout;
        let mut finished = 0;
        while finished < total {
            match done_rx.recv_deadline(deadline) {
                Ok(()) => finished += 1,
                // Timed out, or a panicking job dropped its sender
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        if finished < total {
            return Err(CoreError::TickOverrun {
                pending: total - finished,
            });
        }
        Ok(())
    }

    /// Stop accepting jobs, let queued ones drain, join within `timeout`
    pub fn shutdown(&mut self, timeout: Duration) -> CoreResult<()> {
        if self.job_tx.take().is_none() {
            return Ok(());
        }
        let abandoned = self.threads.join_within(timeout);
        if abandoned > 0 {
            return Err(CoreError::ShutdownTimedOut { abandoned, timeout });
        }
        log::debug!("Worker pool {} stopped", self.name);
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(SHUTDOWN_TIMEOUT) {
            log::warn!("Worker pool {} dropped: {}", self.name, e);
        }
    }
}
