//! Fixed-size worker pool for boundary splitting.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::StripeError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of [`WorkerPool::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that ran to completion (including ones that panicked).
    pub completed: usize,
    /// Tasks still queued or running when the drain timed out.
    pub outstanding: usize,
    /// Tasks that panicked.
    pub panicked: usize,
}

/// N named threads pulling jobs from a shared MPMC queue.
pub struct WorkerPool {
    name: String,
    jobs: Option<Sender<Job>>,
    done: Receiver<()>,
    handles: Vec<JoinHandle<()>>,
    submitted: AtomicUsize,
    panicked: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawns `workers` threads named `{name}-{i}`.
    ///
    /// # Errors
    ///
    /// * If a worker thread cannot be spawned
    pub fn new(name: &str, workers: usize) -> Result<Self, StripeError> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<()>();
        let panicked = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            let panicked = Arc::clone(&panicked);
            let thread_name = format!("{name}-{i}");

            let handle = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    for job in &jobs {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            panicked.fetch_add(1, Ordering::SeqCst);
                            log::error!("Task panicked on {thread_name}");
                        }
                        if done.send(()).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| StripeError::Pool(format!("spawn {name}-{i}: {e}")))?;
            handles.push(handle);
        }

        Ok(Self {
            name: name.to_string(),
            jobs: Some(job_tx),
            done: done_rx,
            handles,
            submitted: AtomicUsize::new(0),
            panicked,
        })
    }

    /// Queues a job.
    ///
    /// # Errors
    ///
    /// * If the pool is already shut down
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), StripeError> {
        let Some(jobs) = &self.jobs else {
            return Err(StripeError::Pool(format!("{} is shut down", self.name)));
        };
        jobs.send(Box::new(job))
            .map_err(|_| StripeError::Pool(format!("{} queue is closed", self.name)))?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Closes the queue and waits up to `timeout` for queued work. Workers
    /// still busy after the deadline are detached.
    #[must_use]
    pub fn finish(mut self, timeout: Duration) -> DrainReport {
        drop(self.jobs.take());

        let submitted = self.submitted.load(Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        let mut completed = 0;
        while completed < submitted {
            if self.done.recv_deadline(deadline).is_err() {
                break;
            }
            completed += 1;
        }

        let outstanding = submitted - completed;
        if outstanding == 0 {
            for handle in self.handles.drain(..) {
                if handle.join().is_err() {
                    log::error!("{} worker exited abnormally", self.name);
                }
            }
        } else {
            log::warn!(
                "{}: {outstanding} of {submitted} tasks still running after {timeout:?}, proceeding without them",
                self.name
            );
        }

        DrainReport {
            completed,
            outstanding,
            panicked: self.panicked.load(Ordering::SeqCst),
        }
    }
}
