//! A small fixed-size worker pool used by the [`crate::differ`] to parallelize the
//! region-matching pass.
//!
//! Workers block on a condition variable when the queue is empty rather than busy-
//! polling, per the design note that a production reimplementation should replace the
//! original's `while (!isFinished()) continue;` spin with a condvar wait.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    jobs: Mutex<VecDeque<Job>>,
    job_ready: Condvar,
    alive: AtomicBool,
    started: AtomicUsize,
    finished: AtomicUsize,
    done: Mutex<()>,
    done_cv: Condvar,
}

/// A pool of worker threads draining a shared FIFO job queue.
pub struct Threader {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Threader {
    /// Spawn a pool sized to the machine's available parallelism (at least one
    /// thread).
    pub fn new() -> Self {
        let max_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_max_threads(max_threads)
    }

    /// Spawn a pool clamped to `[1, available_parallelism]` threads.
    pub fn with_max_threads(max_threads: usize) -> Self {
        let available = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let thread_count = max_threads.clamp(1, available);

        let shared = Arc::new(Shared {
            jobs: Mutex::new(VecDeque::new()),
            job_ready: Condvar::new(),
            alive: AtomicBool::new(true),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            done: Mutex::new(()),
            done_cv: Condvar::new(),
        });

        let workers = (0..thread_count)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || Self::worker_loop(&shared))
            })
            .collect();

        Self { shared, workers }
    }

    fn worker_loop(shared: &Shared) {
        loop {
            let job = {
                let mut guard = shared.jobs.lock().expect("job queue poisoned");
                loop {
                    if let Some(job) = guard.pop_front() {
                        break Some(job);
                    }
                    if !shared.alive.load(Ordering::Acquire) {
                        break None;
                    }
                    guard = shared.job_ready.wait(guard).expect("job queue poisoned");
                }
            };

            match job {
                Some(job) => {
                    job();
                    shared.finished.fetch_add(1, Ordering::AcqRel);
                    let _guard = shared.done.lock().expect("done lock poisoned");
                    shared.done_cv.notify_all();
                }
                None => break,
            }
        }
    }

    /// Append a job to the queue, to be picked up by the next free worker.
    pub fn add_job<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut guard = self.shared.jobs.lock().expect("job queue poisoned");
        guard.push_back(Box::new(job));
        self.shared.started.fetch_add(1, Ordering::AcqRel);
        self.shared.job_ready.notify_one();
    }

    /// True once every submitted job has run to completion.
    pub fn is_finished(&self) -> bool {
        self.shared.started.load(Ordering::Acquire) == self.shared.finished.load(Ordering::Acquire)
    }

    /// Block the calling thread until every submitted job has completed.
    pub fn wait_until_finished(&self) {
        let guard = self.shared.done.lock().expect("done lock poisoned");
        let _guard = self
            .shared
            .done_cv
            .wait_while(guard, |_| !self.is_finished())
            .expect("done lock poisoned");
    }

    /// Stop accepting new jobs and join every worker thread.
    pub fn shutdown(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
        self.shared.job_ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Default for Threader {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Threader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn runs_all_submitted_jobs() {
        let threader = Threader::with_max_threads(4);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            threader.add_job(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        threader.wait_until_finished();
        assert!(threader.is_finished());
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn clamps_thread_count_to_at_least_one() {
        let threader = Threader::with_max_threads(0);
        assert!(!threader.workers.is_empty());
    }
}
