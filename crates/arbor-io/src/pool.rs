//! Bounded pool of writer threads with per-key ordering.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{PipelineError, PipelineResult};

pub type Job = Box<dyn FnOnce() -> PipelineResult<()> + Send>;

/// Jobs queued per worker before `submit` blocks.
pub const QUEUE_DEPTH: usize = 256;

/// Runs jobs on a fixed set of threads.
///
/// A job always runs on the worker chosen by the hash of its key, and each
/// worker drains its queue in order, so jobs sharing a key never reorder.
/// The first failure stops the pool: queued jobs are skipped, every later
/// [`WorkerPool::submit`] fails so the caller can abort, and
/// [`WorkerPool::finish`] returns the failure itself.
pub struct WorkerPool {
    senders: Vec<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    failed: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<PipelineError>>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> PipelineResult<Self> {
        let threads = threads.max(1);
        let failed = Arc::new(AtomicBool::new(false));
        let failure = Arc::new(Mutex::new(None));
        let mut senders = Vec::with_capacity(threads);
        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let (tx, rx) = bounded::<Job>(QUEUE_DEPTH);
            let failed = Arc::clone(&failed);
            let failure = Arc::clone(&failure);
            let worker = std::thread::Builder::new()
                .name(format!("arbor-writer-{i}"))
                .spawn(move || {
                    for job in rx {
                        if failed.load(Ordering::Acquire) {
                            continue;
                        }
                        if let Err(e) = job() {
                            error!(worker = i, error = %e, "write job failed");
                            failure.lock().get_or_insert(e);
                            failed.store(true, Ordering::Release);
                        }
                    }
                })?;
            senders.push(tx);
            workers.push(worker);
        }
        debug!(threads, "writer pool started");
        Ok(Self {
            senders,
            workers,
            failed,
            failure,
        })
    }

    pub fn threads(&self) -> usize {
        self.senders.len()
    }

    /// Queue `job` behind every earlier job with the same key.
    ///
    /// Fails once any job has failed.
    pub fn submit(&self, key: &impl Hash, job: Job) -> PipelineResult<()> {
        if self.failed.load(Ordering::Acquire) {
            let cause = self
                .failure
                .lock()
                .as_ref()
                .map_or_else(|| "unknown".to_string(), ToString::to_string);
            return Err(PipelineError::Worker(format!("an earlier write failed: {cause}")));
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let slot = (hasher.finish() % self.senders.len() as u64) as usize;
        self.senders[slot]
            .send(job)
            .map_err(|_| PipelineError::Worker(format!("worker {slot} is gone")))
    }

    /// Wait for every queued job and report the first failure.
    pub fn finish(self) -> PipelineResult<()> {
        drop(self.senders);
        for worker in self.workers {
            worker
                .join()
                .map_err(|_| PipelineError::Worker("writer thread panicked".into()))?;
        }
        match self.failure.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn same_key_keeps_order() {
        let pool = WorkerPool::new(4).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..500 {
            let seen = Arc::clone(&seen);
            pool.submit(&"key", Box::new(move || -> PipelineResult<()> {
                seen.lock().push(i);
                Ok(())
            }))
            .unwrap();
        }
        pool.finish().unwrap();
        assert_eq!(*seen.lock(), (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn all_jobs_run_across_keys() {
        let pool = WorkerPool::new(3).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        for i in 0..100 {
            let count = Arc::clone(&count);
            pool.submit(&i, Box::new(move || -> PipelineResult<()> {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        }
        pool.finish().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn first_failure_is_reported() {
        let pool = WorkerPool::new(2).unwrap();
        pool.submit(&1, Box::new(|| -> PipelineResult<()> { Err(PipelineError::Malformed("first".into())) }))
            .unwrap();
        let _ = pool.submit(&1, Box::new(|| -> PipelineResult<()> { Err(PipelineError::Malformed("second".into())) }));
        match pool.finish() {
            Err(PipelineError::Malformed(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn failure_stops_further_submits() {
        let pool = WorkerPool::new(2).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        pool.submit(&"a", Box::new(|| -> PipelineResult<()> { Err(PipelineError::Malformed("disk full".into())) }))
            .unwrap();

        let mut rejected = None;
        for i in 0..10_000 {
            let ran = Arc::clone(&ran);
            let job: Job = Box::new(move || -> PipelineResult<()> {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            if let Err(e) = pool.submit(&i, job) {
                rejected = Some(e);
                break;
            }
            std::thread::yield_now();
        }
        match rejected {
            Some(PipelineError::Worker(msg)) => assert!(msg.contains("disk full")),
            other => panic!("submit kept accepting jobs: {other:?}"),
        }
        assert!(ran.load(Ordering::SeqCst) < 10_000);
        assert!(matches!(pool.finish(), Err(PipelineError::Malformed(_))));
    }
}
