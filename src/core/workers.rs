//! Thread pool for frame decoding
//!
//! Uses work-stealing deques:
//! - New tasks go to a shared injector that every worker polls first
//! - Idle workers steal from each other
//! - A panicking job is logged and does not take its thread down
//!
//! Jobs are plain closures. Relevance checks (is this frame still wanted?)
//! belong to the caller and run inside the closure at execution time.

use crossbeam::deque::{Injector, Steal, Stealer, Worker};
use log::{error, trace};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool with work-stealing.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(move || {
///     let image = reader.read(frame);
///     tx.send(image).ok();
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    queued: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

/// Recommended thread count: 3/4 of the cores, leaving room for playback
pub fn default_threads() -> usize {
    (num_cpus::get() * 3 / 4).max(1)
}

fn run(job: Job, worker_id: usize) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("Worker {} job panicked: {}", worker_id, msg);
    }
}

fn find_job(local: &Worker<Job>, injector: &Injector<Job>, stealers: &[Stealer<Job>]) -> Option<Job> {
    // Own queue, then the injector (batch), then other workers
    local.pop().or_else(|| {
        std::iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(|s| s.steal()).collect::<Steal<Job>>())
        })
        .find(|s| !s.is_retry())
        .and_then(|s| s.success())
    })
}

impl Workers {
    /// Spawn `num_threads` workers (at least one)
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicUsize::new(0));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|w| w.stealer()).collect();
        let mut handles = Vec::with_capacity(num_threads);

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let queued = Arc::clone(&queued);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("seqcache-decode-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);
                    loop {
                        if let Some(job) = find_job(&local, &injector, &stealers) {
                            queued.fetch_sub(1, Ordering::Relaxed);
                            run(job, worker_id);
                            continue;
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        // No work - short sleep to avoid CPU spin
                        thread::sleep(Duration::from_millis(1));
                    }
                    trace!("Worker {} stopped", worker_id);
                })?;
            handles.push(handle);
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);

        Ok(Self {
            injector,
            handles,
            queued,
            shutdown,
        })
    }

    /// Run a closure on some worker thread
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queued.fetch_add(1, Ordering::Relaxed);
        self.injector.push(Box::new(f));
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Jobs queued but not yet picked up
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // Queued jobs still drain; the timeout only guards against a stuck decode
        let deadline = Instant::now() + Duration::from_millis(500);
        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, exiting anyway");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped gracefully", num_threads);
    }
}
