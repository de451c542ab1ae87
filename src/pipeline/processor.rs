//! The generation worker pool.
//!
//! A fixed set of worker threads reads jobs off one shared zero-capacity
//! channel: the dispatch loop blocks whenever every worker is busy, which
//! gives backpressure without an explicit queue bound, and whichever
//! worker frees up first takes the next key — natural load balancing with
//! no per-worker assignment.
//!
//! Each path key is enqueued at most once per batch (the batch is a set,
//! drained as it dispatches), so no two workers ever mutate the same
//! registry record concurrently.

use crate::codec;
use crate::config::PipelineConfig;
use crate::state::ItemRegistry;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Paths pending generation, order irrelevant; entries leave the set as
/// they are dispatched.
pub type WorkBatch = HashMap<String, ()>;

/// Build a batch from a list of path keys.
pub fn work_batch(paths: impl IntoIterator<Item = String>) -> WorkBatch {
    paths.into_iter().map(|p| (p, ())).collect()
}

/// Progress hook: items dispatched so far, invoked synchronously from the
/// batch-owner thread.
pub type ProgressHook = Box<dyn Fn(usize) + Send + Sync>;

/// Completion hook: items succeeded and elapsed seconds.
pub type CompleteHook = Box<dyn Fn(usize, f64) + Send + Sync>;

/// Result of one batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchOutcome {
    /// Keys actually fed into the channel (cancellation stops this short)
    pub dispatched: usize,
    /// Items that produced a fresh thumbnail
    pub succeeded: usize,
    /// Wall time of the whole batch
    pub elapsed: Duration,
}

/// Cancels the in-flight dispatch loop from any thread.
///
/// Cooperative only: keys already handed to a worker always finish;
/// cancellation affects undispatched keys, never partial item state.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

enum Job {
    Generate { path: String, done: Sender<bool> },
    Shutdown,
}

pub struct ImageProcessor {
    job_tx: Sender<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    cancel: Arc<AtomicBool>,
    generated_total: Arc<AtomicU64>,
    on_progress: Mutex<Option<ProgressHook>>,
    on_batch_complete: Mutex<Option<CompleteHook>>,
}

impl ImageProcessor {
    /// Spawn the pool: one worker per configured processor, all reading
    /// the same unbuffered distribution channel.
    pub fn new(config: &PipelineConfig, registry: Arc<ItemRegistry>) -> Self {
        let worker_count = config.effective_workers();
        let (job_tx, job_rx) = bounded::<Job>(0);
        let generated_total = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(worker_count);
        for n in 0..worker_count {
            let rx = job_rx.clone();
            let registry = Arc::clone(&registry);
            let counter = Arc::clone(&generated_total);
            let (box_w, box_h, quality) =
                (config.thumb_width, config.thumb_height, config.jpeg_quality);

            let handle = std::thread::Builder::new()
                .name(format!("thumb-worker-{}", n))
                .spawn(move || worker_loop(rx, registry, counter, box_w, box_h, quality))
                .expect("failed to spawn thumbnail worker");
            workers.push(handle);
        }

        log::info!("thumbnail pool started with {} workers", worker_count);

        Self {
            job_tx,
            workers: Mutex::new(workers),
            worker_count,
            cancel: Arc::new(AtomicBool::new(false)),
            generated_total,
            on_progress: Mutex::new(None),
            on_batch_complete: Mutex::new(None),
        }
    }

    /// Install the per-dispatch progress hook.
    pub fn set_progress_hook(&self, hook: ProgressHook) {
        *self.on_progress.lock() = Some(hook);
    }

    /// Install the batch-completion hook.
    pub fn set_complete_hook(&self, hook: CompleteHook) {
        *self.on_batch_complete.lock() = Some(hook);
    }

    /// Handle for cancelling dispatch from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancel),
        }
    }

    /// Stop enqueuing new keys; already-dispatched work always finishes.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Clear the cancel flag before a new batch. The batch owner calls
    /// this once the prior batch it cancelled has drained.
    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    /// Total thumbnails generated since the pool started.
    pub fn generated_total(&self) -> u64 {
        self.generated_total.load(Ordering::Relaxed)
    }

    /// Dispatch a batch and wait for every dispatched key to complete.
    ///
    /// The send blocks when all workers are busy; each job carries a
    /// clone of a per-batch completion sender, and the receive loop ends
    /// once every dispatched job has reported — the wait-group. Runs on
    /// the batch-owner thread, never the UI thread.
    pub fn process_batch(&self, mut batch: WorkBatch) -> BatchOutcome {
        let start = Instant::now();
        let (done_tx, done_rx): (Sender<bool>, Receiver<bool>) = unbounded();

        let mut dispatched = 0;
        for (path, _) in batch.drain() {
            if self.cancel.load(Ordering::SeqCst) {
                log::info!("batch cancelled after {} dispatches", dispatched);
                break;
            }
            let job = Job::Generate {
                path,
                done: done_tx.clone(),
            };
            if self.job_tx.send(job).is_err() {
                // Pool already shut down
                break;
            }
            dispatched += 1;
            if let Some(hook) = self.on_progress.lock().as_ref() {
                hook(dispatched);
            }
        }
        drop(done_tx);

        let mut succeeded = 0;
        while let Ok(ok) = done_rx.recv() {
            if ok {
                succeeded += 1;
            }
        }

        let elapsed = start.elapsed();
        if dispatched > 0 {
            log::info!(
                "batch done: {}/{} generated in {:.2}s",
                succeeded,
                dispatched,
                elapsed.as_secs_f64()
            );
        }
        if let Some(hook) = self.on_batch_complete.lock().as_ref() {
            hook(succeeded, elapsed.as_secs_f64());
        }

        BatchOutcome {
            dispatched,
            succeeded,
            elapsed,
        }
    }

    /// Tear down the pool: one sentinel per worker, then join them all.
    /// Must only be called with no batch in flight. Idempotent.
    pub fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        for _ in 0..self.worker_count {
            let _ = self.job_tx.send(Job::Shutdown);
        }
        for handle in handles {
            let _ = handle.join();
        }
        log::info!("thumbnail pool stopped");
    }
}

impl Drop for ImageProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    rx: Receiver<Job>,
    registry: Arc<ItemRegistry>,
    counter: Arc<AtomicU64>,
    box_w: u32,
    box_h: u32,
    quality: u8,
) {
    loop {
        match rx.recv() {
            Ok(Job::Generate { path, done }) => {
                let ok = generate_one(&registry, &path, box_w, box_h, quality);
                if ok {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                // Receiver may be gone if the batch owner died; the item
                // state is already consistent either way
                let _ = done.send(ok);
            }
            Ok(Job::Shutdown) | Err(_) => break,
        }
    }
}

/// Generate the thumbnail for one key, honoring the work-avoidance rule.
fn generate_one(
    registry: &ItemRegistry,
    path: &str,
    box_w: u32,
    box_h: u32,
    quality: u8,
) -> bool {
    // Skip items that already hold a current payload
    let skip = registry
        .with_item(path, |item| !item.needs_work())
        .unwrap_or(true);
    if skip {
        return false;
    }

    // Decode/resize/encode happens outside any lock
    match codec::render(Path::new(path), box_w, box_h, quality) {
        Some(rendered) => {
            registry.with_item_mut(path, |item| item.apply_render(rendered));
            true
        }
        None => {
            // No thumbnail available; clear the flag so the failing file
            // is not re-queued until its directory is scanned again
            registry.with_item_mut(path, |item| item.changed = false);
            false
        }
    }
}
