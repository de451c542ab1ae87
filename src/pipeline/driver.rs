//! The pipeline facade: owns the shared state and wires scans, the worker
//! pool, the change monitor, the cache store and the watcher together.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::hash;
use crate::scan;
use crate::state::ItemRegistry;
use crate::store::{CachedRow, CacheStore};
use crate::watch::DirectoryWatcher;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use super::monitor::{ContentMonitor, RepaintHook};
use super::processor::{work_batch, BatchOutcome, ImageProcessor};

/// The background thumbnail pipeline.
///
/// Directory scans populate the registry, the worker pool fills in
/// missing or stale thumbnails, the store persists them, and the monitor
/// quietly corrects size mismatches the render path reports. The UI
/// thread only ever triggers async work and reads registry snapshots; it
/// never blocks on a worker.
pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<ItemRegistry>,
    store: Arc<CacheStore>,
    processor: Arc<ImageProcessor>,
    monitor: ContentMonitor,
    watcher: Mutex<Option<DirectoryWatcher>>,
    /// Serializes scan batches: a new scan drains the batch it cancelled
    /// before touching shared state
    scan_lock: Mutex<()>,
    repaint: Mutex<Option<RepaintHook>>,
    /// Back-reference for handing the pipeline to background threads and
    /// the watcher callback; always upgradable while the pipeline lives
    self_weak: Weak<Pipeline>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, store: CacheStore) -> Arc<Self> {
        let registry = Arc::new(ItemRegistry::new());
        let store = Arc::new(store);
        let processor = Arc::new(ImageProcessor::new(&config, Arc::clone(&registry)));
        let monitor = ContentMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&processor),
        );

        Arc::new_cyclic(|self_weak| Self {
            config,
            registry,
            store,
            processor,
            monitor,
            watcher: Mutex::new(None),
            scan_lock: Mutex::new(()),
            repaint: Mutex::new(None),
            self_weak: self_weak.clone(),
        })
    }

    /// Pipeline with the store at its default OS location.
    pub fn open_default(config: PipelineConfig) -> Result<Arc<Self>> {
        let store = CacheStore::open_default()?;
        Ok(Self::new(config, store))
    }

    pub fn registry(&self) -> &Arc<ItemRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn processor(&self) -> &Arc<ImageProcessor> {
        &self.processor
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Install the repaint signal for both scan batches and refresh
    /// rounds. The callee marshals onto its own thread before touching
    /// UI state.
    pub fn set_repaint_hook(&self, hook: RepaintHook) {
        self.monitor.set_repaint_hook(Arc::clone(&hook));
        *self.repaint.lock() = Some(hook);
    }

    /// Scan one directory and generate every missing or stale thumbnail.
    ///
    /// Blocks until the batch drains; run it off the UI thread (or use
    /// [`rescan_async`](Self::rescan_async)). Serialized against other
    /// scans so no two batches ever write the same registry record.
    pub fn refresh_directory(&self, dir: &Path) -> Result<BatchOutcome> {
        let _guard = self.scan_lock.lock();

        let dir_str = scan::absolute_path(dir);
        let entries = scan::scan_directory(Path::new(&dir_str))?;
        log::info!("🔍 scanning {}: {} images", dir_str, entries.len());

        self.registry.sync_directory(&dir_str, &entries);

        // Hydrate payloads persisted by earlier sessions in one query
        let rows = self.store.lookup_by_directory(hash::item_key(&dir_str));
        let hydrated = self.registry.hydrate(&dir_str, &rows);
        if hydrated > 0 {
            log::debug!("hydrated {} thumbnails from cache", hydrated);
        }

        self.processor.reset_cancel();
        let outcome = self
            .processor
            .process_batch(work_batch(self.registry.pending_work(&dir_str)));

        self.persist_directory(&dir_str);

        if outcome.succeeded > 0 {
            if let Some(hook) = self.repaint.lock().as_ref() {
                hook();
            }
        }

        Ok(outcome)
    }

    /// Batch-upsert every dirty item of the directory, then mark the
    /// committed rows synced.
    fn persist_directory(&self, dir_str: &str) {
        let dirty = self.registry.dirty_rows(dir_str);
        if dirty.is_empty() {
            return;
        }

        let rows: Vec<CachedRow> = dirty.iter().map(|(_, row)| row.clone()).collect();
        if self.store.upsert_batch(&rows) > 0 {
            let paths: Vec<String> = dirty.into_iter().map(|(path, _)| path).collect();
            self.registry.mark_synced(&paths);
        }
    }

    /// Cancel the in-flight batch and rescan on a background thread.
    pub fn rescan_async(&self, dir: PathBuf) -> JoinHandle<()> {
        self.processor.cancel();

        let weak = self.self_weak.clone();
        std::thread::Builder::new()
            .name("thumb-rescan".to_string())
            .spawn(move || {
                let Some(pipeline) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = pipeline.refresh_directory(&dir) {
                    log::error!("rescan of {} failed: {}", dir.display(), e);
                }
            })
            .expect("failed to spawn rescan thread")
    }

    /// Render-path contract: record a decoded-size mismatch.
    pub fn report_mismatch(&self, path: &str) {
        self.monitor.report_mismatch(path);
    }

    /// Render-path contract: opportunistically start a refresh round.
    pub fn flush_if_idle(&self) -> bool {
        self.monitor.flush_if_idle()
    }

    /// Watch a directory; filesystem bursts trigger a debounced rescan.
    pub fn watch(&self, dir: &Path) -> Result<()> {
        let mut guard = self.watcher.lock();
        if guard.is_none() {
            let weak = self.self_weak.clone();
            let quiet = Duration::from_secs(self.config.quiet_period_secs);
            *guard = Some(DirectoryWatcher::new(quiet, move |dir: PathBuf| {
                if let Some(pipeline) = weak.upgrade() {
                    pipeline.rescan_async(dir);
                }
            })?);
        }
        if let Some(watcher) = guard.as_mut() {
            watcher.set_path(Some(dir));
        }
        Ok(())
    }

    /// Stop watching without triggering a rescan.
    pub fn unwatch(&self) {
        if let Some(watcher) = self.watcher.lock().as_mut() {
            watcher.set_path(None);
        }
    }

    /// Drain outstanding work and stop the worker pool.
    pub fn shutdown(&self) {
        self.unwatch();
        let _guard = self.scan_lock.lock();
        self.processor.shutdown();
    }
}
