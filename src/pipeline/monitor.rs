//! Resolution-mismatch detection and silent background refresh.
//!
//! The render path sometimes decodes a cached thumbnail at a size that no
//! longer matches the freshly computed fit box (the cache predates a box
//! change, or held a smaller low-priority render). Fixing that must never
//! block drawing: mismatches are collected here, deduplicated, and
//! drained through the same worker-pool channel the full scans use.
//!
//! Mismatches are rare and localized (the user scrolling into view), so a
//! dedup-and-drain loop beats a priority queue; what matters is that no
//! path is ever regenerated twice concurrently and no request is lost.

use crate::state::ItemRegistry;
use crate::store::CacheStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::processor::{work_batch, ImageProcessor};

/// Invalidate/repaint signal back to the drawing layer.
pub type RepaintHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct MonitorState {
    /// Observed mismatched, not yet queued
    change_set: HashMap<String, ()>,
    /// Dispatched in the current refresh round; blocks re-submission
    done_set: HashMap<String, ()>,
    /// Exactly one refresh round runs at a time
    active: bool,
}

struct MonitorInner {
    state: Mutex<MonitorState>,
    registry: Arc<ItemRegistry>,
    store: Arc<CacheStore>,
    processor: Arc<ImageProcessor>,
    repaint: Mutex<Option<RepaintHook>>,
}

pub struct ContentMonitor {
    inner: Arc<MonitorInner>,
}

impl ContentMonitor {
    pub fn new(
        registry: Arc<ItemRegistry>,
        store: Arc<CacheStore>,
        processor: Arc<ImageProcessor>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                state: Mutex::new(MonitorState::default()),
                registry,
                store,
                processor,
                repaint: Mutex::new(None),
            }),
        }
    }

    /// Install the repaint signal fired after a round with successes.
    pub fn set_repaint_hook(&self, hook: RepaintHook) {
        *self.inner.repaint.lock() = Some(hook);
    }

    /// Record a size mismatch observed by the render path.
    ///
    /// Called synchronously while drawing, possibly from several
    /// concurrent passes; duplicates and paths already owned by an
    /// in-flight round are dropped here.
    pub fn report_mismatch(&self, path: &str) {
        if !self.inner.registry.contains(path) {
            return;
        }
        let mut state = self.inner.state.lock();
        if state.done_set.contains_key(path) || state.change_set.contains_key(path) {
            return;
        }
        state.change_set.insert(path.to_string(), ());
    }

    /// Number of mismatches waiting for the next round.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().change_set.len()
    }

    /// Whether a refresh round is currently in flight.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Start one background refresh round if none is running and work is
    /// waiting. Called opportunistically after each paint pass; returns
    /// whether a round started.
    pub fn flush_if_idle(&self) -> bool {
        let keys: Vec<String> = {
            let mut state = self.inner.state.lock();
            if state.active || state.change_set.is_empty() {
                return false;
            }
            let keys: Vec<String> = state.change_set.drain().map(|(k, _)| k).collect();
            for key in &keys {
                state.done_set.insert(key.clone(), ());
            }
            state.active = true;
            keys
        };

        log::debug!("refresh round starting with {} items", keys.len());

        let inner = Arc::clone(&self.inner);
        std::thread::Builder::new()
            .name("thumb-refresh".to_string())
            .spawn(move || inner.run_round(keys))
            .expect("failed to spawn refresh round");

        true
    }
}

impl MonitorInner {
    fn run_round(&self, keys: Vec<String>) {
        // The round owns these paths for its duration: the dedup sets keep
        // the render path from re-submitting them, and a concurrent scan
        // batch skips them only through the usual work-avoidance rule
        for key in &keys {
            self.registry.mark_changed(key);
        }

        let outcome = self.processor.process_batch(work_batch(keys.clone()));

        // One single-row transaction per corrected item; cheaper batching
        // is not worth starving the main scan path for
        for key in &keys {
            let row = self.registry.with_item(key, |item| {
                (!item.synced && item.has_thumb()).then(|| item.to_cached_row())
            });
            if let Some(Some(row)) = row {
                if self.store.upsert_one(&row) {
                    self.registry.mark_synced(std::slice::from_ref(key));
                }
            }
        }

        {
            let mut state = self.state.lock();
            state.done_set.clear();
            state.active = false;
        }

        if outcome.succeeded > 0 {
            log::info!("refresh round regenerated {} thumbnails", outcome.succeeded);
            if let Some(hook) = self.repaint.lock().as_ref() {
                hook();
            }
        }
    }
}
