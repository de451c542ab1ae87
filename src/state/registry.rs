//! The shared item registry.
//!
//! One owning map from absolute path to [`Item`], shared by the scanner,
//! the worker pool, the change monitor and the render path. All other
//! structures (work batches, monitor sets) hold path keys only — never a
//! second reference to the record — so there is exactly one place an
//! item's state can live.
//!
//! Lock discipline: the map lock is held only for the field reads/writes
//! themselves. Decode and resize work always happens outside the lock;
//! exclusivity of a record during a batch comes from each path being
//! dispatched to exactly one worker.

use super::item::Item;
use crate::hash;
use crate::scan::ScanEntry;
use crate::store::CachedRow;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::Path;

fn parent_of(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[derive(Default)]
pub struct ItemRegistry {
    items: RwLock<HashMap<String, Item>>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.read().contains_key(path)
    }

    /// Snapshot of one record, for the render path.
    pub fn get_cloned(&self, path: &str) -> Option<Item> {
        self.items.read().get(path).cloned()
    }

    /// Run a closure against one record.
    pub fn with_item<R>(&self, path: &str, f: impl FnOnce(&Item) -> R) -> Option<R> {
        self.items.read().get(path).map(f)
    }

    /// Run a closure against one record, mutably.
    pub fn with_item_mut<R>(&self, path: &str, f: impl FnOnce(&mut Item) -> R) -> Option<R> {
        self.items.write().get_mut(path).map(f)
    }

    /// Mark one item invalidated so the next generation pass rebuilds it.
    pub fn mark_changed(&self, path: &str) {
        if let Some(item) = self.items.write().get_mut(path) {
            item.changed = true;
        }
    }

    /// Bring the registry in line with a fresh scan of `dir`.
    ///
    /// Paths that vanished from the directory are evicted. Paths seen
    /// before keep their payload but get size/mtime refreshed, with
    /// `changed` set when the metadata moved. New paths enter clean with
    /// an empty payload.
    pub fn sync_directory(&self, dir: &str, entries: &[ScanEntry]) {
        let mut items = self.items.write();

        let keep: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        items.retain(|path, _| parent_of(path) != dir || keep.contains(path.as_str()));

        for entry in entries {
            match items.get_mut(&entry.path) {
                Some(item) => {
                    let moved = item.size != entry.size || item.modified != entry.modified;
                    item.size = entry.size;
                    item.modified = entry.modified;
                    // Never clear a pending flag here; only a completed
                    // generation pass may do that
                    if moved {
                        item.changed = true;
                    }
                }
                None => {
                    items.insert(entry.path.clone(), Item::from_scan(entry));
                }
            }
        }
    }

    /// Apply cached rows from the store to the items of one directory.
    ///
    /// Rows are matched by item key. Items that already hold an in-memory
    /// payload are left alone — a live render is never clobbered by an
    /// older persisted one. Returns the number of items hydrated.
    pub fn hydrate(&self, dir: &str, rows: &[CachedRow]) -> usize {
        if rows.is_empty() {
            return 0;
        }

        let by_key: HashMap<u32, &CachedRow> =
            rows.iter().map(|r| (r.item_key, r)).collect();

        let mut items = self.items.write();
        let mut applied = 0;

        for (path, item) in items.iter_mut() {
            if parent_of(path) != dir || item.has_thumb() {
                continue;
            }
            if let Some(row) = by_key.get(&hash::item_key(path)) {
                item.thumb = row.payload.clone();
                item.thumb_width = row.width;
                item.thumb_height = row.height;
                item.synced = true;
                applied += 1;
            }
        }

        applied
    }

    /// Paths in `dir` that still need a generation pass.
    pub fn pending_work(&self, dir: &str) -> Vec<String> {
        self.items
            .read()
            .iter()
            .filter(|(path, item)| parent_of(path) == dir && item.needs_work())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// All item paths currently registered under `dir`.
    pub fn paths_in_dir(&self, dir: &str) -> Vec<String> {
        self.items
            .read()
            .keys()
            .filter(|path| parent_of(path) == dir)
            .cloned()
            .collect()
    }

    /// Durable rows for every unsynced item of `dir` that has a payload.
    pub fn dirty_rows(&self, dir: &str) -> Vec<(String, CachedRow)> {
        self.items
            .read()
            .iter()
            .filter(|(path, item)| {
                parent_of(path) == dir && !item.synced && item.has_thumb()
            })
            .map(|(path, item)| (path.clone(), item.to_cached_row()))
            .collect()
    }

    /// Flip `synced` after the store committed these paths.
    pub fn mark_synced(&self, paths: &[String]) {
        let mut items = self.items.write();
        for path in paths {
            if let Some(item) = items.get_mut(path) {
                item.synced = true;
            }
        }
    }
}
