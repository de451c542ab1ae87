//! The per-file item record.

use crate::codec::Rendered;
use crate::scan::ScanEntry;
use crate::store::CachedRow;
use chrono::{DateTime, Utc};

/// One image file known to the pipeline.
///
/// Identity is the absolute path; records live exclusively inside the
/// [`ItemRegistry`](super::ItemRegistry) map and every other structure
/// refers to them by path key only.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Absolute path of the source file
    pub path: String,
    /// Source file size in bytes
    pub size: u64,
    /// Source modification time
    pub modified: DateTime<Utc>,
    /// Source image width (0 until first decode)
    pub source_width: u32,
    /// Source image height (0 until first decode)
    pub source_height: u32,
    /// Encoded thumbnail payload; empty = no thumbnail available
    pub thumb: Vec<u8>,
    /// Width of the cached thumbnail payload
    pub thumb_width: u32,
    /// Height of the cached thumbnail payload
    pub thumb_height: u32,
    /// Source newer than the cached render, or invalidated by a
    /// resolution mismatch
    pub changed: bool,
    /// Cache write completed for the current payload
    pub synced: bool,
}

impl Item {
    /// Fresh record from filesystem metadata, before any generation.
    pub fn from_scan(entry: &ScanEntry) -> Self {
        Self {
            path: entry.path.clone(),
            size: entry.size,
            modified: entry.modified,
            source_width: 0,
            source_height: 0,
            thumb: Vec::new(),
            thumb_width: 0,
            thumb_height: 0,
            changed: false,
            synced: false,
        }
    }

    /// Whether a thumbnail payload is present.
    pub fn has_thumb(&self) -> bool {
        !self.thumb.is_empty()
    }

    /// The work-avoidance rule: an item needs generation only when its
    /// source changed or it has no payload yet.
    pub fn needs_work(&self) -> bool {
        self.changed || self.thumb.is_empty()
    }

    /// Store the result of a generation pass.
    pub fn apply_render(&mut self, rendered: Rendered) {
        self.thumb = rendered.payload;
        self.thumb_width = rendered.width;
        self.thumb_height = rendered.height;
        self.source_width = rendered.source_width;
        self.source_height = rendered.source_height;
        self.changed = false;
        self.synced = false;
    }

    /// The durable counterpart of this item's thumbnail.
    pub fn to_cached_row(&self) -> CachedRow {
        CachedRow::for_path(
            &self.path,
            self.thumb_width,
            self.thumb_height,
            self.thumb.clone(),
        )
    }
}
