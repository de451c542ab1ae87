//! thumbcache — a background thumbnail pipeline for image folders.
//!
//! Given a directory of images, the pipeline produces, persists and keeps
//! synchronized small rendered previews without blocking an interactive
//! viewer and without redundant decode/resize work across sessions:
//!
//! - a durable SQLite store maps `(dir_key, item_key)` to encoded
//!   thumbnails ([`store`]),
//! - a bounded worker pool decodes and resizes sources ([`pipeline`]),
//! - a change monitor regenerates thumbnails whose cached render no
//!   longer matches what the viewer needs ([`pipeline::monitor`]),
//! - a debounced filesystem watcher triggers rescans after a directory
//!   settles ([`watch`]).
//!
//! The windowing shell, drawing code and debug servers are integrations
//! on top: they read item snapshots out of the [`state::ItemRegistry`],
//! report size mismatches, and repaint when the pipeline signals.
//!
//! ```no_run
//! use std::path::Path;
//! use thumbcache::{CacheStore, Pipeline, PipelineConfig};
//!
//! let store = CacheStore::open_default().expect("cache store unavailable");
//! let pipeline = Pipeline::new(PipelineConfig::default(), store);
//!
//! let _scan = pipeline.rescan_async(Path::new("/photos/holiday").to_path_buf());
//! pipeline.watch(Path::new("/photos/holiday")).ok();
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod hash;
pub mod pipeline;
pub mod scan;
pub mod state;
pub mod store;
pub mod watch;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{BatchOutcome, ContentMonitor, ImageProcessor, Pipeline};
pub use state::{Item, ItemRegistry};
pub use store::{CachedRow, CacheStore};
pub use watch::DirectoryWatcher;
