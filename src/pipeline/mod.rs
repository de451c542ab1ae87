/// Background generation pipeline
///
/// - Worker pool and batch protocol (processor.rs)
/// - Mismatch detection and silent refresh rounds (monitor.rs)
/// - The facade wiring scans, workers, store and watcher (driver.rs)

pub mod driver;
pub mod monitor;
pub mod processor;

pub use driver::Pipeline;
pub use monitor::{ContentMonitor, RepaintHook};
pub use processor::{
    work_batch, BatchOutcome, CancelHandle, ImageProcessor, WorkBatch,
};
