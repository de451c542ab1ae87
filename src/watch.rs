//! Filesystem change detection with a debounce window.
//!
//! Editors, copy tools and cache writes emit bursts of events; rescanning
//! on each one would thrash. Every relevant event resets a single
//! deadline instead, and one rescan fires only after the directory has
//! been quiet for the configured period.

use crate::error::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fired with the directory to rescan once a burst has settled.
pub type RescanHook = Box<dyn Fn(PathBuf) + Send>;

/// One filtered filesystem event, stamped with the watch generation it
/// belongs to so a path switch cancels in-flight debounce waits.
struct Pulse {
    generation: u64,
    dir: PathBuf,
}

/// Watches at most one directory at a time: `Idle -> Watching -> Idle`.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    watched: Arc<Mutex<Option<PathBuf>>>,
    generation: Arc<AtomicU64>,
}

impl DirectoryWatcher {
    /// Create the watcher and its debounce thread.
    ///
    /// `on_rescan` runs on the debounce thread after each settled burst;
    /// it must hand off to a background rescan rather than block.
    pub fn new(quiet: Duration, on_rescan: impl Fn(PathBuf) + Send + 'static) -> Result<Self> {
        let (pulse_tx, pulse_rx) = unbounded::<Pulse>();
        let generation = Arc::new(AtomicU64::new(0));
        let watched = Arc::new(Mutex::new(None::<PathBuf>));

        {
            let generation = Arc::clone(&generation);
            std::thread::Builder::new()
                .name("thumb-debounce".to_string())
                .spawn(move || debounce_loop(pulse_rx, quiet, generation, Box::new(on_rescan)))?;
        }

        let event_tx = pulse_tx;
        let event_generation = Arc::clone(&generation);
        let event_watched = Arc::clone(&watched);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_relevant(&event.kind) {
                    return;
                }
                let dir = event_watched.lock().clone();
                if let Some(dir) = dir {
                    let _ = event_tx.send(Pulse {
                        generation: event_generation.load(Ordering::SeqCst),
                        dir,
                    });
                }
            }
            Err(e) => log::warn!("watch event error: {}", e),
        })?;

        Ok(Self {
            watcher,
            watched,
            generation,
        })
    }

    /// Switch the watched directory.
    ///
    /// Any previous watch is removed first and its pending debounce wait
    /// cancelled; `None` clears the watch with no rescan. Watch install
    /// failures are logged and the path abandoned — a manual rescan still
    /// works, automatic ones just stop for that directory.
    pub fn set_path(&mut self, path: Option<&Path>) {
        if let Some(old) = self.watched.lock().take() {
            if let Err(e) = self.watcher.unwatch(&old) {
                log::warn!("failed to unwatch {}: {}", old.display(), e);
            }
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        let Some(dir) = path else {
            return;
        };

        match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                *self.watched.lock() = Some(dir.to_path_buf());
                log::info!("watching {} for changes", dir.display());
            }
            Err(e) => {
                log::warn!(
                    "cannot watch {} ({}); automatic rescans disabled for it",
                    dir.display(),
                    e
                );
            }
        }
    }

    /// Directory currently being watched, if any.
    pub fn watched(&self) -> Option<PathBuf> {
        self.watched.lock().clone()
    }
}

/// Event kinds that can change what a directory scan would see.
fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Coalesce event bursts into single rescans.
///
/// Blocks for the first event of a burst, then keeps resetting the
/// deadline while more arrive; once the quiet period passes uninterrupted
/// it fires exactly one rescan — unless the watch generation moved, which
/// means the path changed mid-wait and the burst is stale. Exits when all
/// senders are gone.
fn debounce_loop(
    rx: Receiver<Pulse>,
    quiet: Duration,
    generation: Arc<AtomicU64>,
    on_rescan: RescanHook,
) {
    loop {
        let mut last = match rx.recv() {
            Ok(pulse) => pulse,
            Err(_) => return,
        };

        loop {
            match rx.recv_timeout(quiet) {
                Ok(pulse) => last = pulse,
                Err(RecvTimeoutError::Timeout) => {
                    if last.generation == generation.load(Ordering::SeqCst) {
                        log::info!("directory settled, rescanning {}", last.dir.display());
                        on_rescan(last.dir.clone());
                    }
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use std::fs;
    use std::sync::mpsc;
    use std::time::Instant;

    const QUIET: Duration = Duration::from_millis(150);

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Run a debounce loop against hand-fed pulses.
    struct Harness {
        tx: Sender<Pulse>,
        generation: Arc<AtomicU64>,
        fired: mpsc::Receiver<PathBuf>,
    }

    fn harness() -> Harness {
        let (tx, rx) = unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let (fired_tx, fired) = mpsc::channel();
        let gen_clone = Arc::clone(&generation);
        std::thread::spawn(move || {
            debounce_loop(
                rx,
                QUIET,
                gen_clone,
                Box::new(move |dir| {
                    let _ = fired_tx.send(dir);
                }),
            )
        });
        Harness {
            tx,
            generation,
            fired,
        }
    }

    impl Harness {
        fn pulse(&self, dir: &str) {
            let _ = self.tx.send(Pulse {
                generation: self.generation.load(Ordering::SeqCst),
                dir: PathBuf::from(dir),
            });
        }
    }

    #[test]
    fn test_burst_fires_exactly_once() {
        let h = harness();
        for _ in 0..10 {
            h.pulse("/photos");
            std::thread::sleep(Duration::from_millis(5));
        }

        let fired = h.fired.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(fired, PathBuf::from("/photos"));
        assert!(h
            .fired
            .recv_timeout(QUIET * 3)
            .is_err(), "burst must coalesce into a single rescan");
    }

    #[test]
    fn test_events_inside_quiet_window_reset_the_deadline() {
        let h = harness();
        let start = Instant::now();

        // Keep the burst alive well past one quiet period
        for _ in 0..6 {
            h.pulse("/photos");
            std::thread::sleep(Duration::from_millis(40));
        }

        let _ = h.fired.recv_timeout(Duration::from_secs(2)).unwrap();
        // The rescan cannot fire before the last event of the burst
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_generation_bump_cancels_pending_fire() {
        let h = harness();
        h.pulse("/photos");
        // Path switched away before the quiet period elapsed
        h.generation.fetch_add(1, Ordering::SeqCst);

        assert!(h.fired.recv_timeout(QUIET * 3).is_err());
    }

    #[test]
    fn test_separate_bursts_fire_separately() {
        let h = harness();
        h.pulse("/one");
        let first = h.fired.recv_timeout(Duration::from_secs(2)).unwrap();
        h.pulse("/two");
        let second = h.fired.recv_timeout(Duration::from_secs(2)).unwrap();

        assert_eq!(first, PathBuf::from("/one"));
        assert_eq!(second, PathBuf::from("/two"));
    }

    #[test]
    fn test_loop_exits_on_disconnect() {
        let (tx, rx) = unbounded::<Pulse>();
        let generation = Arc::new(AtomicU64::new(0));
        let handle = std::thread::spawn(move || {
            debounce_loop(rx, QUIET, generation, Box::new(|_| {}));
        });
        drop(tx);
        handle.join().unwrap();
    }

    #[test]
    fn test_watcher_set_path_state_machine() {
        let dir = scratch_dir("thumbcache_watch_state");
        let mut watcher = DirectoryWatcher::new(QUIET, |_| {}).unwrap();

        assert!(watcher.watched().is_none());
        watcher.set_path(Some(dir.as_path()));
        assert_eq!(watcher.watched().as_deref(), Some(dir.as_path()));
        watcher.set_path(None);
        assert!(watcher.watched().is_none());

        // A path that cannot be watched is abandoned, not fatal
        watcher.set_path(Some(Path::new("/nonexistent/thumbcache_watch")));
        assert!(watcher.watched().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_real_fs_event_triggers_rescan() {
        let dir = scratch_dir("thumbcache_watch_real");
        let (fired_tx, fired) = mpsc::channel();
        let mut watcher = DirectoryWatcher::new(QUIET, move |d| {
            let _ = fired_tx.send(d);
        })
        .unwrap();
        watcher.set_path(Some(dir.as_path()));

        fs::write(dir.join("new.jpg"), b"x").unwrap();

        let rescanned = fired.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(rescanned, dir);

        let _ = fs::remove_dir_all(&dir);
    }
}
