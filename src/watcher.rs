//! Directory change watcher.
//!
//! Raw file system events arrive in bursts (copying ten shortcuts produces
//! dozens). They are collapsed into one refresh signal that fires once the
//! directory has been quiet for a full interval.

use anyhow::{Context, Result};
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Silence required after the last change before a refresh is signalled.
pub const QUIET_PERIOD: Duration = Duration::from_secs(1);

/// Wait on `rx`, calling `emit` once for every burst of messages followed
/// by `quiet` of silence. Returns when `cancel` is set or every sender is
/// gone.
pub fn debounce<T>(rx: &Receiver<T>, quiet: Duration, cancel: &AtomicBool, mut emit: impl FnMut()) {
    let mut pending = false;
    while !cancel.load(Ordering::Relaxed) {
        match rx.recv_timeout(quiet) {
            Ok(_) => pending = true,
            Err(RecvTimeoutError::Timeout) => {
                if pending {
                    pending = false;
                    emit();
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Watches a directory tree on a background thread. Dropping it stops the
/// thread.
pub struct DirWatcher {
    watcher: Option<notify::RecommendedWatcher>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DirWatcher {
    /// Start watching `dir`. `on_change` runs on the watcher thread and
    /// should only hand the signal over to the UI thread.
    pub fn start<F>(dir: &Path, quiet: Duration, on_change: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .context("Failed to create file watcher")?;
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("dir-watcher".into())
            .spawn(move || debounce(&rx, quiet, &flag, on_change))
            .context("Failed to start watcher thread")?;

        log::info!("Watching {}", dir.display());
        Ok(Self { watcher: Some(watcher), cancel, thread: Some(thread) })
    }

    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        // Dropping the watcher closes the channel and wakes the thread
        self.watcher.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use tempfile::TempDir;

    const QUIET: Duration = Duration::from_millis(100);

    fn run(events: impl FnOnce(&mpsc::Sender<()>) + Send + 'static) -> usize {
        let (tx, rx) = mpsc::channel();
        let fired = AtomicUsize::new(0);
        let cancel = AtomicBool::new(false);
        let producer = std::thread::spawn(move || {
            events(&tx);
            // Stay connected long enough for the quiet period to pass
            std::thread::sleep(QUIET * 3);
        });
        debounce(&rx, QUIET, &cancel, || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        producer.join().unwrap();
        fired.load(Ordering::SeqCst)
    }

    #[test]
    fn test_single_event_fires_once() {
        assert_eq!(run(|tx| tx.send(()).unwrap()), 1);
    }

    #[test]
    fn test_burst_fires_once() {
        let fired = run(|tx| {
            for _ in 0..3 {
                tx.send(()).unwrap();
                std::thread::sleep(QUIET / 4);
            }
        });
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_separate_bursts_fire_separately() {
        let fired = run(|tx| {
            tx.send(()).unwrap();
            std::thread::sleep(QUIET * 3);
            tx.send(()).unwrap();
        });
        assert_eq!(fired, 2);
    }

    #[test]
    fn test_silence_never_fires() {
        assert_eq!(run(|_| ()), 0);
    }

    #[test]
    fn test_cancel_stops_loop() {
        let (_tx, rx) = mpsc::channel::<()>();
        let cancel = AtomicBool::new(true);
        let start = Instant::now();
        debounce(&rx, QUIET, &cancel, || panic!("should not fire"));
        assert!(start.elapsed() < QUIET);
    }

    #[test]
    fn test_dir_watcher_signals_change() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let watcher = DirWatcher::start(dir.path(), QUIET, move || {
            let _ = tx.send(());
        })
        .unwrap();

        std::fs::write(dir.path().join("new.lnk"), "x").unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        drop(watcher);
    }
}
