//! Directory watch on the data file with a debounced reload trigger.
//!
//! The OS watch covers the parent directory (non-recursive) so the monitor
//! can start before the collector has written the file for the first time.
//! Events for other files, directories, reads and removals are dropped.
//! The first relevant event opens a debounce window; the reload fires once
//! the settle delay has passed, and further events inside the window are
//! ignored.

use log::{debug, error, info, warn};
use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchTiming {
    pub debounce_window: Duration,
    pub settle_delay: Duration,
}

impl Default for WatchTiming {
    fn default() -> Self {
        WatchTiming {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Data file path {0} has no file name")]
    InvalidPath(PathBuf),

    #[error("Failed to create file watcher: {0}")]
    Create(#[source] notify::Error),

    #[error("Failed to watch directory {path}: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Failed to spawn watcher thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Collapses a burst of events into one trigger.
///
/// Only the event that opens a burst is accepted; anything arriving within
/// `window` of it is rejected.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_trigger: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            last_trigger: None,
        }
    }

    pub fn try_trigger(&mut self, now: Instant) -> bool {
        match self.last_trigger {
            Some(last) if now.saturating_duration_since(last) <= self.window => false,
            _ => {
                self.last_trigger = Some(now);
                true
            }
        }
    }
}

pub(crate) enum WatchMessage {
    Event(notify::Result<Event>),
    Shutdown,
}

fn is_relevant(event: &Event, target_name: &OsStr) -> bool {
    let kind_matches = match event.kind {
        EventKind::Create(CreateKind::Folder) => false,
        EventKind::Create(_) | EventKind::Modify(_) => true,
        _ => false,
    };

    kind_matches
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(target_name))
}

/// Runs until a shutdown message arrives or every sender is gone.
/// A reload still waiting on its settle delay at shutdown is dropped.
pub(crate) fn run_event_loop<F>(
    rx: Receiver<WatchMessage>,
    target_name: OsString,
    timing: WatchTiming,
    on_change: F,
) where
    F: Fn(),
{
    let mut debouncer = Debouncer::new(timing.debounce_window);
    let mut pending: Option<Instant> = None;

    loop {
        let message = match pending {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    pending = None;
                    on_change();
                    continue;
                }
                match rx.recv_timeout(deadline - now) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            WatchMessage::Shutdown => break,
            WatchMessage::Event(Ok(event)) => {
                if !is_relevant(&event, &target_name) {
                    continue;
                }
                let now = Instant::now();
                if debouncer.try_trigger(now) {
                    debug!("Detected change in {:?}, reload scheduled", event.paths);
                    pending = Some(now + timing.settle_delay);
                }
            }
            WatchMessage::Event(Err(e)) => warn!("File watcher error: {e}"),
        }
    }
}

pub struct FileWatchMonitor {
    watcher: Option<RecommendedWatcher>,
    control: Sender<WatchMessage>,
    handle: Option<JoinHandle<()>>,
    watched_dir: PathBuf,
}

impl FileWatchMonitor {
    /// Registers a watch on the parent directory of `target` and spawns the
    /// event thread. `on_change` runs on that thread once per debounced burst.
    pub fn start<F>(target: &Path, timing: WatchTiming, on_change: F) -> Result<Self, WatchError>
    where
        F: Fn() + Send + 'static,
    {
        let target_name = target
            .file_name()
            .ok_or_else(|| WatchError::InvalidPath(target.to_path_buf()))?
            .to_os_string();
        let watched_dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel();
        let event_tx = tx.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver only disappears once the event thread has exited
            let _ = event_tx.send(WatchMessage::Event(res));
        })
        .map_err(WatchError::Create)?;

        watcher
            .watch(&watched_dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: watched_dir.clone(),
                source,
            })?;

        let handle = thread::Builder::new()
            .name("data-file-watcher".to_string())
            .spawn(move || run_event_loop(rx, target_name, timing, on_change))?;

        if !target.exists() {
            warn!(
                "Data file {} does not exist yet; watching {} for its creation",
                target.display(),
                watched_dir.display()
            );
        }
        info!("Started file watcher for {}", target.display());

        Ok(FileWatchMonitor {
            watcher: Some(watcher),
            control: tx,
            handle: Some(handle),
            watched_dir,
        })
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Unregisters the OS watch and joins the event thread. Safe to call twice.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.watched_dir) {
                debug!("Unwatching {} failed: {e}", self.watched_dir.display());
            }
        }

        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.control.send(WatchMessage::Shutdown);
        if handle.join().is_err() {
            error!("File watcher thread panicked");
        } else {
            info!("Stopped file watcher");
        }
    }
}

impl Drop for FileWatchMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
