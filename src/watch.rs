// ABOUTME: Watch module for live reloading presentations
// ABOUTME: Watches a path and fans reload messages out to every connected viewer channel

use log::{debug, error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};

use crate::errors::{RevelationError, Result};
use crate::utils;

/// Default time to wait for a burst of edits to settle
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Message pushed to viewers when the watched path changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadMessage {
    pub msg_type: String,
    pub message: String,
}

impl ReloadMessage {
    pub fn reload() -> Self {
        Self {
            msg_type: "message".to_string(),
            message: "reload".to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Open channels of one session. Every add, remove and broadcast goes
/// through the one lock.
#[derive(Default)]
struct Hub {
    channels: Mutex<HashMap<u64, mpsc::Sender<ReloadMessage>>>,
    next_id: AtomicU64,
}

impl Hub {
    fn open(&self) -> (u64, mpsc::Receiver<ReloadMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.channels.lock().insert(id, tx);
        (id, rx)
    }

    fn remove(&self, id: u64) {
        self.channels.lock().remove(&id);
    }

    /// Send one reload message to every open channel and return how many
    /// received it. Channels whose viewer already hung up are dropped.
    fn broadcast(&self) -> usize {
        let message = ReloadMessage::reload();
        let mut channels = self.channels.lock();

        channels.retain(|id, tx| match tx.send(message.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!("Channel {} closed before reload could be delivered", id);
                false
            }
        });

        channels.len()
    }

    fn len(&self) -> usize {
        self.channels.lock().len()
    }

    fn clear(&self) {
        self.channels.lock().clear();
    }
}

/// Decides whether a reported path belongs to the watched target
#[derive(Debug, Clone)]
enum WatchTarget {
    File(PathBuf),
    Directory(PathBuf),
}

impl WatchTarget {
    fn matches(&self, path: &Path) -> bool {
        match self {
            WatchTarget::File(file) => path == file,
            WatchTarget::Directory(dir) => path.starts_with(dir),
        }
    }

    fn path(&self) -> &Path {
        match self {
            WatchTarget::File(path) | WatchTarget::Directory(path) => path,
        }
    }
}

/// Turns filesystem events into broadcasts on the hub
#[derive(Clone)]
struct Broadcaster {
    target: WatchTarget,
    hub: Arc<Hub>,
}

impl Broadcaster {
    /// Broadcast once if any of `paths` is under the target.
    /// Returns whether a broadcast happened.
    fn handle<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> bool {
        let relevant = paths.into_iter().any(|path| self.target.matches(path));
        if relevant {
            let delivered = self.hub.broadcast();
            info!("Change detected, reloading {} viewer(s)", delivered);
        }
        relevant
    }

    fn run(self, rx: mpsc::Receiver<DebounceEventResult>) {
        for result in rx {
            match result {
                Ok(events) => {
                    let paths = events
                        .iter()
                        .filter(|event| !matches!(event.kind, EventKind::Access(_)))
                        .flat_map(|event| event.paths.iter().map(PathBuf::as_path));
                    self.handle(paths);
                }
                Err(errors) => {
                    for e in errors {
                        error!("Watch error: {:?}", e);
                    }
                }
            }
        }
        debug!("Watcher for {:?} stopped", self.target.path());
    }
}

/// A filesystem watch on one path plus the viewer channels it feeds.
///
/// Events are debounced on notify's thread and handed to a dedicated
/// broadcaster thread, so slow viewers never block the watcher.
pub struct WatchSession {
    broadcaster: Broadcaster,
    debouncer: Mutex<Option<Debouncer<RecommendedWatcher, FileIdMap>>>,
}

impl WatchSession {
    /// Watch `path` (a file or a directory, recursively)
    pub fn watch(path: &Path) -> Result<Self> {
        Self::with_debounce(path, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(path: &Path, debounce: Duration) -> Result<Self> {
        let absolute = utils::get_absolute_path(path)?;

        // Editors often replace files instead of writing in place, which
        // drops a watch set on the file itself. Watch the parent instead.
        let (target, watch_root, mode) = if absolute.is_dir() {
            (
                WatchTarget::Directory(absolute.clone()),
                absolute,
                RecursiveMode::Recursive,
            )
        } else {
            let parent = absolute
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| RevelationError::Watch(format!("{:?} has no parent", absolute)))?;
            (WatchTarget::File(absolute), parent, RecursiveMode::NonRecursive)
        };

        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, None, tx)
            .map_err(|e| RevelationError::Watch(format!("Failed to create file watcher: {}", e)))?;

        debouncer.watcher().watch(&watch_root, mode).map_err(|e| {
            RevelationError::Watch(format!("Failed to watch {:?}: {}", watch_root, e))
        })?;

        let broadcaster = Broadcaster {
            target,
            hub: Arc::new(Hub::default()),
        };

        let worker = broadcaster.clone();
        thread::Builder::new()
            .name("revelation-reload".to_string())
            .spawn(move || worker.run(rx))?;

        info!("Watching {:?} for changes", broadcaster.target.path());

        Ok(Self {
            broadcaster,
            debouncer: Mutex::new(Some(debouncer)),
        })
    }

    /// The watched path, made absolute
    pub fn path(&self) -> &Path {
        self.broadcaster.target.path()
    }

    /// Open a new channel. It receives every reload broadcast from now on.
    pub fn subscribe(&self) -> Channel {
        let (id, rx) = self.broadcaster.hub.open();
        debug!("Channel {} subscribed", id);
        Channel {
            id,
            rx,
            hub: Arc::downgrade(&self.broadcaster.hub),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.broadcaster.hub.len()
    }

    /// Feed paths to the session as if the watcher had reported them
    /// changed. Returns whether a reload was broadcast.
    pub fn dispatch<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.broadcaster.handle(paths)
    }

    pub fn is_open(&self) -> bool {
        self.debouncer.lock().is_some()
    }

    /// Stop watching and release the OS watch. Open channels are
    /// disconnected. Calling it again does nothing.
    pub fn close(&self) {
        let Some(debouncer) = self.debouncer.lock().take() else {
            return;
        };

        debouncer.stop();
        self.broadcaster.hub.clear();
        info!("Stopped watching {:?}", self.path());
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// One viewer's receiving end. Closing or dropping it unsubscribes it.
pub struct Channel {
    id: u64,
    rx: mpsc::Receiver<ReloadMessage>,
    hub: Weak<Hub>,
}

impl Channel {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the next message. `None` once the session is closed.
    pub fn recv(&self) -> Option<ReloadMessage> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<ReloadMessage, mpsc::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<ReloadMessage> {
        self.rx.try_recv().ok()
    }

    pub fn close(self) {}
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
            debug!("Channel {} closed", self.id);
        }
    }
}
