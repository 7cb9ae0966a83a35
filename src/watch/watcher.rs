//! Filesystem watcher driving store invalidation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

use crate::config::WatcherConfig;
use crate::observability::metrics;
use crate::vfs::VirtualStore;
use crate::watch::apply::apply_batch;

/// How often an idle watcher thread checks for shutdown.
const IDLE_TICK: Duration = Duration::from_millis(100);
/// A batch is flushed after this many debounce windows even if events keep coming.
const MAX_DELAY_WINDOWS: u32 = 20;

/// Watcher could not start. Serving continues without hot reload.
#[derive(Debug, Error)]
pub enum WatchInitError {
    #[error("document root {0} does not exist or is not a directory")]
    RootMissing(PathBuf),

    #[error("file watching backend failed: {0}")]
    Backend(#[from] notify::Error),

    #[error("failed to spawn watcher thread: {0}")]
    Thread(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
}

enum Backend {
    Native(RecommendedWatcher),
    Poll(PollWatcher),
}

impl Backend {
    fn kind(&self) -> &'static str {
        match self {
            Backend::Native(_) => "native",
            Backend::Poll(_) => "poll",
        }
    }
}

#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    batches: AtomicU64,
    changes: AtomicU64,
}

/// Configures and starts watching a store's document root.
#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    store: Arc<VirtualStore>,
    config: WatcherConfig,
}

impl ChangeWatcher {
    pub fn new(store: Arc<VirtualStore>, config: WatcherConfig) -> Self {
        Self { store, config }
    }

    /// Subscribe to the document root and spawn the applying thread.
    pub fn start(self) -> Result<WatcherHandle, WatchInitError> {
        let root = self.store.disk_root().to_path_buf();
        if !root.is_dir() {
            return Err(WatchInitError::RootMissing(root));
        }

        let (tx, rx) = mpsc::channel();
        let backend = self.backend(&root, tx)?;
        let shared = Arc::new(Shared::default());

        let thread = {
            let store = self.store.clone();
            let shared = shared.clone();
            let debounce = Duration::from_millis(self.config.debounce_ms.max(1));
            std::thread::Builder::new()
                .name("bridge-watcher".to_string())
                .spawn(move || run(&store, &rx, &shared, debounce))
                .map_err(WatchInitError::Thread)?
        };

        tracing::info!(
            root = %root.display(),
            backend = backend.kind(),
            debounce_ms = self.config.debounce_ms,
            "Change watcher started"
        );
        Ok(WatcherHandle {
            state: WatchState::Watching,
            backend: Some(backend),
            shared,
            thread: Some(thread),
        })
    }

    fn backend(&self, root: &Path, tx: Sender<notify::Result<Event>>) -> Result<Backend, WatchInitError> {
        if !self.config.force_polling {
            let native = RecommendedWatcher::new(tx.clone(), notify::Config::default()).and_then(
                |mut watcher| {
                    watcher.watch(root, RecursiveMode::Recursive)?;
                    Ok(watcher)
                },
            );
            match native {
                Ok(watcher) => return Ok(Backend::Native(watcher)),
                Err(e) => tracing::warn!(error = %e, "Native file watching unavailable, falling back to polling"),
            }
        }

        let config = notify::Config::default()
            .with_poll_interval(Duration::from_millis(self.config.poll_interval_ms.max(1)))
            .with_compare_contents(true);
        let mut watcher = PollWatcher::new(tx, config)?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Backend::Poll(watcher))
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

fn run(store: &VirtualStore, rx: &Receiver<notify::Result<Event>>, shared: &Shared, debounce: Duration) {
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
    let mut first_seen: Option<Instant> = None;
    let max_delay = debounce * MAX_DELAY_WINDOWS;

    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        let overdue = first_seen.is_some_and(|t| t.elapsed() >= max_delay);
        if !overdue {
            let wait = if pending.is_empty() { IDLE_TICK } else { debounce };
            match rx.recv_timeout(wait) {
                Ok(Ok(event)) => {
                    if is_relevant(&event.kind) && !event.paths.is_empty() {
                        pending.extend(event.paths);
                        first_seen.get_or_insert_with(Instant::now);
                    }
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "File watch error");
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if !pending.is_empty() {
            flush(store, shared, std::mem::take(&mut pending));
            first_seen = None;
        }
    }

    if !pending.is_empty() && !shared.stop.load(Ordering::Acquire) {
        flush(store, shared, pending);
    }
    tracing::debug!("Change watcher thread exiting");
}

fn flush(store: &VirtualStore, shared: &Shared, paths: BTreeSet<PathBuf>) {
    let count = paths.len();
    let summary = apply_batch(store, paths);
    shared.batches.fetch_add(1, Ordering::AcqRel);
    shared
        .changes
        .fetch_add(summary.changes() as u64, Ordering::AcqRel);
    metrics::record_watch_events(summary.changes());
    tracing::info!(
        paths = count,
        registered = summary.registered,
        removed = summary.removed,
        skipped = summary.skipped,
        epoch = store.epoch(),
        "Applied filesystem changes"
    );
}

/// Running watcher. Dropping it stops watching and joins the thread.
pub struct WatcherHandle {
    state: WatchState,
    backend: Option<Backend>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// A handle that watches nothing (frozen mode or failed start).
    pub fn idle() -> Self {
        Self {
            state: WatchState::Idle,
            backend: None,
            shared: Arc::new(Shared::default()),
            thread: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// `native` or `poll` while watching.
    pub fn backend(&self) -> Option<&'static str> {
        self.backend.as_ref().map(Backend::kind)
    }

    /// Number of coalesced batches applied so far.
    pub fn batches_applied(&self) -> u64 {
        self.shared.batches.load(Ordering::Acquire)
    }

    /// Number of store entries registered or removed so far.
    pub fn changes_applied(&self) -> u64 {
        self.shared.changes.load(Ordering::Acquire)
    }

    /// Stop watching. Idempotent.
    pub fn stop(&mut self) {
        if self.state == WatchState::Idle {
            return;
        }
        self.shared.stop.store(true, Ordering::Release);
        self.backend = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Change watcher thread panicked");
            }
        }
        self.state = WatchState::Idle;
        tracing::info!("Change watcher stopped");
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("state", &self.state)
            .field("backend", &self.backend())
            .field("batches_applied", &self.batches_applied())
            .finish()
    }
}
