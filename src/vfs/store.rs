//! The unified virtual file store.
//!
//! # Responsibilities
//! - Merge disk, embedded and virtual files into one namespace
//! - Pick one authoritative file per path by fixed precedence
//! - Move / copy / remove atomically with respect to readers
//! - Advance a global version epoch on every mutation
//!
//! # Design Decisions
//! - Each path owns a slot with one layer per origin; the winner is
//!   recomputed when the slot changes so `resolve` is a single lookup
//! - All mutations happen under one write lock; readers see the state
//!   before or after a mutation, never in between
//! - Strict mode only rejects a path supplied by a *different* origin;
//!   same-origin overwrites (watcher refreshes) are always allowed

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::observability::metrics;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::file::{Content, Origin, VirtualFile};
use crate::vfs::materialize::{Materializer, ScriptLocation};
use crate::vfs::path::LogicalPath;

/// Ordered list of origins, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precedence([Origin; 3]);

impl Precedence {
    /// Build from an explicit order. Every origin must appear exactly once.
    pub fn from_order(order: &[Origin]) -> Option<Self> {
        let [a, b, c] = <[Origin; 3]>::try_from(order).ok()?;
        if a == b || b == c || a == c {
            return None;
        }
        Some(Self([a, b, c]))
    }

    pub fn order(&self) -> &[Origin; 3] {
        &self.0
    }

    fn winner(&self, layers: &Layers) -> Option<Arc<VirtualFile>> {
        self.0
            .iter()
            .find_map(|origin| layers[origin.index()].clone())
    }
}

impl Default for Precedence {
    fn default() -> Self {
        Self([Origin::Virtual, Origin::Embedded, Origin::Disk])
    }
}

/// Construction options for a [`VirtualStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Real directory disk-origin logical paths are relative to.
    pub disk_root: PathBuf,
    pub precedence: Precedence,
    pub strict_uniqueness: bool,
}

impl StoreOptions {
    pub fn new(disk_root: impl Into<PathBuf>) -> Self {
        Self {
            disk_root: disk_root.into(),
            precedence: Precedence::default(),
            strict_uniqueness: false,
        }
    }
}

type Layers = [Option<Arc<VirtualFile>>; 3];

#[derive(Debug, Default)]
struct Slot {
    layers: Layers,
    winner: Option<Arc<VirtualFile>>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.layers.iter().all(Option::is_none)
    }

    fn existing_other_than(&self, origin: Origin) -> Option<Origin> {
        Origin::ALL
            .into_iter()
            .find(|o| *o != origin && self.layers[o.index()].is_some())
    }
}

/// Atomic view of the namespace used to compile derived caches.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub epoch: u64,
    pub paths: Vec<LogicalPath>,
}

/// Content-addressable overlay of every script source.
#[derive(Debug)]
pub struct VirtualStore {
    options: StoreOptions,
    slots: RwLock<FxHashMap<LogicalPath, Slot>>,
    epoch: AtomicU64,
    materializer: Materializer,
}

impl VirtualStore {
    pub fn new(options: StoreOptions) -> VfsResult<Self> {
        Ok(Self {
            options,
            slots: RwLock::new(FxHashMap::default()),
            epoch: AtomicU64::new(0),
            materializer: Materializer::new()?,
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn disk_root(&self) -> &Path {
        &self.options.disk_root
    }

    /// Current version epoch. Advances on every successful mutation.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Number of logical paths with an authoritative file.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Insert or overwrite the `origin` layer of `path`.
    pub fn register(
        &self,
        origin: Origin,
        path: &str,
        content: Content,
    ) -> VfsResult<Arc<VirtualFile>> {
        let path = LogicalPath::parse_file(path)?;
        self.register_at(origin, path, content)
    }

    pub(crate) fn register_at(
        &self,
        origin: Origin,
        path: LogicalPath,
        content: Content,
    ) -> VfsResult<Arc<VirtualFile>> {
        let mut slots = self.slots.write();
        let slot = slots.entry(path.clone()).or_default();

        if self.options.strict_uniqueness {
            if let Some(existing) = slot.existing_other_than(origin) {
                return Err(VfsError::Conflict {
                    path: path.to_string(),
                    existing,
                    incoming: origin,
                });
            }
        }

        let version = self.bump();
        let file = Arc::new(VirtualFile::new(path.clone(), origin, content, version));
        slot.layers[origin.index()] = Some(file.clone());
        slot.winner = self.options.precedence.winner(&slot.layers);
        drop(slots);

        self.materializer.invalidate(&path);
        tracing::debug!(path = %path, origin = %origin, version, "Registered file");
        Ok(file)
    }

    /// Authoritative file for `path`.
    pub fn resolve(&self, path: &str) -> VfsResult<Arc<VirtualFile>> {
        let path = LogicalPath::parse(path)?;
        self.get(&path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    /// Lookup by an already-normalized path.
    pub fn get(&self, path: &LogicalPath) -> Option<Arc<VirtualFile>> {
        self.slots
            .read()
            .get(path)
            .and_then(|slot| slot.winner.clone())
    }

    pub fn contains(&self, path: &LogicalPath) -> bool {
        self.slots.read().contains_key(path)
    }

    /// Move the authoritative file at `src` to `dst`.
    ///
    /// Every layer at `src` is dropped and every layer at `dst` replaced.
    pub fn move_file(&self, src: &str, dst: &str) -> VfsResult<Arc<VirtualFile>> {
        let src = LogicalPath::parse_file(src)?;
        let dst = LogicalPath::parse_file(dst)?;
        if src == dst {
            return self.get(&src).ok_or_else(|| VfsError::NotFound(src.to_string()));
        }

        let mut slots = self.slots.write();
        let Some(file) = slots.remove(&src).and_then(|slot| slot.winner) else {
            return Err(VfsError::NotFound(src.to_string()));
        };
        let moved = self.place(&mut slots, &file, dst.clone());
        drop(slots);

        self.materializer.discard(&src);
        self.materializer.invalidate(&dst);
        tracing::debug!(from = %src, to = %dst, version = moved.version(), "Moved file");
        Ok(moved)
    }

    /// Copy the authoritative file at `src` to `dst`, replacing `dst`.
    pub fn copy_file(&self, src: &str, dst: &str) -> VfsResult<Arc<VirtualFile>> {
        let src = LogicalPath::parse_file(src)?;
        let dst = LogicalPath::parse_file(dst)?;

        let mut slots = self.slots.write();
        let Some(file) = slots.get(&src).and_then(|slot| slot.winner.clone()) else {
            return Err(VfsError::NotFound(src.to_string()));
        };
        if src == dst {
            return Ok(file);
        }
        let copied = self.place(&mut slots, &file, dst.clone());
        drop(slots);

        self.materializer.invalidate(&dst);
        tracing::debug!(from = %src, to = %dst, version = copied.version(), "Copied file");
        Ok(copied)
    }

    /// Remove every layer at `path`.
    pub fn remove(&self, path: &str) -> VfsResult<()> {
        let path = LogicalPath::parse_file(path)?;
        let removed = {
            let mut slots = self.slots.write();
            let removed = slots.remove(&path).is_some();
            if removed {
                self.bump();
            }
            removed
        };
        if !removed {
            return Err(VfsError::NotFound(path.to_string()));
        }
        self.materializer.discard(&path);
        tracing::debug!(path = %path, "Removed file");
        Ok(())
    }

    /// Remove only the `origin` layer at `path`. Returns whether it existed.
    pub fn remove_origin(&self, origin: Origin, path: &LogicalPath) -> bool {
        let removed = {
            let mut slots = self.slots.write();
            let Some(slot) = slots.get_mut(path) else {
                return false;
            };
            if slot.layers[origin.index()].take().is_none() {
                return false;
            }
            slot.winner = self.options.precedence.winner(&slot.layers);
            if slot.is_empty() {
                slots.remove(path);
            }
            self.bump();
            true
        };
        if removed {
            self.materializer.discard(path);
            tracing::debug!(path = %path, origin = %origin, "Removed layer");
        }
        removed
    }

    /// Drop disk layers whose logical path is `dir` or lies below it.
    pub fn remove_disk_under(&self, dir: &LogicalPath) -> usize {
        let affected: Vec<LogicalPath> = {
            let slots = self.slots.read();
            slots
                .iter()
                .filter(|(path, slot)| {
                    path.starts_with(dir) && slot.layers[Origin::Disk.index()].is_some()
                })
                .map(|(path, _)| path.clone())
                .collect()
        };
        affected
            .iter()
            .filter(|path| self.remove_origin(Origin::Disk, path))
            .count()
    }

    /// Epoch plus the sorted set of authoritative paths, read atomically.
    pub fn snapshot(&self) -> StoreSnapshot {
        let slots = self.slots.read();
        let epoch = self.epoch();
        let mut paths: Vec<LogicalPath> = slots.keys().cloned().collect();
        drop(slots);
        paths.sort();
        StoreSnapshot { epoch, paths }
    }

    /// Map a real path below the disk root to its logical path.
    pub fn logical_path_for_disk(&self, disk_path: &Path) -> Option<LogicalPath> {
        let relative = disk_path.strip_prefix(&self.options.disk_root).ok()?;
        let mut logical = String::new();
        for component in relative.components() {
            logical.push('/');
            logical.push_str(component.as_os_str().to_str()?);
        }
        LogicalPath::parse(&logical).ok()
    }

    /// Real location the script engine should execute for `file`.
    pub fn materialize(&self, file: &VirtualFile) -> VfsResult<ScriptLocation> {
        match file.disk_path() {
            Some(path) => Ok(ScriptLocation {
                script_path: path.to_path_buf(),
                document_root: self.options.disk_root.clone(),
            }),
            None => Ok(ScriptLocation {
                script_path: self.materializer.materialize(file)?,
                document_root: self.materializer.root().to_path_buf(),
            }),
        }
    }

    /// Write every non-disk file out ahead of time.
    pub fn materialize_all(&self) -> VfsResult<usize> {
        let files: Vec<Arc<VirtualFile>> = self
            .slots
            .read()
            .values()
            .filter_map(|slot| slot.winner.clone())
            .filter(|file| file.disk_path().is_none())
            .collect();
        for file in &files {
            self.materializer.materialize(file)?;
        }
        Ok(files.len())
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    fn place(
        &self,
        slots: &mut FxHashMap<LogicalPath, Slot>,
        file: &VirtualFile,
        dst: LogicalPath,
    ) -> Arc<VirtualFile> {
        let version = self.bump();
        let placed = Arc::new(file.relocated(dst.clone(), version));
        let mut slot = Slot::default();
        slot.layers[placed.origin().index()] = Some(placed.clone());
        slot.winner = Some(placed.clone());
        slots.insert(dst, slot);
        placed
    }

    /// Must be called with the write lock held.
    fn bump(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_store_epoch(epoch);
        epoch
    }
}
