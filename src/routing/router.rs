//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the compiled route table for the current store epoch
//! - Rebuild it lazily when the store epoch has moved on
//! - Resolve `(method, path)` to a virtual file plus path parameters
//!
//! # Design Decisions
//! - Readers load the table through `ArcSwap` and never block each other
//! - Rebuilds are serialized by a mutex and double-checked after locking
//! - Frozen mode additionally memoizes whole resolutions per table
//! - Explicit NotFound rather than a silent default

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::http::Method;
use parking_lot::Mutex;

use crate::observability::metrics;
use crate::routing::path::RequestPath;
use crate::routing::pattern::RouteKind;
use crate::routing::table::RouteTable;
use crate::vfs::{VfsError, VfsResult, VirtualFile, VirtualStore};

/// Naming conventions and policy knobs for the router.
#[derive(Debug, Clone)]
pub struct RoutingOptions {
    /// Script extension without the dot.
    pub extension: String,
    /// Stem of directory index scripts.
    pub index_name: String,
    /// Let a method-agnostic script answer methods that have no
    /// method-suffixed sibling.
    pub method_fallback: bool,
    /// Namespace treated as immutable; enables resolution memoization.
    pub frozen: bool,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            extension: "php".to_string(),
            index_name: "index".to_string(),
            method_fallback: true,
            frozen: false,
        }
    }
}

/// A resolved request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub file: Arc<VirtualFile>,
    pub kind: RouteKind,
    /// Percent-decoded parameters in discovery order.
    pub params: Vec<(String, String)>,
    /// Raw path segments as they appeared in the URL.
    pub segments: Vec<String>,
}

/// Convention-based router over a [`VirtualStore`].
pub struct ConventionRouter {
    store: Arc<VirtualStore>,
    options: RoutingOptions,
    cache: ArcSwap<RouteTable>,
    rebuild: Mutex<()>,
}

impl ConventionRouter {
    /// Create a router and compile the table for the store's current epoch.
    pub fn new(store: Arc<VirtualStore>, options: RoutingOptions) -> Self {
        let router = Self {
            store,
            options,
            cache: ArcSwap::from_pointee(RouteTable::empty(u64::MAX)),
            rebuild: Mutex::new(()),
        };
        router.table();
        router
    }

    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<VirtualStore> {
        &self.store
    }

    /// Route table for the current store epoch, rebuilt if stale.
    pub fn table(&self) -> Arc<RouteTable> {
        let current = self.cache.load_full();
        if current.epoch() == self.store.epoch() {
            return current;
        }

        let _guard = self.rebuild.lock();
        let current = self.cache.load_full();
        if current.epoch() == self.store.epoch() {
            return current;
        }

        let start = Instant::now();
        let snapshot = self.store.snapshot();
        let table = Arc::new(RouteTable::build(&snapshot, &self.options));
        metrics::record_route_rebuild(table.route_count(), start);
        tracing::debug!(
            epoch = table.epoch(),
            routes = table.route_count(),
            files = snapshot.paths.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Route table rebuilt"
        );
        self.cache.store(table.clone());
        table
    }

    /// Resolve `path` for `method`.
    pub fn resolve(&self, method: &Method, path: &str) -> VfsResult<Arc<RouteMatch>> {
        let request = RequestPath::parse(path)?;
        let table = self.table();

        if self.options.frozen {
            if let Some(hit) = table.memo_get(method, path) {
                return Ok(hit);
            }
        }

        let Some(found) = table.lookup(method, &request, self.options.method_fallback) else {
            return Err(VfsError::NotFound(path.to_string()));
        };
        // The file may have been removed after this table was compiled.
        let Some(file) = self.store.get(&found.target.file) else {
            return Err(VfsError::NotFound(path.to_string()));
        };

        let params = found
            .target
            .params
            .iter()
            .zip(&found.captured)
            .map(|(name, idx)| (name.clone(), request.segments[*idx].clone()))
            .collect();
        let resolved = Arc::new(RouteMatch {
            file,
            kind: found.target.kind,
            params,
            segments: request.raw_segments,
        });

        if self.options.frozen {
            table.memo_put(method, path, resolved.clone());
        }
        Ok(resolved)
    }
}

impl std::fmt::Debug for ConventionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConventionRouter")
            .field("options", &self.options)
            .field("epoch", &self.cache.load().epoch())
            .finish()
    }
}
