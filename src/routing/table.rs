//! Compiled route table.
//!
//! # Structure
//! ```text
//! RouteTable (one per store epoch)
//! ├── files:   FxHashMap<"/a/b", MethodSet<Target>>   clean + literal names
//! ├── indexes: FxHashMap<"/a",   MethodSet<Target>>   index scripts
//! ├── dynamic: TrieNode                               [param] patterns
//! └── memo:    DashMap<(Method, path), RouteMatch>    frozen mode only
//! ```

use std::sync::Arc;

use axum::http::Method;
use dashmap::DashMap;
use rustc_hash::FxHashMap;

use crate::routing::path::RequestPath;
use crate::routing::pattern::{RouteKind, RoutePattern, Segment};
use crate::routing::router::{RouteMatch, RoutingOptions};
use crate::vfs::store::StoreSnapshot;
use crate::vfs::LogicalPath;

const MEMO_LIMIT: usize = 4096;

/// Script a route points at, plus the names of its parameters.
#[derive(Debug, Clone)]
pub struct Target {
    pub file: LogicalPath,
    pub kind: RouteKind,
    pub params: Vec<String>,
}

/// Per-method alternatives for one route key.
#[derive(Debug, Clone)]
pub struct MethodSet<T> {
    by_method: FxHashMap<Method, T>,
    any: Option<T>,
}

impl<T> Default for MethodSet<T> {
    fn default() -> Self {
        Self {
            by_method: FxHashMap::default(),
            any: None,
        }
    }
}

impl<T> MethodSet<T> {
    /// Insert unless the slot is taken. Returns false on a duplicate.
    fn insert(&mut self, method: Option<&Method>, value: T) -> bool {
        let slot = match method {
            Some(method) => {
                if self.by_method.contains_key(method) {
                    return false;
                }
                self.by_method.insert(method.clone(), value);
                return true;
            }
            None => &mut self.any,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    /// Pick the script answering `method`.
    ///
    /// A method-specific script wins; HEAD borrows a GET script; the
    /// method-agnostic script answers the rest unless `fallback` is off
    /// and method-specific scripts exist for this key.
    pub fn select(&self, method: &Method, fallback: bool) -> Option<&T> {
        if let Some(value) = self.by_method.get(method) {
            return Some(value);
        }
        if *method == Method::HEAD {
            if let Some(value) = self.by_method.get(&Method::GET) {
                return Some(value);
            }
        }
        match &self.any {
            Some(value) if fallback || self.by_method.is_empty() => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_method.is_empty() && self.any.is_none()
    }
}

#[derive(Debug, Default)]
struct TrieNode {
    statics: FxHashMap<String, TrieNode>,
    param: Option<Box<TrieNode>>,
    file: MethodSet<Target>,
    index: MethodSet<Target>,
}

impl TrieNode {
    fn insert(&mut self, pattern: &RoutePattern, target: Target) -> bool {
        let mut node = self;
        for segment in &pattern.segments {
            node = match segment {
                Segment::Static(name) => node.statics.entry(name.clone()).or_default(),
                Segment::Param(_) => node.param.get_or_insert_with(Default::default).as_mut(),
            };
        }
        let set = if pattern.index {
            &mut node.index
        } else {
            &mut node.file
        };
        set.insert(pattern.method.as_ref(), target)
    }

    /// Depth-first walk: static child first, then the parameter child.
    fn find<'t>(
        &'t self,
        request: &RequestPath,
        depth: usize,
        captured: &mut Vec<usize>,
        method: &Method,
        fallback: bool,
    ) -> Option<&'t Target> {
        if depth == request.segments.len() {
            if !request.directory {
                if let Some(target) = self.file.select(method, fallback) {
                    return Some(target);
                }
            }
            return self.index.select(method, fallback);
        }

        let segment = request.segments[depth].as_str();
        if let Some(child) = self.statics.get(segment) {
            if let Some(target) = child.find(request, depth + 1, captured, method, fallback) {
                return Some(target);
            }
        }
        if let Some(child) = &self.param {
            captured.push(depth);
            if let Some(target) = child.find(request, depth + 1, captured, method, fallback) {
                return Some(target);
            }
            captured.pop();
        }
        None
    }
}

/// Result of a table lookup, before the file is fetched from the store.
#[derive(Debug)]
pub struct TableMatch<'t> {
    pub target: &'t Target,
    /// Indices into the request's segments holding parameter values.
    pub captured: Vec<usize>,
}

/// Every route derivable from one store snapshot.
#[derive(Debug)]
pub struct RouteTable {
    epoch: u64,
    files: FxHashMap<String, MethodSet<Target>>,
    indexes: FxHashMap<String, MethodSet<Target>>,
    dynamic: TrieNode,
    route_count: usize,
    memo: DashMap<(Method, String), Arc<RouteMatch>>,
}

impl RouteTable {
    /// An empty table that is stale for every epoch but `epoch`.
    pub fn empty(epoch: u64) -> Self {
        Self {
            epoch,
            files: FxHashMap::default(),
            indexes: FxHashMap::default(),
            dynamic: TrieNode::default(),
            route_count: 0,
            memo: DashMap::new(),
        }
    }

    /// Compile the table for `snapshot`. Paths are sorted, so on a
    /// duplicate route the lexicographically first script wins.
    pub fn build(snapshot: &StoreSnapshot, options: &RoutingOptions) -> Self {
        let mut table = Self::empty(snapshot.epoch);

        for path in &snapshot.paths {
            let Some(pattern) = RoutePattern::parse(path, options) else {
                continue;
            };
            let target = Target {
                file: pattern.file.clone(),
                kind: pattern.kind(),
                params: pattern.param_names(),
            };

            let inserted = if pattern.is_dynamic() {
                table.dynamic.insert(&pattern, target)
            } else {
                table.insert_static(&pattern, target, &options.index_name)
            };

            if inserted {
                table.route_count += 1;
            } else {
                tracing::warn!(
                    file = %pattern.file,
                    key = %pattern.static_key(),
                    method = ?pattern.method,
                    "Duplicate route, keeping the earlier script"
                );
            }
        }
        table
    }

    fn insert_static(&mut self, pattern: &RoutePattern, target: Target, index_name: &str) -> bool {
        let method = pattern.method.as_ref();
        // The literal file name keeps the script's method restriction.
        let literal = Target {
            kind: RouteKind::Static,
            ..target.clone()
        };
        self.files
            .entry(pattern.file.to_string())
            .or_default()
            .insert(method, literal);

        if pattern.index {
            // `/blog/index` stays addressable next to `/blog/`.
            let clean = match pattern.static_key().as_str() {
                "/" => format!("/{index_name}"),
                key => format!("{key}/{index_name}"),
            };
            self.files
                .entry(clean)
                .or_default()
                .insert(method, target.clone());
            self.indexes
                .entry(pattern.static_key())
                .or_default()
                .insert(method, target)
        } else {
            self.files
                .entry(pattern.static_key())
                .or_default()
                .insert(method, target)
        }
    }

    /// Resolve a request against the table, first match wins:
    /// exact / method-suffixed file → directory index → dynamic trie.
    pub fn lookup(
        &self,
        method: &Method,
        request: &RequestPath,
        fallback: bool,
    ) -> Option<TableMatch<'_>> {
        let key = request.key();

        if !request.directory {
            if let Some(target) = self.files.get(&key).and_then(|s| s.select(method, fallback)) {
                return Some(TableMatch {
                    target,
                    captured: Vec::new(),
                });
            }
        }
        if let Some(target) = self.indexes.get(&key).and_then(|s| s.select(method, fallback)) {
            return Some(TableMatch {
                target,
                captured: Vec::new(),
            });
        }

        let mut captured = Vec::new();
        self.dynamic
            .find(request, 0, &mut captured, method, fallback)
            .map(|target| TableMatch { target, captured })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of distinct routes compiled.
    pub fn route_count(&self) -> usize {
        self.route_count
    }

    pub(crate) fn memo_get(&self, method: &Method, path: &str) -> Option<Arc<RouteMatch>> {
        self.memo
            .get(&(method.clone(), path.to_string()))
            .map(|hit| hit.value().clone())
    }

    pub(crate) fn memo_put(&self, method: &Method, path: &str, found: Arc<RouteMatch>) {
        if self.memo.len() < MEMO_LIMIT {
            self.memo.insert((method.clone(), path.to_string()), found);
        }
    }
}
