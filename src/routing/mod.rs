//! Conventional routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → path.rs (split, reject dot segments, percent-decode)
//!     → router.rs (epoch check, rebuild table if stale)
//!     → table.rs (static map → index map → dynamic trie)
//!     → Return: RouteMatch (file + params) or NotFound
//!
//! Table Compilation (once per store epoch):
//!     VirtualStore::snapshot()
//!     → pattern.rs (file name grammar → RoutePattern)
//!     → table.rs (hash maps for static/index, trie for [param] segments)
//!     → swapped in atomically via ArcSwap
//! ```
//!
//! # File Naming Grammar
//! - `name.ext`            method-agnostic script
//! - `name.<method>.ext`   script for one HTTP method (lowercase)
//! - `index.ext`           directory default
//! - `[param]`             whole-segment dynamic parameter (file or directory)
//!
//! # Design Decisions
//! - No route registration table: routes are derived from file names only
//! - Static segments always outrank a parameter at the same depth
//! - Method-suffixed scripts outrank method-agnostic ones
//! - Stale tables are detected lazily by epoch comparison

pub mod path;
pub mod pattern;
pub mod router;
pub mod table;

pub use path::RequestPath;
pub use pattern::{RouteKind, RoutePattern, Segment};
pub use router::{ConventionRouter, RouteMatch, RoutingOptions};
pub use table::RouteTable;
