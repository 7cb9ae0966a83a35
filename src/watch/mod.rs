//! Change watcher subsystem (development mode).
//!
//! # Data Flow
//! ```text
//! notify backend (native, or polling fallback)
//!     → std mpsc channel of raw events
//!     → watcher thread coalesces paths until the debounce window is quiet
//!     → apply.rs checks each path on disk:
//!         file exists      → re-register disk layer
//!         directory exists → walk and register
//!         gone             → drop disk layers at/under the path
//!     → store epoch advances; router and materializer observe it lazily
//! ```
//!
//! # States
//! - `Idle`: not watching (frozen mode, or the backend failed to start)
//! - `Watching`: subscribed to the document root, recursively
//!
//! # Design Decisions
//! - The only coupling to request handling is the store epoch
//! - A burst of writes to one path yields one invalidation
//! - Backend failures never reach request handling

pub mod apply;
pub mod watcher;

pub use watcher::{ChangeWatcher, WatchInitError, WatchState, WatcherHandle};
