//! Virtual filesystem subsystem.
//!
//! # Data Flow
//! ```text
//! Sources:
//!     disk root      → scan.rs (walkdir)          ┐
//!     include_bytes! → embed.rs (EmbeddedAsset)   ├─► store.rs register(origin, path, content)
//!     host API       → VirtualStore::register     ┘        │
//!                                                          ▼
//!                                      FxHashMap<LogicalPath, Slot>
//!                                      (one layer per origin, winner
//!                                       picked by precedence at write)
//!                                                          │
//! Readers:                                                 ▼
//!     router / handler → resolve(path) ──► Arc<VirtualFile>
//!     engine bridge    → materialize(file) ──► real disk path
//! ```
//!
//! # Design Decisions
//! - One lookup table keyed by normalized logical path
//! - Precedence is applied when a slot changes, never at resolve time
//! - Every mutation bumps a global epoch; derived caches compare epochs
//! - Readers share a `parking_lot::RwLock`; writers are exclusive

pub mod embed;
pub mod error;
pub mod file;
pub mod materialize;
pub mod path;
pub mod scan;
pub mod store;

pub use embed::EmbeddedAsset;
pub use error::{VfsError, VfsResult};
pub use file::{Content, Origin, VirtualFile};
pub use materialize::{Materializer, ScriptLocation};
pub use path::LogicalPath;
pub use store::{Precedence, StoreOptions, VirtualStore};
