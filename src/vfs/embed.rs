//! Embedded assets compiled into the host binary.
//!
//! ```ignore
//! const ASSETS: &[EmbeddedAsset] = &[
//!     EmbeddedAsset::new("/admin/index.php", include_bytes!("../admin/index.php")),
//! ];
//! register_embedded(&store, ASSETS)?;
//! ```

use crate::vfs::error::VfsResult;
use crate::vfs::file::{Content, Origin};
use crate::vfs::store::VirtualStore;

/// A file packaged into the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedAsset {
    pub path: &'static str,
    pub contents: &'static [u8],
}

impl EmbeddedAsset {
    pub const fn new(path: &'static str, contents: &'static [u8]) -> Self {
        Self { path, contents }
    }
}

/// Register a batch of embedded assets. Stops at the first failure.
pub fn register_embedded(store: &VirtualStore, assets: &[EmbeddedAsset]) -> VfsResult<usize> {
    for asset in assets {
        store.register(Origin::Embedded, asset.path, Content::Static(asset.contents))?;
    }
    tracing::debug!(count = assets.len(), "Registered embedded assets");
    Ok(assets.len())
}
