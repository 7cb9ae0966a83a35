//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and canonicalize the document root
//! - Populate the store: disk scan, embedded assets, virtual files
//! - Frozen mode: write every non-disk script out ahead of time
//! - Development mode: start the change watcher
//! - Hand out handlers and the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any store or config error is fatal
//! - A watcher that cannot start is logged and the bridge keeps serving
//! - Subsystems initialize in order, not concurrently

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::request::Parts;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::validation::validate_config;
use crate::config::{BridgeConfig, ConfigError, Mode};
use crate::context::{ContextBuilder, RenderData};
use crate::engine::{CgiEngine, ScriptEngine};
use crate::http::{HttpServer, RenderHandler, ScriptHandler};
use crate::routing::{ConventionRouter, RoutingOptions};
use crate::vfs::embed::register_embedded;
use crate::vfs::scan::scan_disk;
use crate::vfs::{
    Content, EmbeddedAsset, Origin, Precedence, StoreOptions, VfsError, VfsResult, VirtualStore,
};
use crate::watch::{ChangeWatcher, WatcherHandle};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot use document root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] VfsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fluent construction of a [`Bridge`].
pub struct BridgeBuilder {
    config: BridgeConfig,
    engine: Option<Arc<dyn ScriptEngine>>,
    embedded: Vec<EmbeddedAsset>,
    virtual_files: Vec<(String, Content)>,
}

impl BridgeBuilder {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            engine: None,
            embedded: Vec::new(),
            virtual_files: Vec::new(),
        }
    }

    /// Use `engine` instead of the configured CGI program.
    pub fn engine<E: ScriptEngine>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn shared_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn embed(mut self, assets: &[EmbeddedAsset]) -> Self {
        self.embedded.extend_from_slice(assets);
        self
    }

    pub fn virtual_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.virtual_files
            .push((path.into(), Content::bytes(contents)));
        self
    }

    pub fn build(self) -> Result<Bridge, StartupError> {
        let mut config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let root = config
            .source
            .root
            .canonicalize()
            .map_err(|source| StartupError::Root {
                path: config.source.root.clone(),
                source,
            })?;
        config.source.root = root.clone();

        let precedence = Precedence::from_order(&config.store.precedence).unwrap_or_default();
        let store = Arc::new(VirtualStore::new(StoreOptions {
            disk_root: root,
            precedence,
            strict_uniqueness: config.store.strict_uniqueness,
        })?);

        scan_disk(&store)?;
        let embedded = register_embedded(&store, &self.embedded)?;
        for (path, content) in self.virtual_files {
            store.register(Origin::Virtual, &path, content)?;
        }

        let frozen = config.mode.is_frozen();
        let router = Arc::new(ConventionRouter::new(
            store.clone(),
            RoutingOptions {
                extension: config.source.extension.clone(),
                index_name: config.source.index_name.clone(),
                method_fallback: config.routing.method_fallback,
                frozen,
            },
        ));

        let watcher = if frozen {
            let written = store.materialize_all()?;
            tracing::info!(materialized = written, "Frozen mode: scripts materialized");
            WatcherHandle::idle()
        } else {
            match ChangeWatcher::new(store.clone(), config.watcher.clone()).start() {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(error = %e, "Change watcher unavailable, serving without hot reload");
                    WatcherHandle::idle()
                }
            }
        };

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(CgiEngine::from_config(&config.engine)));

        let mut handler = ScriptHandler::new(router.clone(), engine)
            .with_mode(config.mode)
            .with_context_builder(ContextBuilder::new(config.limits.max_body_bytes));
        if let Some(prefix) = &config.routing.mount_prefix {
            handler = handler.strip_prefix(prefix);
        }

        tracing::info!(
            root = %config.source.root.display(),
            mode = ?config.mode,
            files = store.len(),
            embedded,
            routes = router.table().route_count(),
            watcher = ?watcher.state(),
            "Bridge ready"
        );

        Ok(Bridge {
            config,
            store,
            router,
            handler,
            watcher,
        })
    }
}

/// A running bridge: populated store, router, handler and optional watcher.
pub struct Bridge {
    config: BridgeConfig,
    store: Arc<VirtualStore>,
    router: Arc<ConventionRouter>,
    handler: ScriptHandler,
    watcher: WatcherHandle,
}

impl Bridge {
    pub fn builder(config: BridgeConfig) -> BridgeBuilder {
        BridgeBuilder::new(config)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn store(&self) -> &Arc<VirtualStore> {
        &self.store
    }

    pub fn router(&self) -> &Arc<ConventionRouter> {
        &self.router
    }

    pub fn watcher(&self) -> &WatcherHandle {
        &self.watcher
    }

    /// Convention-routed handler, cheap to clone.
    pub fn handler(&self) -> ScriptHandler {
        self.handler.clone()
    }

    /// Render-mode handler for `script`.
    pub fn render_handler<F>(&self, script: &str, produce: F) -> VfsResult<RenderHandler>
    where
        F: Fn(&Parts) -> RenderData + Send + Sync + 'static,
    {
        self.handler.render(script, produce)
    }

    /// HTTP server serving the handler under the configured limits.
    pub fn server(&self) -> HttpServer {
        HttpServer::new(self.handler(), &self.config.limits)
    }

    /// Serve on `listener` until `shutdown` fires. The watcher stops when
    /// the bridge is dropped at the end.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), StartupError> {
        self.server().run(listener, shutdown).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("root", &self.config.source.root)
            .field("mode", &self.config.mode)
            .field("files", &self.store.len())
            .field("watcher", &self.watcher)
            .finish()
    }
}
