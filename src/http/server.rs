//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the bridge handler as fallback service
//! - Wire up middleware (tracing, request ID, body limit, timeout)
//! - Bind server to listener with peer addresses available to handlers
//! - Stop accepting on the shutdown broadcast and drain in-flight requests

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::LimitsConfig;
use crate::http::handler::ScriptHandler;
use crate::http::request::{request_id_header, MakeRequestUuid};

/// HTTP server for the script bridge.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Serve `handler` for every path, under the given limits.
    pub fn new(handler: ScriptHandler, limits: &LimitsConfig) -> Self {
        Self::from_router(Router::new(), handler, limits)
    }

    /// Mount `handler` as the fallback of an existing router, so explicit
    /// host routes win over scripts.
    pub fn from_router(routes: Router, handler: ScriptHandler, limits: &LimitsConfig) -> Self {
        let router = Self::build_router(routes.fallback_service(handler), limits);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(router: Router, limits: &LimitsConfig) -> Router {
        let mut router = router.layer(RequestBodyLimitLayer::new(limits.max_body_bytes));
        if let Some(secs) = limits.request_timeout_secs {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(secs)));
        }
        router
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
