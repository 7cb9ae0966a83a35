//! Bridge handlers.
//!
//! # Responsibilities
//! - Resolve a request to a script, build its context, run the engine
//! - Compose with other services: fallback on unresolved paths, prefix mounting
//! - Render mode: a fixed script fed by a per-request value callback
//!
//! # Design Decisions
//! - Handlers are plain tower services so axum can mount them anywhere
//! - Unresolvable and invalid paths reach the fallback when one is set
//! - Virtual scripts are written to disk on the blocking pool
//! - Dropping the response future cancels the engine invocation

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

use crate::config::Mode;
use crate::context::{ContextBuilder, RenderData};
use crate::engine::{Invocation, ScriptEngine};
use crate::http::error::RequestError;
use crate::http::response::into_response;
use crate::observability::metrics;
use crate::routing::{ConventionRouter, RouteKind, RouteMatch};
use crate::vfs::{LogicalPath, VfsError, VfsResult};

type FallbackService = BoxCloneSyncService<Request, Response, Infallible>;

/// Produces render values from the request head.
pub type RenderFn = dyn Fn(&Parts) -> RenderData + Send + Sync;

#[derive(Clone)]
struct Shared {
    router: Arc<ConventionRouter>,
    engine: Arc<dyn ScriptEngine>,
    builder: ContextBuilder,
    mode: Mode,
}

impl Shared {
    async fn execute(
        &self,
        request: Request,
        route: &RouteMatch,
        render: Option<RenderData>,
    ) -> Result<Response, RequestError> {
        let store = self.router.store().clone();
        let file = route.file.clone();
        let location = tokio::task::spawn_blocking(move || store.materialize(&file))
            .await
            .map_err(|e| VfsError::io(route.file.path().as_str(), std::io::Error::other(e)))??;
        let context = self.builder.build(request, route, location, render).await?;
        let output = self.engine.execute(Invocation::new(context)).await?;
        Ok(into_response(output))
    }
}

fn failure_response(mode: Mode, method: &str, error: RequestError, start: Instant) -> Response {
    let outcome = error.outcome();
    let response = error.into_response_for(mode);
    metrics::record_request(method, response.status().as_u16(), outcome, start);
    response
}

/// Convention-routed script handler.
#[derive(Clone)]
pub struct ScriptHandler {
    shared: Arc<Shared>,
    fallback: Option<FallbackService>,
    prefix: Option<Arc<str>>,
}

impl ScriptHandler {
    pub fn new(router: Arc<ConventionRouter>, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            shared: Arc::new(Shared {
                router,
                engine,
                builder: ContextBuilder::default(),
                mode: Mode::Development,
            }),
            fallback: None,
            prefix: None,
        }
    }

    /// Replace the context builder. An active mount prefix is kept.
    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        let prefix = self.prefix.as_deref().unwrap_or_default();
        Arc::make_mut(&mut self.shared).builder = builder.with_mount_prefix(prefix);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        Arc::make_mut(&mut self.shared).mode = mode;
        self
    }

    /// Delegate unresolved requests to `service` instead of answering 404.
    pub fn with_fallback<S>(mut self, service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        self.fallback = Some(BoxCloneSyncService::new(service));
        self
    }

    /// Resolve with `prefix` removed from the path. Requests outside the
    /// prefix are treated as unresolved; `SCRIPT_NAME` keeps the prefix.
    pub fn strip_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        self.prefix = (!prefix.is_empty()).then(|| Arc::from(prefix));
        let shared = Arc::make_mut(&mut self.shared);
        shared.builder = shared.builder.clone().with_mount_prefix(prefix);
        self
    }

    pub fn router(&self) -> &Arc<ConventionRouter> {
        &self.shared.router
    }

    pub fn mode(&self) -> Mode {
        self.shared.mode
    }

    /// Serve one fixed script, feeding it values from `produce` on each request.
    pub fn render<F>(&self, script: &str, produce: F) -> VfsResult<RenderHandler>
    where
        F: Fn(&Parts) -> RenderData + Send + Sync + 'static,
    {
        Ok(RenderHandler {
            shared: self.shared.clone(),
            script: LogicalPath::parse_file(script)?,
            produce: Arc::new(produce),
        })
    }

    fn lookup_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let Some(prefix) = self.prefix.as_deref() else {
            return Some(path);
        };
        let rest = path.strip_prefix(prefix)?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let resolved = match self.lookup_path(&path) {
            Some(lookup) => self.shared.router.resolve(&method, lookup),
            None => Err(VfsError::NotFound(path.clone())),
        };

        let route = match resolved {
            Ok(route) => route,
            Err(VfsError::NotFound(_) | VfsError::InvalidPath { .. }) if self.fallback.is_some() => {
                tracing::debug!(method = %method, path = %path, "No script, delegating to fallback");
                let response = self.call_fallback(request).await;
                metrics::record_request(method.as_str(), response.status().as_u16(), "fallback", start);
                return response;
            }
            Err(e) => return self.fail(method.as_str(), RequestError::Vfs(e), start),
        };

        tracing::debug!(
            method = %method,
            path = %path,
            script = %route.file.path(),
            kind = route.kind.as_str(),
            "Resolved script"
        );
        match self.shared.execute(request, &route, None).await {
            Ok(response) => {
                metrics::record_request(method.as_str(), response.status().as_u16(), "script", start);
                response
            }
            Err(e) => self.fail(method.as_str(), e, start),
        }
    }

    async fn call_fallback(&self, request: Request) -> Response {
        let Some(fallback) = self.fallback.clone() else {
            return StatusCode::NOT_FOUND.into_response();
        };
        match fallback.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    fn fail(&self, method: &str, error: RequestError, start: Instant) -> Response {
        failure_response(self.shared.mode, method, error, start)
    }
}

impl Service<Request> for ScriptHandler {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(request).await) })
    }
}

impl std::fmt::Debug for ScriptHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHandler")
            .field("mode", &self.shared.mode)
            .field("prefix", &self.prefix)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Render-mode handler bound to one script.
#[derive(Clone)]
pub struct RenderHandler {
    shared: Arc<Shared>,
    script: LogicalPath,
    produce: Arc<RenderFn>,
}

impl RenderHandler {
    pub fn script(&self) -> &LogicalPath {
        &self.script
    }

    pub async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();

        // Resolved per request so store mutations are honoured.
        let Some(file) = self.shared.router.store().get(&self.script) else {
            let error = RequestError::Vfs(VfsError::NotFound(self.script.to_string()));
            return failure_response(self.shared.mode, method.as_str(), error, start);
        };

        let (parts, body) = request.into_parts();
        let render = (self.produce)(&parts);
        let segments = parts
            .uri
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let request = Request::from_parts(parts, body);

        let route = RouteMatch {
            file,
            kind: RouteKind::Static,
            params: Vec::new(),
            segments,
        };
        tracing::debug!(method = %method, script = %self.script, "Rendering script");
        match self.shared.execute(request, &route, Some(render)).await {
            Ok(response) => {
                metrics::record_request(method.as_str(), response.status().as_u16(), "script", start);
                response
            }
            Err(error) => failure_response(self.shared.mode, method.as_str(), error, start),
        }
    }
}

impl Service<Request> for RenderHandler {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(request).await) })
    }
}

impl std::fmt::Debug for RenderHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandler")
            .field("script", &self.script)
            .finish()
    }
}
