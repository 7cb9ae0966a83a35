//! Request context construction.
//!
//! # Responsibilities
//! - Derive CGI server variables from the request line, headers and peer
//! - Decode the query string and body
//! - Merge route parameters and host render values
//!
//! # Design Decisions
//! - The body is buffered once, bounded by `max_body_bytes`
//! - Header names become `HTTP_<UPPER_SNAKE>`; repeated headers are joined
//! - A client `Proxy` header is dropped so it cannot become `HTTP_PROXY`
//! - `REQUEST_URI` is the URI as received, before any mount prefix stripping

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Version};
use http_body_util::LengthLimitError;

use crate::context::body::parse_body;
use crate::context::error::ContextError;
use crate::context::render::RenderData;
use crate::context::request::RequestContext;
use crate::observability::metrics;
use crate::routing::RouteMatch;
use crate::vfs::ScriptLocation;

const SERVER_SOFTWARE: &str = concat!("script-bridge/", env!("CARGO_PKG_VERSION"));

/// Builds a [`RequestContext`] per request.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_body_bytes: usize,
    mount_prefix: String,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(8 * 1024 * 1024)
    }
}

impl ContextBuilder {
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            max_body_bytes,
            mount_prefix: String::new(),
        }
    }

    /// Public URL prefix prepended to `SCRIPT_NAME`.
    pub fn with_mount_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mount_prefix = prefix.into();
        self
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Consume `request` and build the context for `route`.
    pub async fn build(
        &self,
        request: Request,
        route: &RouteMatch,
        location: ScriptLocation,
        render: Option<RenderData>,
    ) -> Result<RequestContext, ContextError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| body_error(e, self.max_body_bytes))?;

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let parsed = parse_body(content_type.as_deref(), &body).await?;

        let query_string = parts.uri.query().unwrap_or_default();
        let query = url::form_urlencoded::parse(query_string.as_bytes())
            .into_owned()
            .collect();

        let mut server = BTreeMap::new();
        server.insert("GATEWAY_INTERFACE".to_string(), "CGI/1.1".to_string());
        server.insert("SERVER_SOFTWARE".to_string(), SERVER_SOFTWARE.to_string());
        server.insert("SERVER_PROTOCOL".to_string(), protocol(parts.version).to_string());
        server.insert("REQUEST_METHOD".to_string(), parts.method.to_string());
        server.insert(
            "REQUEST_URI".to_string(),
            parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        );
        server.insert("QUERY_STRING".to_string(), query_string.to_string());
        server.insert("REDIRECT_STATUS".to_string(), "200".to_string());
        server.insert(
            "SCRIPT_NAME".to_string(),
            format!("{}{}", self.mount_prefix, route.file.path()),
        );
        server.insert(
            "SCRIPT_FILENAME".to_string(),
            location.script_path.display().to_string(),
        );
        server.insert(
            "DOCUMENT_ROOT".to_string(),
            location.document_root.display().to_string(),
        );
        if let Some(content_type) = &content_type {
            server.insert("CONTENT_TYPE".to_string(), content_type.clone());
        }
        if !body.is_empty() || parts.headers.contains_key(CONTENT_LENGTH) {
            server.insert("CONTENT_LENGTH".to_string(), body.len().to_string());
        }
        if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            server.insert("REMOTE_ADDR".to_string(), peer.ip().to_string());
            server.insert("REMOTE_PORT".to_string(), peer.port().to_string());
        }
        let (name, port) = server_name(&parts.headers);
        server.insert("SERVER_NAME".to_string(), name);
        server.insert("SERVER_PORT".to_string(), port);
        insert_http_headers(&mut server, &parts.headers);

        let (render, render_errors) = render.map(RenderData::into_parts).unwrap_or_default();
        for (name, reason) in &render_errors {
            metrics::record_render_value_error();
            tracing::warn!(
                script = %route.file.path(),
                name = %name,
                reason = %reason,
                "Render value dropped"
            );
        }

        Ok(RequestContext {
            file: route.file.clone(),
            location,
            route_kind: route.kind,
            server,
            path_params: route.params.clone(),
            path_segments: route.segments.clone(),
            query,
            form: parsed.form,
            uploads: parsed.uploads,
            json_body: parsed.json,
            body,
            render,
            upload_dir: parsed.upload_dir,
        })
    }
}

/// Over-limit bodies surface as a `LengthLimitError` somewhere in the chain.
fn body_error(error: axum::Error, limit: usize) -> ContextError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&error);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return ContextError::TooLarge { limit };
        }
        source = err.source();
    }
    ContextError::BodyRead(error.to_string())
}

fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn server_name(headers: &HeaderMap) -> (String, String) {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    if let Some((name, port)) = host.rsplit_once(':') {
        let bracketed = !name.contains(':') || name.ends_with(']');
        if !name.is_empty() && bracketed && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
            return (name.to_string(), port.to_string());
        }
    }
    (host.to_string(), "80".to_string())
}

fn insert_http_headers(server: &mut BTreeMap<String, String>, headers: &HeaderMap) {
    for name in headers.keys() {
        if name == CONTENT_TYPE || name == CONTENT_LENGTH || name.as_str() == "proxy" {
            continue;
        }
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            continue;
        }
        let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
        server.insert(key, values.join(", "));
    }
}
