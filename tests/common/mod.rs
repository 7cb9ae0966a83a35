//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use script_bridge::config::{BridgeConfig, Mode};
use script_bridge::engine::{EngineError, EngineOutput, Invocation, ScriptEngine};
use script_bridge::lifecycle::Bridge;

/// One engine call as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub script: String,
    pub env: BTreeMap<String, String>,
}

/// Engine double that records invocations and echoes what it was given.
///
/// The response body is a JSON object with the script's logical path,
/// the materialized script contents and every `BRIDGE_*` variable parsed
/// back into JSON.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl ScriptEngine for RecordingEngine {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, Result<EngineOutput, EngineError>> {
        let calls = self.calls.clone();
        Box::pin(async move {
            let env: BTreeMap<String, String> = invocation.context.environment().into_iter().collect();
            let source = tokio::fs::read_to_string(&invocation.script_path).await?;
            let script = invocation.context.file.path().to_string();

            let bridge_vars: serde_json::Map<String, Value> = env
                .iter()
                .filter(|(k, _)| k.starts_with("BRIDGE_"))
                .map(|(k, v)| {
                    let parsed = serde_json::from_str(v).unwrap_or(Value::String(v.clone()));
                    (k.clone(), parsed)
                })
                .collect();
            let body = json!({
                "script": script,
                "source": source,
                "method": env.get("REQUEST_METHOD"),
                "vars": bridge_vars,
            });

            calls.lock().push(Recorded { script, env });
            Ok(EngineOutput::new(StatusCode::OK, body.to_string()))
        })
    }
}

/// Create a document root holding `files` (logical path, contents).
pub fn fixture(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, contents) in files {
        write(dir.path(), path, contents);
    }
    dir
}

pub fn write(root: &Path, path: &str, contents: &str) {
    let target = root.join(path.trim_start_matches('/'));
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(target, contents).unwrap();
}

pub fn config(root: &Path, mode: Mode) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.source.root = root.to_path_buf();
    config.mode = mode;
    config.watcher.force_polling = true;
    config.watcher.poll_interval_ms = 50;
    config.watcher.debounce_ms = 20;
    config
}

pub fn bridge(root: &Path, mode: Mode, engine: RecordingEngine) -> Bridge {
    Bridge::builder(config(root, mode))
        .engine(engine)
        .build()
        .unwrap()
}

pub fn request(method: &str, uri: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Send `request` through `service` and return the status and raw body.
pub async fn send<S>(service: S, request: Request) -> (StatusCode, String)
where
    S: tower::Service<Request, Response = axum::response::Response, Error = std::convert::Infallible>,
{
    let response = service.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Like [`send`], for successful script runs whose body is the echo JSON.
pub async fn run<S>(service: S, request: Request) -> Value
where
    S: tower::Service<Request, Response = axum::response::Response, Error = std::convert::Infallible>,
{
    let (status, body) = send(service, request).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
    serde_json::from_str(&body).unwrap()
}
