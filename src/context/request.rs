//! The per-request context handed to a script.
//!
//! # Responsibilities
//! - Hold every piece of request data a script may read
//! - Flatten it into named environment channels for the engine

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use serde_json::{Map, Value};
use tempfile::TempDir;

use crate::context::body::UploadedFile;
use crate::context::{
    FORM_KEY, JSON_BODY_KEY, PATH_PARAMS_KEY, PATH_SEGMENTS_KEY, QUERY_KEY, RENDER_PREFIX,
    UPLOADS_KEY,
};
use crate::routing::RouteKind;
use crate::vfs::{ScriptLocation, VirtualFile};

/// Request data for one script invocation. Owned by a single request.
#[derive(Debug)]
pub struct RequestContext {
    pub file: Arc<VirtualFile>,
    pub location: ScriptLocation,
    pub route_kind: RouteKind,
    /// CGI-style server variables (`REQUEST_METHOD`, `HTTP_*`, ...).
    pub server: BTreeMap<String, String>,
    pub path_params: Vec<(String, String)>,
    pub path_segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub uploads: Vec<UploadedFile>,
    pub json_body: Option<Value>,
    /// Raw request body, passed to the engine on stdin.
    pub body: Bytes,
    /// Host render values as serialized JSON.
    pub render: BTreeMap<String, String>,
    pub(crate) upload_dir: Option<TempDir>,
}

impl RequestContext {
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn server_var(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    pub fn render_value(&self, name: &str) -> Option<&str> {
        self.render.get(name).map(String::as_str)
    }

    /// Directory holding this request's uploads, if any were received.
    pub fn upload_dir(&self) -> Option<&std::path::Path> {
        self.upload_dir.as_ref().map(TempDir::path)
    }

    /// Flatten into `(name, value)` pairs for the engine environment.
    ///
    /// Server variables come first, then the `BRIDGE_*` channels. The
    /// path parameter and segment channels are always present so scripts
    /// can rely on them.
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .server
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        env.push((PATH_PARAMS_KEY.to_string(), pairs_to_object(&self.path_params).to_string()));
        env.push((
            PATH_SEGMENTS_KEY.to_string(),
            Value::from(self.path_segments.clone()).to_string(),
        ));
        env.push((QUERY_KEY.to_string(), pairs_to_object(&self.query).to_string()));
        env.push((FORM_KEY.to_string(), pairs_to_object(&self.form).to_string()));
        if !self.uploads.is_empty() {
            let uploads = serde_json::to_value(&self.uploads).unwrap_or(Value::Null);
            env.push((UPLOADS_KEY.to_string(), uploads.to_string()));
        }
        if let Some(json) = &self.json_body {
            env.push((JSON_BODY_KEY.to_string(), json.to_string()));
        }
        for (name, json) in &self.render {
            env.push((format!("{RENDER_PREFIX}{name}"), json.clone()));
        }
        env
    }
}

/// Pairs to a JSON object; a repeated key collects its values in an array.
fn pairs_to_object(pairs: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(key) {
            None => {
                map.insert(key.clone(), Value::String(value.clone()));
            }
            Some(Value::Array(values)) => values.push(Value::String(value.clone())),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value.clone())]);
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{Content, Origin, StoreOptions, VirtualStore};

    fn context() -> RequestContext {
        let store = VirtualStore::new(StoreOptions::new("/srv")).unwrap();
        store
            .register(Origin::Virtual, "/p/[id].php", Content::bytes("x"))
            .unwrap();
        let file = store.resolve("/p/[id].php").unwrap();
        RequestContext {
            location: ScriptLocation {
                script_path: "/tmp/p.php".into(),
                document_root: "/tmp".into(),
            },
            file,
            route_kind: RouteKind::Dynamic,
            server: BTreeMap::from([("REQUEST_METHOD".to_string(), "GET".to_string())]),
            path_params: vec![("id".to_string(), "42".to_string())],
            path_segments: vec!["p".to_string(), "42".to_string()],
            query: vec![
                ("t".to_string(), "a".to_string()),
                ("t".to_string(), "b".to_string()),
                ("q".to_string(), "x".to_string()),
            ],
            form: Vec::new(),
            uploads: Vec::new(),
            json_body: None,
            body: Bytes::new(),
            render: BTreeMap::from([("title".to_string(), "\"T\"".to_string())]),
            upload_dir: None,
        }
    }

    fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
        env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_environment_channels() {
        let ctx = context();
        let env = ctx.environment();

        assert_eq!(lookup(&env, "REQUEST_METHOD"), Some("GET"));
        assert_eq!(lookup(&env, PATH_PARAMS_KEY), Some(r#"{"id":"42"}"#));
        assert_eq!(lookup(&env, PATH_SEGMENTS_KEY), Some(r#"["p","42"]"#));
        assert_eq!(lookup(&env, QUERY_KEY), Some(r#"{"q":"x","t":["a","b"]}"#));
        assert_eq!(lookup(&env, FORM_KEY), Some("{}"));
        assert_eq!(lookup(&env, "BRIDGE_RENDER_title"), Some("\"T\""));
        assert_eq!(lookup(&env, JSON_BODY_KEY), None);
        assert_eq!(lookup(&env, UPLOADS_KEY), None);
    }

    #[test]
    fn test_accessors() {
        let ctx = context();
        assert_eq!(ctx.path_param("id"), Some("42"));
        assert_eq!(ctx.path_param("missing"), None);
        assert_eq!(ctx.server_var("REQUEST_METHOD"), Some("GET"));
        assert_eq!(ctx.render_value("title"), Some("\"T\""));
        assert!(ctx.upload_dir().is_none());
    }

    #[test]
    fn test_json_body_channel() {
        let mut ctx = context();
        ctx.json_body = Some(serde_json::json!({"a": 1}));
        let env = ctx.environment();
        assert_eq!(lookup(&env, JSON_BODY_KEY), Some(r#"{"a":1}"#));
    }
}
