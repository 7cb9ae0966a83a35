//! End-to-end handler behaviour with a recording engine.

mod common;

use std::convert::Infallible;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use common::{bridge, fixture, request, run, send, RecordingEngine};
use script_bridge::config::Mode;
use script_bridge::context::RenderData;
use script_bridge::http::ScriptHandler;
use script_bridge::vfs::{Content, Origin};

fn site() -> tempfile::TempDir {
    fixture(&[
        ("/index.php", "home"),
        ("/about.php", "about"),
        ("/api/users.php", "users any"),
        ("/api/users.get.php", "users get"),
        ("/post/[slug].php", "post"),
        ("/post/featured.php", "featured"),
        ("/blog/index.php", "blog"),
        ("/style.css", "body {}"),
    ])
}

/// Stand-in for the host application behind the bridge.
fn with_teapot(handler: ScriptHandler) -> ScriptHandler {
    handler.with_fallback(tower::service_fn(|_req: Request| async {
        Ok::<_, Infallible>((StatusCode::IM_A_TEAPOT, "host app").into_response())
    }))
}

#[tokio::test]
async fn test_convention_routes() {
    let dir = site();
    let engine = RecordingEngine::new();
    let bridge = bridge(dir.path(), Mode::Development, engine.clone());
    let handler = bridge.handler();

    let cases = [
        ("GET", "/", "/index.php"),
        ("GET", "/about", "/about.php"),
        ("GET", "/about.php", "/about.php"),
        ("GET", "/api/users", "/api/users.get.php"),
        ("POST", "/api/users", "/api/users.php"),
        ("HEAD", "/api/users", "/api/users.get.php"),
        ("GET", "/post/featured", "/post/featured.php"),
        ("GET", "/post/hello-world", "/post/[slug].php"),
        ("GET", "/blog", "/blog/index.php"),
        ("GET", "/blog/", "/blog/index.php"),
    ];
    for (method, uri, script) in cases {
        let body = run(handler.clone(), request(method, uri)).await;
        assert_eq!(body["script"], script, "{method} {uri}");
    }
    assert_eq!(engine.call_count(), cases.len());
}

#[tokio::test]
async fn test_path_params_and_segments() {
    let dir = site();
    let bridge = bridge(dir.path(), Mode::Development, RecordingEngine::new());

    let body = run(bridge.handler(), request("GET", "/post/hello%20there?q=1")).await;
    assert_eq!(body["source"], "post");
    assert_eq!(body["vars"]["BRIDGE_PATH_PARAMS"], json!({"slug": "hello there"}));
    assert_eq!(body["vars"]["BRIDGE_PATH_SEGMENTS"], json!(["post", "hello%20there"]));
    assert_eq!(body["vars"]["BRIDGE_QUERY"], json!({"q": "1"}));
}

#[tokio::test]
async fn test_unresolved_and_invalid_paths() {
    let dir = site();
    let engine = RecordingEngine::new();
    let bridge = bridge(dir.path(), Mode::Development, engine.clone());

    let (status, _) = send(bridge.handler(), request("GET", "/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Non-script files are never routed.
    let (status, _) = send(bridge.handler(), request("GET", "/style.css")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(bridge.handler(), request("GET", "/a/%2e%2e/%2e%2e/etc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_fallback_receives_unresolved_requests() {
    let dir = site();
    let engine = RecordingEngine::new();
    let bridge = bridge(dir.path(), Mode::Development, engine.clone());
    let handler = with_teapot(bridge.handler());

    let (status, body) = send(handler.clone(), request("GET", "/not-a-script")).await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    assert_eq!(body, "host app");
    assert_eq!(engine.call_count(), 0);

    // Malformed paths are the host's to answer as well.
    let (status, _) = send(handler.clone(), request("GET", "/a%2Fb")).await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    assert_eq!(engine.call_count(), 0);

    // Resolved paths still run the script.
    let body = run(handler, request("GET", "/about")).await;
    assert_eq!(body["script"], "/about.php");
    assert_eq!(engine.call_count(), 1);
}

#[tokio::test]
async fn test_prefix_mount() {
    let dir = site();
    let engine = RecordingEngine::new();
    let bridge = bridge(dir.path(), Mode::Development, engine.clone());
    let handler = with_teapot(bridge.handler().strip_prefix("/app/"));

    assert_eq!(run(handler.clone(), request("GET", "/app")).await["script"], "/index.php");
    assert_eq!(
        run(handler.clone(), request("GET", "/app/about")).await["script"],
        "/about.php"
    );

    let (status, _) = send(handler.clone(), request("GET", "/about")).await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    let (status, _) = send(handler, request("GET", "/application")).await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
    assert_eq!(engine.call_count(), 2);

    let calls = engine.calls();
    let env = &calls[1].env;
    assert_eq!(env["SCRIPT_NAME"], "/app/about.php");
    assert_eq!(env["REQUEST_URI"], "/app/about");
}

#[tokio::test]
async fn test_render_values_reach_script() {
    let dir = fixture(&[("/views/page.php", "page")]);
    let bridge = bridge(dir.path(), Mode::Development, RecordingEngine::new());

    let render = bridge
        .render_handler("/views/page.php", |parts| {
            RenderData::new()
                .with("title", "T")
                .with("path", parts.uri.path())
                .with("tags", &["a", "b"])
        })
        .unwrap();

    let body = run(render, request("GET", "/anything/here")).await;
    assert_eq!(body["script"], "/views/page.php");
    assert_eq!(body["vars"]["BRIDGE_RENDER_title"], "T");
    assert_eq!(body["vars"]["BRIDGE_RENDER_path"], "/anything/here");
    assert_eq!(body["vars"]["BRIDGE_RENDER_tags"], json!(["a", "b"]));
    assert_eq!(body["vars"]["BRIDGE_PATH_SEGMENTS"], json!(["anything", "here"]));
}

#[tokio::test]
async fn test_render_script_removed_is_not_found() {
    let dir = fixture(&[("/index.php", "home")]);
    let bridge = bridge(dir.path(), Mode::Development, RecordingEngine::new());
    bridge
        .store()
        .register(Origin::Virtual, "/views/page.php", Content::bytes("page"))
        .unwrap();

    let render = bridge
        .render_handler("/views/page.php", |_| RenderData::new())
        .unwrap();
    assert_eq!(run(render.clone(), request("GET", "/")).await["source"], "page");

    bridge.store().remove("/views/page.php").unwrap();
    let (status, _) = send(render, request("GET", "/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_json_body_channel() {
    let dir = site();
    let bridge = bridge(dir.path(), Mode::Development, RecordingEngine::new());

    let request = Request::builder()
        .method("POST")
        .uri("/api/users")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"ada","tags":[1,2]}"#))
        .unwrap();
    let body = run(bridge.handler(), request).await;
    assert_eq!(
        body["vars"]["BRIDGE_JSON_BODY"],
        json!({"name": "ada", "tags": [1, 2]})
    );
    assert_eq!(body["method"], "POST");
}

fn bad_json() -> Request {
    Request::builder()
        .method("POST")
        .uri("/api/users")
        .header("content-type", "application/json")
        .body(Body::from("{nope"))
        .unwrap()
}

#[tokio::test]
async fn test_invalid_json_detail_depends_on_mode() {
    let dir = site();

    let engine = RecordingEngine::new();
    let dev = bridge(dir.path(), Mode::Development, engine.clone());
    let (status, body) = send(dev.handler(), bad_json()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("400 Bad Request\n\n"), "{body}");
    assert!(body.len() > "400 Bad Request\n\n".len());
    assert_eq!(engine.call_count(), 0);
    drop(dev);

    let frozen = bridge(dir.path(), Mode::Frozen, RecordingEngine::new());
    let (status, body) = send(frozen.handler(), bad_json()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "400 Bad Request\n");
}

#[tokio::test]
async fn test_form_and_upload_channels() {
    let dir = site();
    let engine = RecordingEngine::new();
    let bridge = bridge(dir.path(), Mode::Development, engine.clone());

    let boundary = "XBOUNDARY";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"note\"\r\n\r\n\
         hello\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         file body\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/users")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(payload))
        .unwrap();

    let body = run(bridge.handler(), request).await;
    assert_eq!(body["vars"]["BRIDGE_FORM"], json!({"note": "hello"}));
    let upload = &body["vars"]["BRIDGE_UPLOADS"][0];
    assert_eq!(upload["field"], "doc");
    assert_eq!(upload["file_name"], "a.txt");
    assert_eq!(upload["size"], 9);

    // Spilled uploads are removed once the request completes.
    let temp_path = PathBuf::from(upload["temp_path"].as_str().unwrap());
    assert!(!temp_path.exists());
}

#[tokio::test]
async fn test_virtual_file_shadows_disk_and_moves() {
    let dir = site();
    let bridge = bridge(dir.path(), Mode::Development, RecordingEngine::new());
    let store = bridge.store();

    store
        .register(Origin::Virtual, "/about.php", Content::bytes("virtual about"))
        .unwrap();
    let body = run(bridge.handler(), request("GET", "/about")).await;
    assert_eq!(body["source"], "virtual about");

    store.move_file("/about.php", "/team.php").unwrap();
    let body = run(bridge.handler(), request("GET", "/team")).await;
    assert_eq!(body["source"], "virtual about");

    // The disk layer at the old path is gone along with the virtual one.
    let (status, _) = send(bridge.handler(), request("GET", "/about")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_server_variables() {
    let dir = site();
    let engine = RecordingEngine::new();
    let bridge = bridge(dir.path(), Mode::Development, engine.clone());

    let request = Request::builder()
        .uri("/about?x=1")
        .header("host", "example.test:8080")
        .header("x-custom", "yes")
        .body(Body::empty())
        .unwrap();
    run(bridge.handler(), request).await;

    let env = &engine.calls()[0].env;
    assert_eq!(env["REQUEST_METHOD"], "GET");
    assert_eq!(env["REQUEST_URI"], "/about?x=1");
    assert_eq!(env["QUERY_STRING"], "x=1");
    assert_eq!(env["SCRIPT_NAME"], "/about.php");
    assert_eq!(env["SERVER_NAME"], "example.test");
    assert_eq!(env["SERVER_PORT"], "8080");
    assert_eq!(env["HTTP_X_CUSTOM"], "yes");
    assert!(env["SCRIPT_FILENAME"].ends_with("about.php"));
}
