//! The CGI engine against `sh`, standing in for a real interpreter.

#![cfg(unix)]

mod common;

use std::fs;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;

use common::{config, fixture, request, send};
use script_bridge::config::Mode;
use script_bridge::engine::CgiEngine;
use script_bridge::lifecycle::Bridge;

fn sh_bridge(files: &[(&str, &str)], mode: Mode, timeout: Option<Duration>) -> (tempfile::TempDir, Bridge) {
    let dir = fixture(files);
    let mut engine = CgiEngine::new("sh");
    if let Some(timeout) = timeout {
        engine = engine.with_timeout(timeout);
    }
    let bridge = Bridge::builder(config(dir.path(), mode))
        .engine(engine)
        .build()
        .unwrap();
    (dir, bridge)
}

#[tokio::test]
async fn test_headers_status_and_environment() {
    let script = r#"printf 'Status: 201 Created\r\nX-Method: %s\r\n\r\n' "$REQUEST_METHOD"
printf '%s|%s' "$BRIDGE_PATH_PARAMS" "$QUERY_STRING""#;
    let (_dir, bridge) = sh_bridge(&[("/items/[id].php", script)], Mode::Development, None);

    let response = tower::ServiceExt::oneshot(bridge.handler(), request("POST", "/items/9?x=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-method"], "POST");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], br#"{"id":"9"}|x=1"#);
}

#[tokio::test]
async fn test_request_body_on_stdin() {
    let script = "printf 'Content-Type: text/plain\\n\\n'\ncat";
    let (_dir, bridge) = sh_bridge(&[("/echo.php", script)], Mode::Development, None);

    let request = Request::builder()
        .method("POST")
        .uri("/echo")
        .header("content-type", "text/plain")
        .body(Body::from("ping"))
        .unwrap();
    let (status, body) = send(bridge.handler(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ping");
}

#[tokio::test]
async fn test_virtual_script_is_materialized() {
    let dir = fixture(&[]);
    let bridge = Bridge::builder(config(dir.path(), Mode::Frozen))
        .engine(CgiEngine::new("sh"))
        .virtual_file("/v.php", "printf 'Content-Type: text/plain\\n\\nvirtual'")
        .build()
        .unwrap();

    let (status, body) = send(bridge.handler(), request("GET", "/v")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "virtual");
}

#[tokio::test]
async fn test_failing_script_is_server_error() {
    let (_dir, bridge) = sh_bridge(&[("/boom.php", "echo oops >&2\nexit 3")], Mode::Development, None);

    let (status, body) = send(bridge.handler(), request("GET", "/boom")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("oops"), "{body}");
}

#[tokio::test]
async fn test_timeout_is_gateway_timeout() {
    let (_dir, bridge) = sh_bridge(
        &[("/slow.php", "sleep 5")],
        Mode::Frozen,
        Some(Duration::from_millis(200)),
    );

    let (status, body) = send(bridge.handler(), request("GET", "/slow")).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, "504 Gateway Timeout\n");
}

/// Gone entirely, or killed and awaiting reaping.
#[cfg(target_os = "linux")]
fn process_exited(pid: &str) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_dropped_request_kills_script() {
    let (dir, bridge) = sh_bridge(
        &[("/hang.php", "echo $$ > child.pid\nexec sleep 30")],
        Mode::Frozen,
        None,
    );

    let pending = send(bridge.handler(), request("GET", "/hang"));
    let abandoned = tokio::time::timeout(Duration::from_millis(500), pending).await;
    assert!(abandoned.is_err());

    let pid = fs::read_to_string(dir.path().join("child.pid")).unwrap();
    let pid = pid.trim();
    for _ in 0..40 {
        if process_exited(pid) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("script process {pid} outlived its request");
}
