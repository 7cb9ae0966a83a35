//! CGI engine: one child process per request.
//!
//! # Responsibilities
//! - Spawn the configured program with a clean environment plus context channels
//! - Stream the request body on stdin while collecting stdout/stderr
//! - Parse the CGI response header block and `Status:` line
//!
//! # Design Decisions
//! - `kill_on_drop` ties the child to the request future; a client
//!   disconnect drops the future and kills the process
//! - Only `PATH` survives from the parent environment
//! - A script that exits unsuccessfully is an error even if it wrote output

use std::process::Stdio;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::engine::{EngineError, EngineOutput, Invocation, ScriptEngine};

const MAX_STDERR: usize = 4096;

/// Runs scripts through an external CGI program such as `php-cgi`.
#[derive(Debug, Clone)]
pub struct CgiEngine {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CgiEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Arguments placed before the script path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ScriptEngine for CgiEngine {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, Result<EngineOutput, EngineError>> {
        let engine = self.clone();
        Box::pin(async move {
            match engine.timeout {
                Some(limit) => tokio::time::timeout(limit, engine.run(invocation))
                    .await
                    .map_err(|_| EngineError::Timeout(limit.as_secs()))?,
                None => engine.run(invocation).await,
            }
        })
    }
}

impl CgiEngine {
    async fn run(&self, invocation: Invocation) -> Result<EngineOutput, EngineError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&invocation.script_path)
            .env_clear()
            .envs(invocation.context.environment())
            .current_dir(
                invocation
                    .script_path
                    .parent()
                    .unwrap_or(invocation.document_root.as_path()),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let body = invocation.context.body.clone();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // Scripts may exit without reading their input.
                if let Err(e) = stdin.write_all(&body).await {
                    tracing::debug!(error = %e, "Script closed stdin early");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.len() > MAX_STDERR {
                let mut cut = MAX_STDERR;
                while !stderr.is_char_boundary(cut) {
                    cut -= 1;
                }
                stderr.truncate(cut);
            }
            return Err(EngineError::Failed {
                code: output.status.code(),
                stderr,
            });
        }
        if !output.stderr.is_empty() {
            tracing::debug!(
                script = %invocation.script_path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Script wrote to stderr"
            );
        }

        parse_cgi_output(Bytes::from(output.stdout))
    }
}

/// Split raw CGI output into status, headers and body.
pub fn parse_cgi_output(raw: Bytes) -> Result<EngineOutput, EngineError> {
    if raw.is_empty() {
        return Ok(EngineOutput::new(StatusCode::OK, Bytes::new()));
    }
    let Some((head_end, body_start)) = header_boundary(&raw) else {
        return Err(EngineError::InvalidOutput("missing header terminator".to_string()));
    };
    let head = std::str::from_utf8(&raw[..head_end])
        .map_err(|_| EngineError::InvalidOutput("header block is not UTF-8".to_string()))?;

    let mut status = None;
    let mut headers = HeaderMap::new();
    for line in head.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(EngineError::InvalidOutput(format!("bad header line '{line}'")));
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("status") {
            let code = value.split_whitespace().next().unwrap_or_default();
            status = Some(
                code.parse::<u16>()
                    .ok()
                    .and_then(|c| StatusCode::from_u16(c).ok())
                    .ok_or_else(|| EngineError::InvalidOutput(format!("bad status '{value}'")))?,
            );
            continue;
        }
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| EngineError::InvalidOutput(format!("bad header name '{name}'")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| EngineError::InvalidOutput(format!("bad value for header '{name}'")))?;
        headers.append(name, value);
    }

    let status = status.unwrap_or(if headers.contains_key(LOCATION) {
        StatusCode::FOUND
    } else {
        StatusCode::OK
    });
    Ok(EngineOutput {
        status,
        headers,
        body: raw.slice(body_start..),
    })
}

/// `(end of headers, start of body)` for the first blank line.
fn header_boundary(raw: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\n' {
            if raw.get(i + 1) == Some(&b'\n') {
                return Some((i, i + 2));
            }
            if raw.get(i + 1) == Some(&b'\r') && raw.get(i + 2) == Some(&b'\n') {
                return Some((i, i + 3));
            }
        }
        i += 1;
    }
    None
}
