//! Request body decoding.
//!
//! # Responsibilities
//! - Pick a decoder from the media type of `Content-Type`
//! - URL-encoded forms become ordered key/value pairs
//! - Multipart text fields join the form, file parts spill to a temp dir
//! - JSON bodies are decoded once and rejected when malformed

use std::io::Write;
use std::path::PathBuf;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tempfile::TempDir;

use crate::context::error::ContextError;

/// A file part of a multipart body, already written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    /// Form field the part was sent under.
    pub field: String,
    /// Client-supplied file name, untrusted.
    pub file_name: String,
    pub content_type: Option<String>,
    /// Location of the spilled bytes; removed when the request ends.
    pub temp_path: PathBuf,
    pub size: u64,
}

/// Everything decoded from one request body.
#[derive(Debug, Default)]
pub struct ParsedBody {
    pub form: Vec<(String, String)>,
    pub uploads: Vec<UploadedFile>,
    pub json: Option<Value>,
    /// Owns upload files; dropping it deletes them.
    pub upload_dir: Option<TempDir>,
}

/// Lowercased media type without parameters.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_json(media: &str) -> bool {
    media == "application/json" || (media.starts_with("application/") && media.ends_with("+json"))
}

/// Decode `body` according to `content_type`. Unknown types yield an
/// empty result; the raw bytes stay available to the script either way.
pub async fn parse_body(content_type: Option<&str>, body: &Bytes) -> Result<ParsedBody, ContextError> {
    let Some(content_type) = content_type else {
        return Ok(ParsedBody::default());
    };
    let media = media_type(content_type);

    if media == "application/x-www-form-urlencoded" {
        let form = url::form_urlencoded::parse(body)
            .into_owned()
            .collect();
        return Ok(ParsedBody {
            form,
            ..ParsedBody::default()
        });
    }

    if media == "multipart/form-data" {
        return parse_multipart(content_type, body.clone()).await;
    }

    if is_json(&media) {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ParsedBody::default());
        }
        let json = serde_json::from_slice(body).map_err(|e| ContextError::invalid("json", e))?;
        return Ok(ParsedBody {
            json: Some(json),
            ..ParsedBody::default()
        });
    }

    Ok(ParsedBody::default())
}

async fn parse_multipart(content_type: &str, body: Bytes) -> Result<ParsedBody, ContextError> {
    let request = Request::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .map_err(|e| ContextError::invalid("multipart", e))?;
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ContextError::invalid("multipart", e.body_text()))?;

    let mut parsed = ParsedBody::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ContextError::invalid("multipart", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field
                .text()
                .await
                .map_err(|e| ContextError::invalid("multipart", e.body_text()))?;
            parsed.form.push((name, text));
            continue;
        };

        let dir = match parsed.upload_dir.take() {
            Some(dir) => dir,
            None => tempfile::Builder::new().prefix("bridge-upload-").tempdir()?,
        };
        let content_type = field.content_type().map(str::to_string);
        let mut spill = tempfile::Builder::new().prefix("part-").tempfile_in(dir.path())?;
        let mut size = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ContextError::invalid("multipart", e.body_text()))?
        {
            spill.write_all(&chunk)?;
            size += chunk.len() as u64;
        }
        let (_, temp_path) = spill.keep().map_err(|e| ContextError::Upload(e.error))?;
        parsed.upload_dir = Some(dir);

        parsed.uploads.push(UploadedFile {
            field: name,
            file_name,
            content_type,
            temp_path,
            size,
        });
    }
    Ok(parsed)
}
