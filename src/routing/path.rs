//! Request path splitting.

use percent_encoding::percent_decode_str;

use crate::vfs::{VfsError, VfsResult};

/// A URL path broken into routable segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    /// Percent-decoded segments.
    pub segments: Vec<String>,
    /// Segments exactly as they appeared in the URL.
    pub raw_segments: Vec<String>,
    /// Trailing slash (or the root): only index scripts may answer.
    pub directory: bool,
}

impl RequestPath {
    pub fn parse(raw: &str) -> VfsResult<Self> {
        let mut segments = Vec::new();
        let mut raw_segments = Vec::new();

        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            let decoded = percent_decode_str(segment)
                .decode_utf8()
                .map_err(|_| VfsError::invalid(raw, "invalid UTF-8 in percent-encoded segment"))?;
            if decoded == "." || decoded == ".." {
                return Err(VfsError::invalid(raw, "dot segments are not allowed"));
            }
            if decoded.contains(['/', '\\', '\0']) {
                return Err(VfsError::invalid(raw, "encoded separator in segment"));
            }
            segments.push(decoded.into_owned());
            raw_segments.push(segment.to_string());
        }

        let directory = segments.is_empty() || raw.ends_with('/');
        Ok(Self {
            segments,
            raw_segments,
            directory,
        })
    }

    /// Decoded path in canonical slash-prefixed form.
    pub fn key(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut key = String::new();
        for segment in &self.segments {
            key.push('/');
            key.push_str(segment);
        }
        key
    }
}
