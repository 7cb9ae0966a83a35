//! Logical path normalization.
//!
//! # Rules
//! - Leading slash optional on input, always present in canonical form
//! - Repeated slashes collapse (`/a//b` → `/a/b`)
//! - `.` and `..` segments are rejected, never resolved
//! - Backslashes and NUL bytes are rejected
//! - A trailing slash is dropped; callers that care about directory
//!   semantics check the raw input themselves

use std::fmt;

use crate::vfs::error::{VfsError, VfsResult};

/// Normalized, origin-independent address of a virtual file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalPath(String);

impl LogicalPath {
    /// The namespace root (`/`).
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and normalize a logical path.
    pub fn parse(input: &str) -> VfsResult<Self> {
        if input.contains('\0') {
            return Err(VfsError::invalid(input, "NUL byte in path"));
        }
        if input.contains('\\') {
            return Err(VfsError::invalid(input, "backslash in path"));
        }

        let mut canonical = String::with_capacity(input.len() + 1);
        for segment in input.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(VfsError::invalid(input, "dot segments are not allowed"));
            }
            canonical.push('/');
            canonical.push_str(segment);
        }

        if canonical.is_empty() {
            canonical.push('/');
        }
        Ok(Self(canonical))
    }

    /// Parse a path that must name a file (not the root).
    pub fn parse_file(input: &str) -> VfsResult<Self> {
        let path = Self::parse(input)?;
        if path.is_root() {
            return Err(VfsError::invalid(input, "path does not name a file"));
        }
        Ok(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments without the leading slash.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Parent directory, `None` for the root.
    pub fn parent(&self) -> Option<LogicalPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// True when `self` equals `dir` or lives below it.
    pub fn starts_with(&self, dir: &LogicalPath) -> bool {
        if dir.is_root() {
            return true;
        }
        self.0 == dir.0
            || (self.0.starts_with(&dir.0) && self.0.as_bytes().get(dir.0.len()) == Some(&b'/'))
    }

    /// Relative form (no leading slash), used to join onto real directories.
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches('/')
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
