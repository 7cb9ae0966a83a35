//! File-name grammar.
//!
//! Turns a logical file path into the route pattern it implies:
//!
//! ```text
//! /about.php               → /about            Static
//! /api/users.get.php       → /api/users  GET   MethodSuffixed
//! /blog/index.php          → /blog/            Index
//! /post/[slug].php         → /post/:slug       Dynamic
//! /u/[id]/index.post.php   → /u/:id/     POST  Dynamic
//! ```

use axum::http::Method;

use crate::routing::router::RoutingOptions;
use crate::vfs::LogicalPath;

/// Tagged variant of a compiled route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Static,
    MethodSuffixed,
    Index,
    Dynamic,
}

impl RouteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Static => "static",
            RouteKind::MethodSuffixed => "method",
            RouteKind::Index => "index",
            RouteKind::Dynamic => "dynamic",
        }
    }
}

/// One URL path segment of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(name) if is_param_name(name) => Segment::Param(name.to_string()),
            _ => Segment::Static(raw.to_string()),
        }
    }
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Map a lowercase file-name suffix to the method it selects.
pub fn method_from_suffix(suffix: &str) -> Option<Method> {
    match suffix {
        "get" => Some(Method::GET),
        "post" => Some(Method::POST),
        "put" => Some(Method::PUT),
        "patch" => Some(Method::PATCH),
        "delete" => Some(Method::DELETE),
        "head" => Some(Method::HEAD),
        "options" => Some(Method::OPTIONS),
        _ => None,
    }
}

/// Route implied by a script's logical path.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    pub file: LogicalPath,
    /// URL segments; for index scripts only the directory part.
    pub segments: Vec<Segment>,
    pub method: Option<Method>,
    pub index: bool,
}

impl RoutePattern {
    /// `None` when the file is not a routable script.
    pub fn parse(file: &LogicalPath, options: &RoutingOptions) -> Option<Self> {
        let name = file.file_name()?;
        let stem = name.strip_suffix(options.extension.as_str())?.strip_suffix('.')?;

        let (stem, method) = match stem.rsplit_once('.') {
            Some((head, suffix)) if !head.is_empty() => match method_from_suffix(suffix) {
                Some(method) => (head, Some(method)),
                None => (stem, None),
            },
            _ => (stem, None),
        };
        if stem.is_empty() {
            return None;
        }

        let directories: Vec<&str> = file.segments().collect();
        let directories = &directories[..directories.len() - 1];
        let mut segments: Vec<Segment> = directories.iter().map(|s| Segment::parse(s)).collect();

        let index = stem == options.index_name;
        if !index {
            segments.push(Segment::parse(stem));
        }

        Some(Self {
            file: file.clone(),
            segments,
            method,
            index,
        })
    }

    pub fn is_dynamic(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Param(_)))
    }

    pub fn kind(&self) -> RouteKind {
        if self.is_dynamic() {
            RouteKind::Dynamic
        } else if self.index {
            RouteKind::Index
        } else if self.method.is_some() {
            RouteKind::MethodSuffixed
        } else {
            RouteKind::Static
        }
    }

    /// Parameter names in discovery order.
    pub fn param_names(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.clone()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    /// Clean URL key for a static pattern (`/a/b`, `/` for the root index).
    pub fn static_key(&self) -> String {
        let mut key = String::new();
        for segment in &self.segments {
            key.push('/');
            match segment {
                Segment::Static(s) | Segment::Param(s) => key.push_str(s),
            }
        }
        if key.is_empty() {
            key.push('/');
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RoutingOptions {
        RoutingOptions::default()
    }

    fn parse(path: &str) -> Option<RoutePattern> {
        RoutePattern::parse(&LogicalPath::parse(path).unwrap(), &options())
    }

    #[test]
    fn test_static() {
        let p = parse("/about.php").unwrap();
        assert_eq!(p.kind(), RouteKind::Static);
        assert_eq!(p.static_key(), "/about");
        assert_eq!(p.method, None);
    }

    #[test]
    fn test_method_suffix() {
        let p = parse("/api/users.get.php").unwrap();
        assert_eq!(p.kind(), RouteKind::MethodSuffixed);
        assert_eq!(p.method, Some(Method::GET));
        assert_eq!(p.static_key(), "/api/users");

        // Uppercase and unknown suffixes are part of the name.
        assert_eq!(parse("/a.GET.php").unwrap().static_key(), "/a.GET");
        assert_eq!(parse("/jquery.min.php").unwrap().static_key(), "/jquery.min");
        // A bare method name is a regular script.
        assert_eq!(parse("/get.php").unwrap().static_key(), "/get");
    }

    #[test]
    fn test_index() {
        let p = parse("/blog/index.php").unwrap();
        assert_eq!(p.kind(), RouteKind::Index);
        assert_eq!(p.static_key(), "/blog");
        assert_eq!(parse("/index.php").unwrap().static_key(), "/");

        let p = parse("/blog/index.post.php").unwrap();
        assert!(p.index);
        assert_eq!(p.method, Some(Method::POST));
    }

    #[test]
    fn test_dynamic() {
        let p = parse("/users/[id]/posts/[post_id].php").unwrap();
        assert_eq!(p.kind(), RouteKind::Dynamic);
        assert_eq!(p.param_names(), vec!["id", "post_id"]);

        let p = parse("/u/[id]/index.delete.php").unwrap();
        assert!(p.index && p.is_dynamic());
        assert_eq!(p.method, Some(Method::DELETE));

        // Partial or empty brackets stay literal.
        assert!(!parse("/post-[id].php").unwrap().is_dynamic());
        assert!(!parse("/[].php").unwrap().is_dynamic());
    }

    #[test]
    fn test_non_scripts_ignored() {
        assert!(parse("/style.css").is_none());
        assert!(parse("/.php").is_none());
        assert!(parse("/notphp").is_none());
    }
}
