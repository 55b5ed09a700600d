//! Route key derivation.
//!
//! # Responsibilities
//! - Normalize declared and requested paths the same way
//! - Reduce a request path to the path component of its route key
//!
//! # Design Decisions
//! - Empty segments are dropped (`/a//b/` and `/a/b` are the same path)
//! - Path matching is case-sensitive
//! - `Segments` keys on the first two segments only; routes it could never
//!   reach are rejected when the table is built

use serde::{Deserialize, Serialize};

/// How much of the request path takes part in the route key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMatching {
    /// `/seg1` or `/seg1/seg2`; anything deeper is ignored.
    #[default]
    Segments,
    /// The whole normalized path.
    Full,
}

const SEGMENT_DEPTH: usize = 2;

impl RouteMatching {
    /// Path component of the route key for a request path.
    pub fn key_path(self, request_path: &str) -> String {
        match self {
            RouteMatching::Segments => join(segments(request_path).take(SEGMENT_DEPTH)),
            RouteMatching::Full => normalize(request_path),
        }
    }

    /// Whether a registered path can ever be produced by `key_path`.
    pub fn can_match(self, route_path: &str) -> bool {
        match self {
            RouteMatching::Segments => segments(route_path).count() <= SEGMENT_DEPTH,
            RouteMatching::Full => true,
        }
    }
}

/// Canonical form: leading slash, no empty segments, no trailing slash.
pub fn normalize(path: &str) -> String {
    join(segments(path))
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn join<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/test/invoke"), "/test/invoke");
        assert_eq!(normalize("/test//invoke/"), "/test/invoke");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn test_segment_keys() {
        let m = RouteMatching::Segments;
        assert_eq!(m.key_path("/test"), "/test");
        assert_eq!(m.key_path("/test/invoke"), "/test/invoke");
        assert_eq!(m.key_path("/test/invoke/42/extra"), "/test/invoke");
        assert_eq!(m.key_path("/"), "/");
    }

    #[test]
    fn test_full_keys() {
        let m = RouteMatching::Full;
        assert_eq!(m.key_path("/test/invoke/42"), "/test/invoke/42");
    }

    #[test]
    fn test_can_match() {
        assert!(RouteMatching::Segments.can_match("/a/b"));
        assert!(!RouteMatching::Segments.can_match("/a/b/c"));
        assert!(RouteMatching::Full.can_match("/a/b/c"));
    }

    #[test]
    fn test_case_sensitive() {
        assert_ne!(
            RouteMatching::Full.key_path("/API/x"),
            RouteMatching::Full.key_path("/api/x")
        );
    }
}
