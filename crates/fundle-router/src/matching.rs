//! Path-pattern matching and query-string parsing.
//!
//! A pattern is a `/`-separated list of segments; a segment starting with
//! `:` binds the corresponding path segment under that name, any other
//! segment must match literally. Empty segments are ignored on both sides,
//! so `/users/` and `users` are the same path.
//!
//! # Invariants
//!
//! 1. Segment counts must be equal for a match; there are no wildcards.
//! 2. Bound values are the raw path segments (no percent-decoding).
//! 3. The query string follows `application/x-www-form-urlencoded` rules:
//!    `+` is a space, escapes are decoded, repeated keys keep their order.

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;

/// Named segments bound by a pattern.
pub type Params = BTreeMap<String, String>;

/// Ordered, multi-valued query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a query string, with or without its leading `?`.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        }
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    /// Every value for `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish();
        f.write_str(&encoded)
    }
}

/// Result of matching one path against one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub params: Params,
    pub query: QueryParams,
}

/// Split `path` into its path part and query part.
#[must_use]
pub fn split_query(path: &str) -> (&str, &str) {
    path.split_once('?').unwrap_or((path, ""))
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Match `path` (optionally carrying a query string) against `pattern`.
#[must_use]
pub fn match_path(path: &str, pattern: &str) -> Option<PathMatch> {
    let (path, query) = split_query(path);
    let actual: Vec<&str> = segments(path).collect();
    let expected: Vec<&str> = segments(pattern).collect();
    if actual.len() != expected.len() {
        return None;
    }

    let mut params = Params::new();
    for (segment, wanted) in actual.iter().zip(&expected) {
        match wanted.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_owned(), (*segment).to_owned());
            }
            None if segment == wanted => {}
            None => return None,
        }
    }

    Some(PathMatch {
        params,
        query: QueryParams::parse(query),
    })
}
