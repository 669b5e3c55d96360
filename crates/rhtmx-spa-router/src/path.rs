/// URL helpers: splitting, joining and relative resolution
///
/// All functions are **pure**: given same input, always produce same output with no side effects.

use std::borrow::Cow;

use tracing::warn;

use crate::query::{LocationQuery, QueryCodec};

/// A URL split into its router-relevant parts
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUrl {
    pub path: String,
    pub query: LocationQuery,
    /// Empty or starting with `#`
    pub hash: String,
}

/// Splits `location` into path, query and hash
///
/// A relative path is resolved against `current_path`.
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::path::parse_url;
/// use rhtmx_spa_router::query::DefaultQueryCodec;
///
/// let url = parse_url(&DefaultQueryCodec, "edit?tab=2#top", "/users/1");
/// assert_eq!(url.path, "/users/edit");
/// assert_eq!(url.query["tab"], "2");
/// assert_eq!(url.hash, "#top");
/// ```
pub fn parse_url(codec: &dyn QueryCodec, location: &str, current_path: &str) -> ParsedUrl {
    let (before_hash, hash) = match location.find('#') {
        Some(index) => (&location[..index], &location[index..]),
        None => (location, ""),
    };
    let (path, search) = match before_hash.find('?') {
        Some(index) => (&before_hash[..index], &before_hash[index + 1..]),
        None => (before_hash, ""),
    };

    ParsedUrl {
        path: resolve_relative_path(path, current_path).into_owned(),
        query: codec.parse(search),
        hash: hash.to_string(),
    }
}

/// Joins path, query and hash back into a full path
pub fn stringify_url(codec: &dyn QueryCodec, path: &str, query: &LocationQuery, hash: &str) -> String {
    let search = codec.stringify(query);
    let mut url = String::with_capacity(path.len() + search.len() + hash.len() + 1);
    url.push_str(path);
    if !search.is_empty() {
        url.push('?');
        url.push_str(&search);
    }
    url.push_str(hash);
    url
}

/// Resolves `to` against `from` the way a browser resolves relative links
///
/// Returns `Cow::Borrowed` for absolute paths (zero allocations).
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::path::resolve_relative_path;
///
/// assert_eq!(resolve_relative_path("/about", "/users/1"), "/about");
/// assert_eq!(resolve_relative_path("2", "/users/1"), "/users/2");
/// assert_eq!(resolve_relative_path("../posts", "/users/1"), "/posts");
/// assert_eq!(resolve_relative_path("./", "/users/1"), "/users/");
/// assert_eq!(resolve_relative_path("", "/users/1"), "/users/1");
/// ```
pub fn resolve_relative_path<'a>(to: &'a str, from: &str) -> Cow<'a, str> {
    if to.starts_with('/') {
        return Cow::Borrowed(to);
    }
    if !from.starts_with('/') {
        warn!(to, from, "cannot resolve a relative path against a non-absolute path");
        return Cow::Borrowed(to);
    }
    if to.is_empty() {
        return Cow::Owned(from.to_string());
    }

    let from_segments: Vec<&str> = from.split('/').collect();
    let mut to_segments: Vec<&str> = to.split('/').collect();

    // "." or ".." as the last segment behaves like a directory
    if matches!(to_segments.last(), Some(&"..") | Some(&".")) {
        to_segments.push("");
    }

    let mut position = from_segments.len() - 1;
    let mut to_position = 0;
    while to_position < to_segments.len() {
        match to_segments[to_position] {
            "." => {}
            ".." => {
                if position > 1 {
                    position -= 1;
                }
            }
            _ => break,
        }
        to_position += 1;
    }

    let mut resolved = from_segments[..position].join("/");
    resolved.push('/');
    resolved.push_str(&to_segments[to_position..].join("/"));
    Cow::Owned(resolved)
}

/// Normalizes a base path: leading `/`, no trailing `/`, empty stays empty
///
/// Returns `Cow::Borrowed` when the base is already canonical.
pub fn normalize_base(base: &str) -> Cow<'_, str> {
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        return Cow::Borrowed("");
    }
    if trimmed.starts_with('/') {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("/{trimmed}"))
    }
}
