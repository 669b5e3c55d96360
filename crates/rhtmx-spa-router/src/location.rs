/// Route locations
///
/// A [`RouteLocationRaw`] is what callers hand to `push`/`resolve`: a path,
/// a named route with params, or params only (relative to the current
/// route). The router normalizes it into a [`RouteLocation`], which carries
/// the matched record chain and the merged meta.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::query::{LocationQuery, QueryCodec};
use crate::record::RouteRecord;

/// A param value: one segment, or every segment of a repeatable param
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::Single(_) => None,
            ParamValue::List(values) => Some(values),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Single(value) => value.is_empty(),
            ParamValue::List(values) => values.is_empty(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl PartialEq<&str> for ParamValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

pub type RouteParams = HashMap<String, ParamValue>;

/// Arbitrary data attached to a record, merged from root to leaf
pub type RouteMeta = serde_json::Map<String, serde_json::Value>;

/// Opaque per-entry history payload
pub type HistoryState = serde_json::Value;

/// Builds [`RouteParams`] from pairs
///
/// ```
/// use rhtmx_spa_router::location::{params, ParamValue};
///
/// let p = params([("id", "7")]);
/// assert_eq!(p["id"], ParamValue::from("7"));
/// ```
pub fn params<I, K, V>(pairs: I) -> RouteParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// What a raw location points at
#[derive(Debug, Clone, PartialEq)]
pub enum RouteTarget {
    /// A URL, absolute or relative to the current path, possibly with
    /// `?query` and `#hash`
    Path(String),
    /// A named record with its params
    Named { name: String, params: RouteParams },
    /// Params only; the current record is kept and params are merged
    Relative { params: RouteParams },
}

/// A navigation target as given by callers
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::location::RouteLocationRaw;
///
/// let to = RouteLocationRaw::named("user")
///     .with_param("id", "1")
///     .with_query("tab", "posts")
///     .with_hash("bio")
///     .replace();
/// assert!(to.replace);
/// assert_eq!(to.hash.as_deref(), Some("#bio"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLocationRaw {
    pub target: RouteTarget,
    /// Overrides any query parsed from a path target
    pub query: Option<LocationQuery>,
    /// Overrides any hash parsed from a path target, stored with its `#`
    pub hash: Option<String>,
    pub replace: bool,
    /// Skips the duplicate check
    pub force: bool,
    pub state: Option<HistoryState>,
}

impl RouteLocationRaw {
    fn from_target(target: RouteTarget) -> Self {
        Self {
            target,
            query: None,
            hash: None,
            replace: false,
            force: false,
            state: None,
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::from_target(RouteTarget::Path(path.into()))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::from_target(RouteTarget::Named {
            name: name.into(),
            params: RouteParams::new(),
        })
    }

    /// Params-only target relative to the current route
    pub fn relative(params: RouteParams) -> Self {
        Self::from_target(RouteTarget::Relative { params })
    }

    /// Adds a param to a named or relative target
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        match &mut self.target {
            RouteTarget::Named { params, .. } | RouteTarget::Relative { params } => {
                params.insert(key.into(), value.into());
            }
            RouteTarget::Path(path) => {
                warn!(path = %path, "params are ignored on path targets");
            }
        }
        self
    }

    pub fn with_params(self, params: RouteParams) -> Self {
        params
            .into_iter()
            .fold(self, |raw, (key, value)| raw.with_param(key, value))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<crate::query::QueryValue>) -> Self {
        self.query
            .get_or_insert_with(LocationQuery::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_query_map(mut self, query: LocationQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(normalize_hash(&hash.into()));
        self
    }

    pub fn with_state(mut self, state: HistoryState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn replace(self) -> Self {
        self.with_replace(true)
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn force(self) -> Self {
        self.with_force(true)
    }

    /// Whether the target names a path or a record, as redirects must
    pub fn has_path_or_name(&self) -> bool {
        !matches!(self.target, RouteTarget::Relative { .. })
    }

    pub fn describe(&self) -> String {
        match &self.target {
            RouteTarget::Path(path) => format!("path {path:?}"),
            RouteTarget::Named { name, .. } => format!("name {name:?}"),
            RouteTarget::Relative { .. } => "params-only location".to_string(),
        }
    }
}

impl From<&str> for RouteLocationRaw {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl From<String> for RouteLocationRaw {
    fn from(path: String) -> Self {
        Self::path(path)
    }
}

impl From<&String> for RouteLocationRaw {
    fn from(path: &String) -> Self {
        Self::path(path.as_str())
    }
}

/// Ensures a non-empty hash starts with `#`
pub(crate) fn normalize_hash(hash: &str) -> String {
    if hash.is_empty() || hash.starts_with('#') {
        hash.to_string()
    } else {
        format!("#{hash}")
    }
}

/// The parts of a location produced by the matcher
#[derive(Debug, Clone)]
pub struct MatchedLocation {
    pub name: Option<String>,
    pub path: String,
    pub params: RouteParams,
    pub matched: Vec<Arc<RouteRecord>>,
    pub meta: RouteMeta,
}

/// A fully resolved location
#[derive(Debug, Clone)]
pub struct RouteLocation {
    pub name: Option<String>,
    /// Percent-encoded path without query or hash
    pub path: String,
    /// `path` + `?query` + `#hash`
    pub full_path: String,
    /// `full_path` prefixed with the router base
    pub href: String,
    /// Decoded params
    pub params: RouteParams,
    pub query: LocationQuery,
    /// Empty or starting with `#`
    pub hash: String,
    /// Record chain, root first
    pub matched: Vec<Arc<RouteRecord>>,
    pub meta: RouteMeta,
    /// The location this one was redirected from
    pub redirected_from: Option<Arc<RouteLocation>>,
}

impl RouteLocation {
    /// The location before the first navigation
    pub fn start() -> Self {
        Self {
            name: None,
            path: "/".to_string(),
            full_path: "/".to_string(),
            href: "/".to_string(),
            params: RouteParams::new(),
            query: LocationQuery::new(),
            hash: String::new(),
            matched: Vec::new(),
            meta: RouteMeta::new(),
            redirected_from: None,
        }
    }

    pub(crate) fn from_match(
        matched: MatchedLocation,
        full_path: String,
        href: String,
        query: LocationQuery,
        hash: String,
    ) -> Self {
        Self {
            name: matched.name,
            path: matched.path,
            full_path,
            href,
            params: matched.params,
            query,
            hash,
            matched: matched.matched,
            meta: matched.meta,
            redirected_from: None,
        }
    }

    /// The innermost matched record
    pub fn leaf(&self) -> Option<&Arc<RouteRecord>> {
        self.matched.last()
    }

    /// The first location of a redirect chain
    pub fn original_target(&self) -> Option<&Arc<RouteLocation>> {
        let mut current = self.redirected_from.as_ref()?;
        while let Some(previous) = current.redirected_from.as_ref() {
            current = previous;
        }
        Some(current)
    }

    /// Path target pointing back at this location
    pub fn to_raw(&self) -> RouteLocationRaw {
        RouteLocationRaw::path(self.full_path.clone())
    }
}

/// Same leaf record (aliases count as their original), same params,
/// same query and same hash
pub fn is_same_route_location(codec: &dyn QueryCodec, a: &RouteLocation, b: &RouteLocation) -> bool {
    let same_leaf = match (a.leaf(), b.leaf()) {
        (Some(x), Some(y)) => x.is_same_record(y) && a.matched.len() == b.matched.len(),
        _ => false,
    };

    same_leaf
        && a.params == b.params
        && codec.stringify(&a.query) == codec.stringify(&b.query)
        && a.hash == b.hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_value_conversions() {
        assert_eq!(ParamValue::from("1"), "1");
        assert_eq!(ParamValue::from(vec!["a", "b"]).as_list().map(<[String]>::len), Some(2));
        assert!(ParamValue::List(vec![]).is_empty());
    }

    #[test]
    fn test_hash_is_normalized() {
        assert_eq!(RouteLocationRaw::from("/").with_hash("top").hash.as_deref(), Some("#top"));
        assert_eq!(RouteLocationRaw::from("/").with_hash("#top").hash.as_deref(), Some("#top"));
        assert_eq!(normalize_hash(""), "");
    }

    #[test]
    fn test_with_param_on_targets() {
        let raw = RouteLocationRaw::relative(RouteParams::new()).with_param("id", "2");
        assert_eq!(raw.target, RouteTarget::Relative { params: params([("id", "2")]) });
        assert!(!raw.has_path_or_name());

        let raw = RouteLocationRaw::from("/a").with_param("id", "2");
        assert_eq!(raw.target, RouteTarget::Path("/a".into()));
    }

    #[test]
    fn test_original_target_walks_chain() {
        let first = Arc::new(RouteLocation::start());
        let mut second = RouteLocation::start();
        second.full_path = "/second".into();
        second.redirected_from = Some(first.clone());
        let mut third = RouteLocation::start();
        third.redirected_from = Some(Arc::new(second));

        assert!(Arc::ptr_eq(third.original_target().unwrap(), &first));
        assert!(first.original_target().is_none());
    }
}
