/// Query string codec
///
/// The router only needs two operations from a query codec, so the default
/// one can be swapped for an application specific format through
/// [`RouterBuilder::with_query_codec`](crate::RouterBuilder::with_query_codec).

use std::collections::BTreeMap;

use tracing::warn;

/// A query value: one string, or every value of a repeated key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Single(value) => Some(value),
            QueryValue::List(_) => None,
        }
    }

    fn push(self, value: String) -> Self {
        match self {
            QueryValue::Single(first) => QueryValue::List(vec![first, value]),
            QueryValue::List(mut values) => {
                values.push(value);
                QueryValue::List(values)
            }
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(values: Vec<&str>) -> Self {
        QueryValue::List(values.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::List(values)
    }
}

impl PartialEq<&str> for QueryValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Decoded query, keys sorted so that equal queries stringify identically
pub type LocationQuery = BTreeMap<String, QueryValue>;

/// Parses and stringifies the query part of a URL
pub trait QueryCodec: Send + Sync {
    /// Parses `search`, with or without its leading `?`
    fn parse(&self, search: &str) -> LocationQuery;

    /// Stringifies `query` without a leading `?`
    fn stringify(&self, query: &LocationQuery) -> String;
}

/// `application/x-www-form-urlencoded` style codec
///
/// - `+` decodes to a space
/// - repeated keys collect into [`QueryValue::List`]
/// - an empty value stringifies as the bare key
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryCodec;

fn decode_component(text: &str) -> String {
    let text = text.replace('+', " ");
    match urlencoding::decode(&text) {
        Ok(decoded) => decoded.into_owned(),
        Err(err) => {
            warn!(value = %text, error = %err, "failed to decode query component");
            text
        }
    }
}

impl QueryCodec for DefaultQueryCodec {
    fn parse(&self, search: &str) -> LocationQuery {
        let search = search.strip_prefix('?').unwrap_or(search);
        let mut query = LocationQuery::new();

        for pair in search.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            let value = decode_component(value);

            let entry = match query.remove(&key) {
                Some(existing) => existing.push(value),
                None => QueryValue::Single(value),
            };
            query.insert(key, entry);
        }

        query
    }

    fn stringify(&self, query: &LocationQuery) -> String {
        let mut pairs = Vec::with_capacity(query.len());

        for (key, value) in query {
            let key = urlencoding::encode(key);
            match value {
                QueryValue::Single(value) if value.is_empty() => pairs.push(key.into_owned()),
                QueryValue::Single(value) => {
                    pairs.push(format!("{key}={}", urlencoding::encode(value)))
                }
                QueryValue::List(values) => {
                    for value in values {
                        if value.is_empty() {
                            pairs.push(key.to_string());
                        } else {
                            pairs.push(format!("{key}={}", urlencoding::encode(value)));
                        }
                    }
                }
            }
        }

        pairs.join("&")
    }
}
