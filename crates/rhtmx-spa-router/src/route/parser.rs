/// Path parser compilation and ranking
///
/// Compiles tokenized templates into a [`PathParser`]: an anchored regex with
/// one named group per param, the ordered param keys, a per-segment score
/// used to rank routes, and a stringifier that builds paths back from params.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use super::encoding::{decode_param, encode_param};
use super::pattern::{tokenize_path, PathSegment, PathToken};
use crate::config::PathParserOptions;
use crate::error::RouterError;
use crate::location::{ParamValue, RouteParams};

/// Score weights
///
/// Every weight is scaled by [`MULTIPLIER`] so that bonuses stay integers.
/// Higher totals rank first.
pub mod score {
    pub const MULTIPLIER: i32 = 1000;

    pub const ROOT: i32 = 9 * MULTIPLIER;
    pub const SEGMENT: i32 = 4 * MULTIPLIER;
    pub const STATIC: i32 = 4 * MULTIPLIER;
    pub const DYNAMIC: i32 = 2 * MULTIPLIER;
    pub const BONUS_CUSTOM_REGEXP: i32 = MULTIPLIER;
    pub const BONUS_WILDCARD: i32 = -4 * MULTIPLIER - BONUS_CUSTOM_REGEXP;
    pub const BONUS_REPEATABLE: i32 = -2 * MULTIPLIER;
    pub const BONUS_OPTIONAL: i32 = -8 * MULTIPLIER / 10;
    pub const BONUS_STRICT: i32 = 7 * MULTIPLIER / 100;
    pub const BONUS_CASE_SENSITIVE: i32 = MULTIPLIER / 40;
}

const BASE_PARAM_PATTERN: &str = "[^/]+?";

/// Description of one param captured by a parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamKey {
    pub name: String,
    pub repeatable: bool,
    pub optional: bool,
}

/// A compiled path template
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::config::PathParserOptions;
/// use rhtmx_spa_router::route::PathParser;
/// use rhtmx_spa_router::location::ParamValue;
///
/// let parser = PathParser::new("/users/:id", &PathParserOptions::default()).unwrap();
/// let params = parser.parse("/users/42").unwrap();
/// assert_eq!(params["id"], ParamValue::from("42"));
/// assert_eq!(parser.stringify(&params).unwrap(), "/users/42");
/// ```
#[derive(Debug, Clone)]
pub struct PathParser {
    template: String,
    segments: Vec<PathSegment>,
    re: Regex,
    keys: Vec<ParamKey>,
    groups: Vec<String>,
    score: Vec<Vec<i32>>,
}

impl PathParser {
    /// Tokenizes and compiles `template`
    pub fn new(template: &str, options: &PathParserOptions) -> Result<Self, RouterError> {
        let segments = tokenize_path(template)?;
        Self::from_segments(template, segments, options)
    }

    /// Compiles already tokenized segments
    pub fn from_segments(
        template: &str,
        segments: Vec<PathSegment>,
        options: &PathParserOptions,
    ) -> Result<Self, RouterError> {
        let invalid = |reason: String| RouterError::InvalidPattern {
            pattern: template.to_string(),
            reason,
        };

        let mut pattern = String::from("^");
        let mut keys = Vec::new();
        let mut groups = Vec::new();
        let mut scores = Vec::with_capacity(segments.len());

        for segment in &segments {
            let mut segment_scores = if segment.is_empty() {
                vec![score::ROOT]
            } else {
                Vec::with_capacity(segment.len())
            };

            if options.strict && segment.is_empty() {
                pattern.push('/');
            }

            for (index, token) in segment.iter().enumerate() {
                let mut token_score = score::SEGMENT
                    + if options.sensitive { score::BONUS_CASE_SENSITIVE } else { 0 };

                match token {
                    PathToken::Static(value) => {
                        if index == 0 {
                            pattern.push('/');
                        }
                        pattern.push_str(&regex::escape(value));
                        token_score += score::STATIC;
                    }
                    PathToken::Param { name, regexp, repeatable, optional } => {
                        let re = regexp.as_deref().unwrap_or(BASE_PARAM_PATTERN);
                        if regexp.is_some() {
                            token_score += score::BONUS_CUSTOM_REGEXP;
                            Regex::new(&format!("^(?:{re})$")).map_err(|err| {
                                invalid(format!("invalid custom regex for param '{name}': {err}"))
                            })?;
                        }

                        let group = format!("__p{}", keys.len());
                        let body = if *repeatable {
                            format!("(?P<{group}>(?:{re})(?:/(?:{re}))*)")
                        } else {
                            format!("(?P<{group}>{re})")
                        };
                        let sub = if index == 0 {
                            if *optional && segment.len() < 2 {
                                format!("(?:/{body})")
                            } else {
                                format!("/{body}")
                            }
                        } else {
                            body
                        };
                        pattern.push_str(&sub);
                        if *optional {
                            pattern.push('?');
                        }

                        token_score += score::DYNAMIC;
                        if *optional {
                            token_score += score::BONUS_OPTIONAL;
                        }
                        if *repeatable {
                            token_score += score::BONUS_REPEATABLE;
                        }
                        if re == ".*" {
                            token_score += score::BONUS_WILDCARD;
                        }

                        keys.push(ParamKey {
                            name: name.clone(),
                            repeatable: *repeatable,
                            optional: *optional,
                        });
                        groups.push(group);
                    }
                }

                segment_scores.push(token_score);
            }

            scores.push(segment_scores);
        }

        // only the last token of a fully anchored strict template earns the bonus
        if options.strict && options.end {
            if let Some(last) = scores.last_mut().and_then(|s| s.last_mut()) {
                *last += score::BONUS_STRICT;
            }
        }

        if !options.strict {
            pattern.push_str("/?");
        }
        if options.end {
            pattern.push('$');
        } else if options.strict && !pattern.ends_with('/') {
            pattern.push_str("(?:/|$)");
        }

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(!options.sensitive)
            .build()
            .map_err(|err| invalid(err.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            segments,
            re,
            keys,
            groups,
            score: scores,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }

    pub fn score(&self) -> &[Vec<i32>] {
        &self.score
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.re.is_match(path)
    }

    /// Extracts decoded params from `path`, `None` when it doesn't match
    ///
    /// Repeatable params come back as [`ParamValue::List`], split on `/`.
    pub fn parse(&self, path: &str) -> Option<RouteParams> {
        let caps = self.re.captures(path)?;
        let mut params = RouteParams::with_capacity(self.keys.len());

        for (key, group) in self.keys.iter().zip(&self.groups) {
            let raw = caps.name(group).map(|m| m.as_str()).unwrap_or("");
            let value = if key.repeatable {
                if raw.is_empty() {
                    ParamValue::List(Vec::new())
                } else {
                    ParamValue::List(raw.split('/').map(|s| decode_param(s).into_owned()).collect())
                }
            } else {
                ParamValue::Single(decode_param(raw).into_owned())
            };
            params.insert(key.name.clone(), value);
        }

        Some(params)
    }

    /// Builds a path from params, percent-encoding each value
    ///
    /// An empty optional param alone in its segment drops the segment
    /// together with its slash. The empty result becomes `/`.
    ///
    /// # Errors
    ///
    /// - [`RouterError::MissingParam`] when a required param is absent or empty
    /// - [`RouterError::NotRepeatable`] when a list is given to a single param
    pub fn stringify(&self, params: &RouteParams) -> Result<String, RouterError> {
        let mut path = String::new();
        let mut avoid_duplicated_slash = false;

        for segment in &self.segments {
            if !avoid_duplicated_slash || !path.ends_with('/') {
                path.push('/');
            }
            avoid_duplicated_slash = false;

            for token in segment {
                match token {
                    PathToken::Static(value) => path.push_str(value),
                    PathToken::Param { name, repeatable, optional, .. } => {
                        let text = match params.get(name) {
                            None => String::new(),
                            Some(ParamValue::Single(value)) => encode_param(value).into_owned(),
                            Some(ParamValue::List(values)) => {
                                if !repeatable {
                                    return Err(RouterError::NotRepeatable {
                                        param: name.clone(),
                                        path: self.template.clone(),
                                    });
                                }
                                values
                                    .iter()
                                    .map(|v| encode_param(v))
                                    .collect::<Vec<_>>()
                                    .join("/")
                            }
                        };

                        if text.is_empty() {
                            if !optional {
                                return Err(RouterError::MissingParam {
                                    param: name.clone(),
                                    path: self.template.clone(),
                                });
                            }
                            if segment.len() < 2 {
                                if path.ends_with('/') {
                                    path.pop();
                                } else {
                                    avoid_duplicated_slash = true;
                                }
                            }
                        }
                        path.push_str(&text);
                    }
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

/// Compares the score arrays of one segment
fn compare_segment_scores(a: &[i32], b: &[i32]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match y.cmp(x) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    let lone_static = |s: &[i32]| s.len() == 1 && s[0] == score::STATIC + score::SEGMENT;
    match a.len().cmp(&b.len()) {
        Ordering::Less if lone_static(a) => Ordering::Less,
        Ordering::Less => Ordering::Greater,
        Ordering::Greater if lone_static(b) => Ordering::Greater,
        Ordering::Greater => Ordering::Less,
        Ordering::Equal => Ordering::Equal,
    }
}

fn is_last_score_negative(score: &[Vec<i32>]) -> bool {
    score
        .last()
        .and_then(|segment| segment.last())
        .is_some_and(|last| *last < 0)
}

/// Ranks two parsers: [`Ordering::Less`] means `a` is tried before `b`
///
/// Segments are compared pairwise. When one parser has exactly one more
/// segment and that trailing segment ends negative (optional or wildcard),
/// it ranks after the shorter one. Otherwise more segments rank first.
pub fn compare_score(a: &PathParser, b: &PathParser) -> Ordering {
    for (x, y) in a.score.iter().zip(&b.score) {
        match compare_segment_scores(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    if a.score.len().abs_diff(b.score.len()) == 1 {
        if is_last_score_negative(&a.score) {
            return Ordering::Greater;
        }
        if is_last_score_negative(&b.score) {
            return Ordering::Less;
        }
    }

    b.score.len().cmp(&a.score.len())
}
