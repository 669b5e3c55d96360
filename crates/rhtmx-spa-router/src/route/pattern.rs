/// Path template tokenizer
///
/// Turns a route template such as `/users/:id(\\d+)/files/:rest*` into
/// segments of typed tokens. Tokenizing is **pure**: same input, same output.

use std::collections::HashSet;

use crate::error::RouterError;

/// A single token of a path template
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::route::pattern::{tokenize_path, PathToken};
///
/// let segments = tokenize_path("/users/:id").unwrap();
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[0], vec![PathToken::Static("users".into())]);
/// assert!(matches!(&segments[1][0], PathToken::Param { name, .. } if name == "id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Literal text, already unescaped
    Static(String),
    /// Named parameter: `:name`, `:name(re)`, with `?`, `+` or `*`
    Param {
        name: String,
        /// Custom regex body from `:name(...)`, `None` means the default `[^/]+?`
        regexp: Option<String>,
        repeatable: bool,
        optional: bool,
    },
}

impl PathToken {
    pub fn is_param(&self) -> bool {
        matches!(self, PathToken::Param { .. })
    }
}

/// Tokens between two `/`
pub type PathSegment = Vec<PathToken>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Static,
    Param,
    ParamRegExp,
    ParamRegExpEnd,
    EscapeNext,
}

/// Accumulates tokens while walking the template
struct Tokenizer<'a> {
    template: &'a str,
    segments: Vec<PathSegment>,
    segment: PathSegment,
    buffer: String,
    custom_re: String,
    seen: HashSet<String>,
}

impl<'a> Tokenizer<'a> {
    fn new(template: &'a str) -> Self {
        Self {
            template,
            segments: Vec::new(),
            segment: Vec::new(),
            buffer: String::new(),
            custom_re: String::new(),
            seen: HashSet::new(),
        }
    }

    fn fail(&self, reason: impl Into<String>) -> RouterError {
        RouterError::InvalidPattern {
            pattern: self.template.to_string(),
            reason: reason.into(),
        }
    }

    /// Flushes the buffer as a static or param token. `modifier` is the
    /// character that ended the param, if any.
    fn consume(&mut self, state: State, modifier: Option<char>) -> Result<(), RouterError> {
        if self.buffer.is_empty() {
            if state == State::Param || state == State::ParamRegExpEnd {
                return Err(self.fail("a param needs a name after ':'"));
            }
            return Ok(());
        }

        let text = std::mem::take(&mut self.buffer);
        match state {
            State::Static => self.segment.push(PathToken::Static(text)),
            State::Param | State::ParamRegExp | State::ParamRegExpEnd => {
                let repeatable = matches!(modifier, Some('*') | Some('+'));
                let optional = matches!(modifier, Some('*') | Some('?'));
                if repeatable && !self.segment.is_empty() {
                    return Err(self.fail(format!(
                        "repeatable param '{text}' must be alone in its segment, e.g. '/:{text}+'"
                    )));
                }
                if !self.seen.insert(text.clone()) {
                    return Err(self.fail(format!("param '{text}' is declared twice")));
                }
                let custom = std::mem::take(&mut self.custom_re);
                self.segment.push(PathToken::Param {
                    name: text,
                    regexp: (!custom.is_empty()).then_some(custom),
                    repeatable,
                    optional,
                });
            }
            State::EscapeNext => return Err(self.fail("dangling escape")),
        }
        Ok(())
    }

    fn finish_segment(&mut self) {
        self.segments.push(std::mem::take(&mut self.segment));
    }
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_modifier(c: char) -> bool {
    matches!(c, '*' | '?' | '+')
}

/// Splits a template into segments of tokens
///
/// # Grammar
///
/// - `/` separates segments
/// - `:name` declares a param matching one segment
/// - `:name(re)` restricts the param with a custom regex (nested groups allowed)
/// - a trailing `?` makes it optional, `+` repeatable, `*` both
/// - `\` escapes the next character outside of a custom regex
///
/// The empty template yields one empty segment and `/` yields a single
/// empty static token, which is what makes the root rank highest.
///
/// # Errors
///
/// [`RouterError::InvalidPattern`] for a missing leading `/`, an unterminated
/// custom regex, a nameless or duplicated param, or a repeatable param that
/// shares its segment.
pub fn tokenize_path(template: &str) -> Result<Vec<PathSegment>, RouterError> {
    if template.is_empty() {
        return Ok(vec![Vec::new()]);
    }
    if template == "/" {
        return Ok(vec![vec![PathToken::Static(String::new())]]);
    }

    let mut tk = Tokenizer::new(template);
    if !template.starts_with('/') {
        return Err(tk.fail(format!("route paths must start with '/', try '/{template}'")));
    }

    let chars: Vec<char> = template.chars().collect();
    let mut state = State::Static;
    let mut previous = State::Static;
    let mut depth = 0usize;
    // the leading '/' opens the first segment
    let mut i = 1;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if c == '\\' && state != State::ParamRegExp {
            previous = state;
            state = State::EscapeNext;
            continue;
        }

        match state {
            State::Static => match c {
                '/' => {
                    tk.consume(state, None)?;
                    tk.finish_segment();
                }
                ':' => {
                    tk.consume(state, None)?;
                    state = State::Param;
                }
                _ => tk.buffer.push(c),
            },
            State::EscapeNext => {
                tk.buffer.push(c);
                state = previous;
            }
            State::Param => {
                if c == '(' {
                    state = State::ParamRegExp;
                } else if is_param_char(c) {
                    tk.buffer.push(c);
                } else {
                    let modifier = is_modifier(c).then_some(c);
                    tk.consume(state, modifier)?;
                    state = State::Static;
                    if modifier.is_none() {
                        i -= 1;
                    }
                }
            }
            State::ParamRegExp => match c {
                '\\' if i < chars.len() => {
                    tk.custom_re.push(c);
                    tk.custom_re.push(chars[i]);
                    i += 1;
                }
                '(' => {
                    depth += 1;
                    tk.custom_re.push(c);
                }
                ')' if depth > 0 => {
                    depth -= 1;
                    tk.custom_re.push(c);
                }
                ')' => state = State::ParamRegExpEnd,
                _ => tk.custom_re.push(c),
            },
            State::ParamRegExpEnd => {
                let modifier = is_modifier(c).then_some(c);
                tk.consume(state, modifier)?;
                state = State::Static;
                if modifier.is_none() {
                    i -= 1;
                }
            }
        }
    }

    match state {
        State::ParamRegExp => {
            let name = tk.buffer.clone();
            return Err(tk.fail(format!("unfinished custom regex for param '{name}'")));
        }
        State::EscapeNext => return Err(tk.fail("template ends with an escape")),
        // modifiers are consumed inside the loop, so none is pending here
        _ => tk.consume(state, None)?,
    }
    tk.finish_segment();

    Ok(tk.segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn param(name: &str, regexp: Option<&str>, repeatable: bool, optional: bool) -> PathToken {
        PathToken::Param {
            name: name.to_string(),
            regexp: regexp.map(String::from),
            repeatable,
            optional,
        }
    }

    #[test]
    fn test_root_and_empty() {
        assert_eq!(tokenize_path("").unwrap(), vec![Vec::<PathToken>::new()]);
        assert_eq!(
            tokenize_path("/").unwrap(),
            vec![vec![PathToken::Static(String::new())]]
        );
    }

    #[test]
    fn test_static_segments() {
        assert_eq!(
            tokenize_path("/users/new").unwrap(),
            vec![
                vec![PathToken::Static("users".into())],
                vec![PathToken::Static("new".into())],
            ]
        );
    }

    #[test]
    fn test_params_and_modifiers() {
        let segments = tokenize_path("/:a/:b?/:c+/:d*").unwrap();
        assert_eq!(
            segments,
            vec![
                vec![param("a", None, false, false)],
                vec![param("b", None, false, true)],
                vec![param("c", None, true, false)],
                vec![param("d", None, true, true)],
            ]
        );
    }

    #[test]
    fn test_custom_regex() {
        let segments = tokenize_path(r"/users/:id(\d+)").unwrap();
        assert_eq!(segments[1], vec![param("id", Some(r"\d+"), false, false)]);

        let segments = tokenize_path("/:path(.*)*").unwrap();
        assert_eq!(segments[0], vec![param("path", Some(".*"), true, true)]);
    }

    #[test]
    fn test_nested_groups_in_custom_regex() {
        let segments = tokenize_path("/:lang(en(-us)?|fr)").unwrap();
        assert_eq!(segments[0], vec![param("lang", Some("en(-us)?|fr"), false, false)]);
    }

    #[test]
    fn test_mixed_segment() {
        let segments = tokenize_path("/file-:name.:ext").unwrap();
        assert_eq!(
            segments[0],
            vec![
                PathToken::Static("file-".into()),
                param("name", None, false, false),
                PathToken::Static(".".into()),
                param("ext", None, false, false),
            ]
        );
    }

    #[test]
    fn test_escapes() {
        let segments = tokenize_path(r"/a\:b").unwrap();
        assert_eq!(segments[0], vec![PathToken::Static("a:b".into())]);
    }

    #[test]
    fn test_trailing_slash_adds_empty_segment() {
        let segments = tokenize_path("/users/").unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[1].is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(tokenize_path("users").is_err());
        assert!(tokenize_path("/:id(\\d+").is_err());
        assert!(tokenize_path("/:/x").is_err());
        assert!(tokenize_path("/:id/:id").is_err());
        assert!(tokenize_path("/a-:ids+").is_err());
    }
}
