/// Route matcher
///
/// Owns the record tree and the ranked list used for path matching.
///
/// Records live in an arena keyed by [`RecordId`]; parent, children and alias
/// links are ids. The ranked list holds every matchable record ordered by
/// score, so resolving a path is a linear scan that stops at the first
/// regex hit.
///
/// Adding a route happens in two phases: every record of the declaration
/// (children and aliases included) is compiled and validated first, then
/// the whole batch is linked into the tree. A declaration that fails
/// validation leaves the matcher untouched.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::PathParserOptions;
use crate::error::RouterError;
use crate::location::{MatchedLocation, RouteLocation, RouteParams};
use crate::record::{RecordId, RecordParts, RecordState, RouteRecord, RouteRecordRaw};
use crate::route::{compare_score, PathParser};

/// A record plus everything the matcher needs to match and link it
pub struct RouteRecordMatcher {
    record: Arc<RouteRecord>,
    parser: PathParser,
    parent: Option<RecordId>,
    children: Vec<RecordId>,
    aliases: Vec<RecordId>,
    /// Declaration this record came from, kept to re-home children when a
    /// same-named record replaces their parent
    raw: RouteRecordRaw,
}

impl RouteRecordMatcher {
    pub fn record(&self) -> &Arc<RouteRecord> {
        &self.record
    }

    pub fn parser(&self) -> &PathParser {
        &self.parser
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.parent
    }

    pub fn children(&self) -> &[RecordId] {
        &self.children
    }

    pub fn aliases(&self) -> &[RecordId] {
        &self.aliases
    }
}

/// Reference to a record for lookups and removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRef {
    Name(String),
    Id(RecordId),
}

impl From<&str> for RouteRef {
    fn from(name: &str) -> Self {
        RouteRef::Name(name.to_string())
    }
}

impl From<String> for RouteRef {
    fn from(name: String) -> Self {
        RouteRef::Name(name)
    }
}

impl From<RecordId> for RouteRef {
    fn from(id: RecordId) -> Self {
        RouteRef::Id(id)
    }
}

/// Target handed to [`RouterMatcher::resolve`]
#[derive(Debug, Clone, Copy)]
pub enum MatcherLocation<'a> {
    /// Absolute, already decoded from any query or hash
    Path(&'a str),
    Named { name: &'a str, params: &'a RouteParams },
    /// Keep the current record, merge params over the current ones
    Relative { params: &'a RouteParams },
}

/// Records compiled by one `add_route` call, linked only on success
#[derive(Default)]
struct Batch {
    matchers: Vec<RouteRecordMatcher>,
    /// Declared children per built record, in declaration order
    children: HashMap<RecordId, Vec<RecordId>>,
    names: HashSet<String>,
}

impl Batch {
    fn get(&self, id: RecordId) -> Option<&RouteRecordMatcher> {
        self.matchers.iter().find(|m| m.record.id() == id)
    }
}

/// The record tree and its ranked match list
pub struct RouterMatcher {
    options: PathParserOptions,
    nodes: HashMap<RecordId, RouteRecordMatcher>,
    ranked: Vec<RecordId>,
    by_name: HashMap<String, RecordId>,
}

impl RouterMatcher {
    pub fn new(options: PathParserOptions) -> Self {
        Self {
            options,
            nodes: HashMap::new(),
            ranked: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Adds a declaration with its children and aliases
    ///
    /// A record named like an existing one replaces it; the replaced
    /// record's declared children are re-added under the new record unless
    /// the new declaration brings children with the same names.
    ///
    /// Returns the id of the new record.
    ///
    /// # Errors
    ///
    /// - [`RouterError::UnknownParent`] when `parent` is not in the tree
    /// - [`RouterError::InvalidPattern`] for a bad template
    /// - [`RouterError::AliasParamMismatch`] when an alias and its original
    ///   declare different params
    /// - [`RouterError::Config`] for a name used twice in one declaration, or
    ///   a record that would replace one of its own ancestors
    pub fn add_route(&mut self, raw: RouteRecordRaw, parent: Option<RecordId>) -> Result<RecordId, RouterError> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(RouterError::UnknownParent(parent.to_string()));
            }
        }

        let mut batch = Batch::default();
        let id = self.build(&raw, parent, None, &mut batch)?;

        // records whose name is taken over by this batch
        let mut displaced: Vec<(RecordId, RecordId)> = Vec::new();
        for matcher in batch.matchers.iter().filter(|m| !m.record.is_alias()) {
            let Some(name) = matcher.record.name.as_deref() else { continue };
            let Some(&existing) = self.by_name.get(name) else { continue };
            if self.is_ancestor_or_self(existing, parent) {
                return Err(RouterError::Config(format!(
                    "route {name:?} cannot replace one of its own ancestors"
                )));
            }
            displaced.push((existing, matcher.record.id()));
        }

        // children of displaced records are rebuilt under their replacement
        // before anything is removed, so a child that no longer compiles
        // fails the whole call
        let mut orphans = Vec::new();
        for (existing, replacement) in &displaced {
            let Some(old) = self.nodes.get(existing) else { continue };
            debug!(name = ?old.record.name, path = %old.record.path, "replacing route with the same name");
            orphans.extend(
                old.children
                    .iter()
                    .filter_map(|child| self.nodes.get(child))
                    .map(|child| (child.raw.clone(), *replacement)),
            );
        }
        for (child, new_parent) in orphans {
            if let Some(name) = child.name.as_deref() {
                if batch.names.contains(name) {
                    debug!(name, "child of replaced route already declared by its replacement");
                    continue;
                }
            }
            self.build(&child, Some(new_parent), None, &mut batch)?;
        }

        for (existing, _) in displaced {
            self.remove_subtree(existing);
        }
        self.apply(batch);

        Ok(id)
    }

    /// Compiles `raw` and its aliases and children into `batch`
    ///
    /// `original` is set when `raw` is a child of an alias: every record
    /// built from it is then an alias of that original child.
    fn build(
        &self,
        raw: &RouteRecordRaw,
        parent: Option<RecordId>,
        original: Option<RecordId>,
        batch: &mut Batch,
    ) -> Result<RecordId, RouterError> {
        let options = raw.parser_options(&self.options);
        let parent_node = parent.and_then(|id| batch.get(id).or_else(|| self.nodes.get(&id)));
        let parent_path = parent_node.map(|p| p.record.path.clone());
        let parent_meta = parent_node.map(|p| p.record.meta.clone()).unwrap_or_default();
        let parent_keys: Vec<String> = parent_node
            .map(|p| p.parser.keys().iter().map(|k| k.name.clone()).collect())
            .unwrap_or_default();

        if original.is_none() && raw.name.is_none() && raw.path.is_empty() {
            if let Some(parent_name) = parent_node.and_then(|p| p.record.name.as_deref()) {
                warn!(
                    parent = parent_name,
                    "named route has an unnamed empty-path child; navigating by the parent's name will not render it"
                );
            }
        }

        if let Some(name) = raw.name.as_deref() {
            if original.is_none() && !batch.names.insert(name.to_string()) {
                return Err(RouterError::Config(format!(
                    "route name {name:?} is used twice in the same declaration"
                )));
            }
        }

        let mut meta = parent_meta;
        meta.extend(raw.meta.iter().map(|(k, v)| (k.clone(), v.clone())));

        let templates = std::iter::once(raw.path.as_str()).chain(raw.alias.iter().map(String::as_str));
        let mut main: Option<RecordId> = None;

        for (index, template) in templates.enumerate() {
            let path = join_paths(parent_path.as_deref(), template);
            let parser = PathParser::new(&path, &options)?;

            if parent_path.is_some() && template.starts_with('/') {
                warn_missing_parent_params(&path, &parser, &parent_keys);
            }

            // the record this one mirrors, if any
            let alias_of = if index == 0 { original } else { original.or(main) };
            let source = alias_of.and_then(|id| batch.get(id).or_else(|| self.nodes.get(&id)));
            if let Some(source) = source {
                check_same_params(source, &path, &parser)?;
            }
            let state = source
                .map(|s| s.record.state().clone())
                .unwrap_or_else(|| Arc::new(RecordState::default()));

            let id = RecordId::next();
            let record = RouteRecord::from_raw(
                raw,
                RecordParts {
                    id,
                    alias_of,
                    path,
                    meta: meta.clone(),
                    state,
                },
            );
            batch.matchers.push(RouteRecordMatcher {
                record: Arc::new(record),
                parser,
                parent,
                children: Vec::new(),
                aliases: Vec::new(),
                raw: raw.clone(),
            });
            if index == 0 {
                main = Some(id);
            }

            // children of an alias mirror the children of its original
            let mirrored: Vec<RecordId> = alias_of
                .and_then(|source| batch.children.get(&source).cloned())
                .unwrap_or_default();
            for (position, child) in raw.children.iter().enumerate() {
                let child_original = if alias_of.is_some() {
                    mirrored.get(position).copied()
                } else {
                    None
                };
                let child_id = self.build(child, Some(id), child_original, batch)?;
                batch.children.entry(id).or_default().push(child_id);
            }
        }

        main.ok_or_else(|| RouterError::Config(format!("route {:?} produced no record", raw.path)))
    }

    /// Links a validated batch into the tree, parents before children
    fn apply(&mut self, batch: Batch) {
        for matcher in batch.matchers {
            let id = matcher.record.id();
            let is_alias = matcher.record.is_alias();

            if let Some(parent) = matcher.parent.and_then(|p| self.nodes.get_mut(&p)) {
                // alias children hang off aliases, originals off originals
                if parent.record.is_alias() == is_alias {
                    parent.children.push(id);
                }
            }
            if let Some(original) = matcher.record.alias_of().and_then(|o| self.nodes.get_mut(&o)) {
                original.aliases.push(id);
            }
            if let (Some(name), false) = (matcher.record.name.clone(), is_alias) {
                self.by_name.insert(name, id);
            }

            let matchable = matcher.record.is_matchable();
            debug!(path = %matcher.record.path, id = %id, alias = is_alias, "route added");
            self.nodes.insert(id, matcher);
            if matchable {
                let index = self.insertion_index(id);
                self.ranked.insert(index, id);
            }
        }
    }

    /// Position in the ranked list: after every record that ranks at least
    /// as high, and before a matchable ancestor with an equal score
    fn insertion_index(&self, id: RecordId) -> usize {
        let Some(node) = self.nodes.get(&id) else {
            return self.ranked.len();
        };

        let (mut lower, mut upper) = (0, self.ranked.len());
        while lower < upper {
            let mid = (lower + upper) / 2;
            let ranks_before = self
                .nodes
                .get(&self.ranked[mid])
                .map(|other| compare_score(&node.parser, &other.parser) == Ordering::Less)
                .unwrap_or(false);
            if ranks_before {
                upper = mid;
            } else {
                lower = mid + 1;
            }
        }

        if let Some(ancestor) = self.insertion_ancestor(node) {
            if let Some(position) = self.ranked[..upper].iter().rposition(|r| *r == ancestor) {
                upper = position;
            }
        }
        upper
    }

    /// Closest matchable ancestor with exactly the same score
    fn insertion_ancestor(&self, node: &RouteRecordMatcher) -> Option<RecordId> {
        let mut current = node.parent;
        while let Some(id) = current {
            let ancestor = self.nodes.get(&id)?;
            if ancestor.record.is_matchable()
                && compare_score(&node.parser, &ancestor.parser) == Ordering::Equal
            {
                return Some(id);
            }
            current = ancestor.parent;
        }
        None
    }

    fn is_ancestor_or_self(&self, candidate: RecordId, node: Option<RecordId>) -> bool {
        let mut current = node;
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Removes a record with its children and aliases
    ///
    /// Returns `false` when nothing matched the reference.
    pub fn remove_route(&mut self, target: impl Into<RouteRef>) -> bool {
        let id = match target.into() {
            RouteRef::Name(name) => self.by_name.get(&name).copied(),
            RouteRef::Id(id) => self.nodes.contains_key(&id).then_some(id),
        };
        match id {
            Some(id) => {
                self.remove_subtree(id);
                true
            }
            None => false,
        }
    }

    fn remove_subtree(&mut self, id: RecordId) {
        let Some(node) = self.nodes.remove(&id) else { return };

        self.ranked.retain(|r| *r != id);
        if let Some(name) = node.record.name.as_deref() {
            if self.by_name.get(name) == Some(&id) {
                self.by_name.remove(name);
            }
        }
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        if let Some(original) = node.record.alias_of().and_then(|o| self.nodes.get_mut(&o)) {
            original.aliases.retain(|a| *a != id);
        }
        debug!(path = %node.record.path, id = %id, "route removed");

        for child in node.children.iter().chain(&node.aliases) {
            self.remove_subtree(*child);
        }
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get_record_matcher(&self, target: impl Into<RouteRef>) -> Option<&RouteRecordMatcher> {
        match target.into() {
            RouteRef::Name(name) => self.by_name.get(&name).and_then(|id| self.nodes.get(id)),
            RouteRef::Id(id) => self.nodes.get(&id),
        }
    }

    /// Matchable records in match order
    pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
        self.ranked
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|m| m.record.clone())
            .collect()
    }

    pub fn clear_routes(&mut self) {
        self.nodes.clear();
        self.ranked.clear();
        self.by_name.clear();
    }

    /// Resolves a target against the current location
    ///
    /// # Errors
    ///
    /// - [`RouterError::MatcherNotFound`] for an unknown name or a path
    ///   that no record matches
    /// - [`RouterError::MissingParam`] / [`RouterError::NotRepeatable`] when
    ///   the params cannot build the record's path
    pub fn resolve(&self, location: MatcherLocation<'_>, current: &RouteLocation) -> Result<MatchedLocation, RouterError> {
        let (matcher, path, params) = match location {
            MatcherLocation::Named { name, params } => {
                let matcher = self
                    .by_name
                    .get(name)
                    .and_then(|id| self.nodes.get(id))
                    .ok_or_else(|| RouterError::not_found(format!("name {name:?}")))?;

                let keys = matcher.parser.keys();
                let discarded: Vec<&str> = params
                    .keys()
                    .filter(|k| !keys.iter().any(|key| &key.name == *k))
                    .map(String::as_str)
                    .collect();
                if !discarded.is_empty() {
                    warn!(route = name, params = ?discarded, "discarding params the route does not declare");
                }

                // current params carry over for required keys of the target
                // and optional keys of its parent
                let parent_optional: Vec<&str> = matcher
                    .parent
                    .and_then(|p| self.nodes.get(&p))
                    .map(|p| {
                        p.parser
                            .keys()
                            .iter()
                            .filter(|k| k.optional)
                            .map(|k| k.name.as_str())
                            .collect()
                    })
                    .unwrap_or_default();

                let mut merged = RouteParams::new();
                for key in keys {
                    let inherited = !key.optional || parent_optional.contains(&key.name.as_str());
                    if inherited {
                        if let Some(value) = current.params.get(&key.name) {
                            merged.insert(key.name.clone(), value.clone());
                        }
                    }
                }
                for key in keys {
                    if let Some(value) = params.get(&key.name) {
                        merged.insert(key.name.clone(), value.clone());
                    }
                }

                let path = matcher.parser.stringify(&merged)?;
                (matcher, path, merged)
            }
            MatcherLocation::Path(path) => {
                let matcher = self
                    .ranked
                    .iter()
                    .filter_map(|id| self.nodes.get(id))
                    .find(|m| m.parser.is_match(path))
                    .ok_or_else(|| RouterError::not_found(format!("path {path:?}")))?;
                let params = matcher.parser.parse(path).unwrap_or_default();
                (matcher, path.to_string(), params)
            }
            MatcherLocation::Relative { params } => {
                let matcher = match current.name.as_deref() {
                    Some(name) => self.by_name.get(name).and_then(|id| self.nodes.get(id)),
                    None => self
                        .ranked
                        .iter()
                        .filter_map(|id| self.nodes.get(id))
                        .find(|m| m.parser.is_match(&current.path)),
                }
                .ok_or_else(|| RouterError::not_found(format!("current location {:?}", current.path)))?;

                let mut merged = current.params.clone();
                merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
                let path = matcher.parser.stringify(&merged)?;
                (matcher, path, merged)
            }
        };

        let mut matched = Vec::new();
        let mut cursor = Some(matcher);
        while let Some(node) = cursor {
            matched.push(node.record.clone());
            cursor = node.parent.and_then(|p| self.nodes.get(&p));
        }
        matched.reverse();

        Ok(MatchedLocation {
            name: matcher.record.name.clone(),
            path,
            params,
            meta: matcher.record.meta.clone(),
            matched,
        })
    }
}

/// Appends a relative template to its parent's path
fn join_paths(parent: Option<&str>, template: &str) -> String {
    match parent {
        Some(parent) if !template.starts_with('/') => {
            if template.is_empty() {
                parent.to_string()
            } else if parent.ends_with('/') {
                format!("{parent}{template}")
            } else {
                format!("{parent}/{template}")
            }
        }
        _ => template.to_string(),
    }
}

fn param_names(parser: &PathParser) -> Vec<String> {
    let mut names: Vec<String> = parser.keys().iter().map(|k| k.name.clone()).collect();
    names.sort();
    names
}

/// An alias must capture exactly the params of the record it mirrors
fn check_same_params(original: &RouteRecordMatcher, alias_path: &str, alias: &PathParser) -> Result<(), RouterError> {
    let original_params = param_names(&original.parser);
    let alias_params = param_names(alias);
    if original_params != alias_params {
        return Err(RouterError::AliasParamMismatch {
            original: original.record.path.clone(),
            alias: alias_path.to_string(),
            original_params,
            alias_params,
        });
    }
    Ok(())
}

fn warn_missing_parent_params(path: &str, parser: &PathParser, parent_keys: &[String]) {
    let missing: Vec<&str> = parent_keys
        .iter()
        .filter(|name| !parser.keys().iter().any(|k| &&k.name == name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        warn!(path, params = ?missing, "absolute child path does not declare its parent's params");
    }
}

impl Default for RouterMatcher {
    fn default() -> Self {
        Self::new(PathParserOptions::default())
    }
}
