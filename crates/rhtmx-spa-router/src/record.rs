/// Route records
///
/// [`RouteRecordRaw`] is the declaration an application writes.
/// [`RouteRecord`] is the normalized, immutable record the matcher builds
/// from it. Mutable per-record state (mounted instances, queued enter
/// callbacks, in-view leave/update guards) lives in a shared
/// [`RecordState`] so that an alias and its original see the same state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PathParserOptions;
use crate::guards::{BoxedGuard, EnterCallback, HookId, HookRegistry, InstanceHandle};
use crate::location::{RouteLocation, RouteLocationRaw, RouteMeta};

/// View name used when a record declares a single component
pub const DEFAULT_VIEW: &str = "default";

/// Unique id of a record inside a matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

impl RecordId {
    pub(crate) fn next() -> Self {
        RecordId(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A view component as the router sees it: a name plus optional in-component guards
#[derive(Clone)]
pub struct RouteComponent {
    name: String,
    before_route_enter: Option<BoxedGuard>,
    before_route_update: Option<BoxedGuard>,
    before_route_leave: Option<BoxedGuard>,
}

impl RouteComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before_route_enter: None,
            before_route_update: None,
            before_route_leave: None,
        }
    }

    /// Guard run before the view is created; it may return
    /// [`GuardResult::OnMount`](crate::guards::GuardResult::OnMount)
    pub fn with_before_route_enter(mut self, guard: BoxedGuard) -> Self {
        self.before_route_enter = Some(guard);
        self
    }

    /// Guard run when the view is reused with different params
    pub fn with_before_route_update(mut self, guard: BoxedGuard) -> Self {
        self.before_route_update = Some(guard);
        self
    }

    /// Guard run before the view is left
    pub fn with_before_route_leave(mut self, guard: BoxedGuard) -> Self {
        self.before_route_leave = Some(guard);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn before_route_enter(&self) -> Option<&BoxedGuard> {
        self.before_route_enter.as_ref()
    }

    pub(crate) fn before_route_update(&self) -> Option<&BoxedGuard> {
        self.before_route_update.as_ref()
    }

    pub(crate) fn before_route_leave(&self) -> Option<&BoxedGuard> {
        self.before_route_leave.as_ref()
    }
}

impl fmt::Debug for RouteComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteComponent")
            .field("name", &self.name)
            .field("before_route_enter", &self.before_route_enter.is_some())
            .field("before_route_update", &self.before_route_update.is_some())
            .field("before_route_leave", &self.before_route_leave.is_some())
            .finish()
    }
}

pub type RedirectFn = Arc<dyn Fn(&RouteLocation) -> RouteLocationRaw + Send + Sync>;

/// Where a record sends navigations that land on it
#[derive(Clone)]
pub enum RouteRedirect {
    To(RouteLocationRaw),
    /// Computed from the location being redirected
    Dynamic(RedirectFn),
}

impl RouteRedirect {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&RouteLocation) -> RouteLocationRaw + Send + Sync + 'static,
    {
        RouteRedirect::Dynamic(Arc::new(f))
    }

    pub(crate) fn target_for(&self, to: &RouteLocation) -> RouteLocationRaw {
        match self {
            RouteRedirect::To(target) => target.clone(),
            RouteRedirect::Dynamic(f) => f(to),
        }
    }
}

impl fmt::Debug for RouteRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteRedirect::To(target) => f.debug_tuple("To").field(target).finish(),
            RouteRedirect::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for RouteRedirect {
    fn from(path: &str) -> Self {
        RouteRedirect::To(path.into())
    }
}

impl From<RouteLocationRaw> for RouteRedirect {
    fn from(target: RouteLocationRaw) -> Self {
        RouteRedirect::To(target)
    }
}

/// A route declaration
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::record::{RouteComponent, RouteRecordRaw};
///
/// let users = RouteRecordRaw::new("/users")
///     .with_component(RouteComponent::new("UsersLayout"))
///     .with_child(
///         RouteRecordRaw::new(":id")
///             .with_name("user")
///             .with_component(RouteComponent::new("UserPage"))
///             .with_alias("/u/:id"),
///     )
///     .with_meta("requires_auth", true);
/// assert_eq!(users.children.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RouteRecordRaw {
    /// Template; relative children are appended to their parent's path
    pub path: String,
    pub name: Option<String>,
    /// Components by view name
    pub components: BTreeMap<String, Arc<RouteComponent>>,
    pub children: Vec<RouteRecordRaw>,
    pub redirect: Option<RouteRedirect>,
    /// Extra templates matching the same record
    pub alias: Vec<String>,
    pub before_enter: Vec<BoxedGuard>,
    pub meta: RouteMeta,
    /// Overrides of the router-wide parser options
    pub sensitive: Option<bool>,
    pub strict: Option<bool>,
    pub end: Option<bool>,
}

impl RouteRecordRaw {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the component of the default view
    pub fn with_component(self, component: RouteComponent) -> Self {
        self.with_named_view(DEFAULT_VIEW, component)
    }

    pub fn with_named_view(mut self, view: impl Into<String>, component: RouteComponent) -> Self {
        self.components.insert(view.into(), Arc::new(component));
        self
    }

    pub fn with_child(mut self, child: RouteRecordRaw) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = RouteRecordRaw>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_redirect(mut self, redirect: impl Into<RouteRedirect>) -> Self {
        self.redirect = Some(redirect.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias.push(alias.into());
        self
    }

    pub fn with_before_enter(mut self, guard: BoxedGuard) -> Self {
        self.before_enter.push(guard);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = Some(sensitive);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn with_end(mut self, end: bool) -> Self {
        self.end = Some(end);
        self
    }

    pub(crate) fn parser_options(&self, defaults: &PathParserOptions) -> PathParserOptions {
        PathParserOptions {
            sensitive: self.sensitive.unwrap_or(defaults.sensitive),
            strict: self.strict.unwrap_or(defaults.strict),
            end: self.end.unwrap_or(defaults.end),
        }
    }
}

impl fmt::Debug for RouteRecordRaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRecordRaw")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("children", &self.children)
            .field("redirect", &self.redirect)
            .field("alias", &self.alias)
            .field("before_enter", &self.before_enter.len())
            .field("meta", &self.meta)
            .finish()
    }
}

/// Runtime state shared by a record and its aliases
#[derive(Default)]
pub struct RecordState {
    instances: Mutex<HashMap<String, InstanceHandle>>,
    enter_callbacks: Mutex<HashMap<String, Vec<EnterCallback>>>,
    leave_guards: HookRegistry<BoxedGuard>,
    update_guards: HookRegistry<BoxedGuard>,
}

/// A normalized route record
pub struct RouteRecord {
    id: RecordId,
    alias_of: Option<RecordId>,
    /// Full template, parent paths included
    pub path: String,
    pub name: Option<String>,
    pub components: BTreeMap<String, Arc<RouteComponent>>,
    pub redirect: Option<RouteRedirect>,
    /// Meta merged from the root down to this record
    pub meta: RouteMeta,
    pub before_enter: Vec<BoxedGuard>,
    /// Alias templates as declared
    pub aliases: Vec<String>,
    state: Arc<RecordState>,
}

pub(crate) struct RecordParts {
    pub id: RecordId,
    pub alias_of: Option<RecordId>,
    pub path: String,
    pub meta: RouteMeta,
    pub state: Arc<RecordState>,
}

impl RouteRecord {
    pub(crate) fn from_raw(raw: &RouteRecordRaw, parts: RecordParts) -> Self {
        Self {
            id: parts.id,
            alias_of: parts.alias_of,
            path: parts.path,
            name: raw.name.clone(),
            components: raw.components.clone(),
            redirect: raw.redirect.clone(),
            meta: parts.meta,
            before_enter: raw.before_enter.clone(),
            aliases: raw.alias.clone(),
            state: parts.state,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// The original record when this one was created from an alias
    pub fn alias_of(&self) -> Option<RecordId> {
        self.alias_of
    }

    pub fn is_alias(&self) -> bool {
        self.alias_of.is_some()
    }

    pub fn original_id(&self) -> RecordId {
        self.alias_of.unwrap_or(self.id)
    }

    /// Identity that treats an alias and its original as the same record
    pub fn is_same_record(&self, other: &RouteRecord) -> bool {
        self.original_id() == other.original_id()
    }

    /// Records without components, name or redirect only group children
    pub fn is_matchable(&self) -> bool {
        !self.components.is_empty() || self.name.is_some() || self.redirect.is_some()
    }

    pub(crate) fn state(&self) -> &Arc<RecordState> {
        &self.state
    }

    /// Registers a mounted view instance and flushes the callbacks its
    /// enter guard queued
    pub fn mount_instance(&self, view: &str, handle: InstanceHandle) {
        self.state.instances.lock().insert(view.to_string(), handle);
        let callbacks = self.state.enter_callbacks.lock().remove(view).unwrap_or_default();
        for callback in callbacks {
            callback(handle);
        }
    }

    pub fn unmount_instance(&self, view: &str) -> Option<InstanceHandle> {
        self.state.instances.lock().remove(view)
    }

    pub fn instance(&self, view: &str) -> Option<InstanceHandle> {
        self.state.instances.lock().get(view).copied()
    }

    pub fn pending_enter_callbacks(&self, view: &str) -> usize {
        self.state.enter_callbacks.lock().get(view).map_or(0, Vec::len)
    }

    /// Adds a leave guard for as long as the view stays mounted
    pub fn add_leave_guard(&self, guard: BoxedGuard) -> HookId {
        self.state.leave_guards.add(guard)
    }

    pub fn remove_leave_guard(&self, id: HookId) -> bool {
        self.state.leave_guards.remove(id)
    }

    /// Adds an update guard for as long as the view stays mounted
    pub fn add_update_guard(&self, guard: BoxedGuard) -> HookId {
        self.state.update_guards.add(guard)
    }

    pub fn remove_update_guard(&self, id: HookId) -> bool {
        self.state.update_guards.remove(id)
    }

    pub(crate) fn leave_guards(&self) -> Vec<BoxedGuard> {
        self.state.leave_guards.snapshot()
    }

    pub(crate) fn update_guards(&self) -> Vec<BoxedGuard> {
        self.state.update_guards.snapshot()
    }

    pub(crate) fn queue_enter_callback(&self, view: &str, callback: EnterCallback) {
        self.state
            .enter_callbacks
            .lock()
            .entry(view.to_string())
            .or_default()
            .push(callback);
    }

    pub(crate) fn clear_enter_callbacks(&self) {
        self.state.enter_callbacks.lock().clear();
    }

    /// Drops instances, queued callbacks and in-view guards once the record is left
    pub(crate) fn reset(&self) {
        self.state.instances.lock().clear();
        self.state.enter_callbacks.lock().clear();
        self.state.leave_guards.clear();
        self.state.update_guards.clear();
    }
}

impl fmt::Debug for RouteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRecord")
            .field("id", &self.id)
            .field("alias_of", &self.alias_of)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("redirect", &self.redirect)
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::guard_fn;
    use std::sync::atomic::AtomicUsize;

    fn record(raw: &RouteRecordRaw, alias_of: Option<RecordId>, state: Arc<RecordState>) -> RouteRecord {
        RouteRecord::from_raw(
            raw,
            RecordParts {
                id: RecordId::next(),
                alias_of,
                path: raw.path.clone(),
                meta: raw.meta.clone(),
                state,
            },
        )
    }

    #[test]
    fn test_alias_identity_and_shared_state() {
        let raw = RouteRecordRaw::new("/users").with_component(RouteComponent::new("Users"));
        let state = Arc::new(RecordState::default());
        let original = record(&raw, None, state.clone());
        let alias = record(&raw, Some(original.id()), state);

        assert!(alias.is_same_record(&original));
        alias.mount_instance(DEFAULT_VIEW, InstanceHandle(1));
        assert_eq!(original.instance(DEFAULT_VIEW), Some(InstanceHandle(1)));
    }

    #[test]
    fn test_matchable() {
        let state = Arc::new(RecordState::default());
        assert!(!record(&RouteRecordRaw::new("/group"), None, state.clone()).is_matchable());
        assert!(record(&RouteRecordRaw::new("/n").with_name("n"), None, state.clone()).is_matchable());
        assert!(record(&RouteRecordRaw::new("/r").with_redirect("/"), None, state).is_matchable());
    }

    #[test]
    fn test_mount_flushes_enter_callbacks() {
        let raw = RouteRecordRaw::new("/a").with_component(RouteComponent::new("A"));
        let rec = record(&raw, None, Arc::new(RecordState::default()));
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        rec.queue_enter_callback(
            DEFAULT_VIEW,
            Box::new(move |handle| {
                counter.store(handle.0 as usize, Ordering::SeqCst);
            }),
        );
        assert_eq!(rec.pending_enter_callbacks(DEFAULT_VIEW), 1);

        rec.mount_instance(DEFAULT_VIEW, InstanceHandle(7));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(rec.pending_enter_callbacks(DEFAULT_VIEW), 0);
    }

    #[test]
    fn test_reset_clears_in_view_guards() {
        let raw = RouteRecordRaw::new("/a");
        let rec = record(&raw, None, Arc::new(RecordState::default()));
        let id = rec.add_leave_guard(guard_fn(|_, _| async { Ok(true) }));
        rec.add_update_guard(guard_fn(|_, _| async { Ok(()) }));
        assert_eq!(rec.leave_guards().len(), 1);

        rec.reset();
        assert!(rec.leave_guards().is_empty());
        assert!(rec.update_guards().is_empty());
        assert!(!rec.remove_leave_guard(id));
    }

    #[test]
    fn test_parser_options_override() {
        let defaults = PathParserOptions::default();
        let raw = RouteRecordRaw::new("/a").with_strict(true);
        let options = raw.parser_options(&defaults);
        assert!(options.strict);
        assert_eq!(options.end, defaults.end);
    }
}
