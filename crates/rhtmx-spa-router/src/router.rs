/// Router
///
/// Owns the route table, the current location and the history binding.
/// Every navigation (push, replace or a history pop) resolves its target,
/// follows record redirects, skips duplicates, runs the guard pipeline and
/// finally writes history and swaps the current location.

use std::sync::{Arc, Weak};

use futures::channel::oneshot;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::config::RouterConfig;
use crate::error::{NavigationFailure, NavigationFailureKind, RouterError};
use crate::guards::{BoxedGuard, HookId, HookRegistry};
use crate::history::{HistoryListener, NavigationInformation, RouterHistory, Unsubscribe};
use crate::location::{
    is_same_route_location, normalize_hash, RouteLocation, RouteLocationRaw, RouteTarget,
};
use crate::matcher::{MatcherLocation, RouteRef, RouterMatcher};
use crate::navigation::{extract_changing_records, run_guards, GlobalGuards, Interrupt, PendingNavigation};
use crate::path::{normalize_base, parse_url, stringify_url};
use crate::query::{DefaultQueryCodec, LocationQuery, QueryCodec};
use crate::record::{RecordId, RouteRecord, RouteRecordRaw};

/// Called after every navigation, with the failure when it did not commit
pub type AfterEachHook =
    Arc<dyn Fn(&RouteLocation, &RouteLocation, Option<&NavigationFailure>) + Send + Sync>;

/// Called with `(error, to, from)` when a guard fails with an error
pub type ErrorHandler = Arc<dyn Fn(&anyhow::Error, &RouteLocation, &RouteLocation) + Send + Sync>;

/// Called with `(to, from)` once a navigation commits or is skipped as a duplicate
pub type ScrollBehavior = Arc<dyn Fn(&RouteLocation, &RouteLocation) + Send + Sync>;

/// Outcome of a navigation
pub type NavigationResult = Result<Option<NavigationFailure>, RouterError>;

/// Progress of the initial navigation
#[derive(Debug, Clone)]
pub enum ReadyState {
    Pending,
    Ready,
    /// The initial navigation ended with an error
    Failed(RouterError),
}

/// Builder for [`Router`]
pub struct RouterBuilder {
    history: Arc<dyn RouterHistory>,
    routes: Vec<RouteRecordRaw>,
    config: RouterConfig,
    query: Arc<dyn QueryCodec>,
    scroll_behavior: Option<ScrollBehavior>,
}

impl RouterBuilder {
    pub fn new(history: impl RouterHistory + 'static) -> Self {
        Self {
            history: Arc::new(history),
            routes: Vec::new(),
            config: RouterConfig::default(),
            query: Arc::new(DefaultQueryCodec),
            scroll_behavior: None,
        }
    }

    pub fn with_route(mut self, route: RouteRecordRaw) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_routes(mut self, routes: impl IntoIterator<Item = RouteRecordRaw>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the `?a=1&b=2` codec
    pub fn with_query_codec(mut self, codec: impl QueryCodec + 'static) -> Self {
        self.query = Arc::new(codec);
        self
    }

    pub fn with_scroll_behavior<F>(mut self, scroll: F) -> Self
    where
        F: Fn(&RouteLocation, &RouteLocation) + Send + Sync + 'static,
    {
        self.scroll_behavior = Some(Arc::new(scroll));
        self
    }

    /// Compiles every route; the first invalid declaration fails the build
    pub fn build(self) -> Result<Router, RouterError> {
        let mut matcher = RouterMatcher::new(self.config.parser_options());
        for route in self.routes {
            matcher.add_route(route, None)?;
        }

        let base = normalize_base(&self.config.base).into_owned();
        let start = Arc::new(RouteLocation::start());
        let (ready, _) = watch::channel(ReadyState::Pending);

        info!(routes = matcher.get_routes().len(), base = %base, "router created");

        Ok(Router {
            inner: Arc::new(RouterInner {
                config: self.config,
                base,
                matcher: RwLock::new(matcher),
                history: self.history,
                query: self.query,
                current: RwLock::new(start.clone()),
                start,
                pending: PendingNavigation::default(),
                before_each: HookRegistry::new(),
                before_resolve: HookRegistry::new(),
                after_each: HookRegistry::new(),
                error_handlers: HookRegistry::new(),
                scroll_behavior: self.scroll_behavior,
                ready,
                listener: Mutex::new(None),
                go_waiters: Mutex::new(Vec::new()),
            }),
        })
    }
}

type GoWaiter = oneshot::Sender<NavigationResult>;

struct RouterInner {
    config: RouterConfig,
    base: String,
    matcher: RwLock<RouterMatcher>,
    history: Arc<dyn RouterHistory>,
    query: Arc<dyn QueryCodec>,
    start: Arc<RouteLocation>,
    current: RwLock<Arc<RouteLocation>>,
    pending: PendingNavigation,
    before_each: HookRegistry<BoxedGuard>,
    before_resolve: HookRegistry<BoxedGuard>,
    after_each: HookRegistry<AfterEachHook>,
    error_handlers: HookRegistry<ErrorHandler>,
    scroll_behavior: Option<ScrollBehavior>,
    ready: watch::Sender<ReadyState>,
    listener: Mutex<Option<Unsubscribe>>,
    go_waiters: Mutex<Vec<GoWaiter>>,
}

/// Client-side router
///
/// Cheap to clone; clones share the same state.
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::{MemoryHistory, RouteComponent, RouteLocationRaw, RouteRecordRaw, Router};
///
/// # tokio_test_block(async {
/// let router = Router::builder(MemoryHistory::new())
///     .with_route(RouteRecordRaw::new("/").with_name("home").with_component(RouteComponent::new("Home")))
///     .with_route(
///         RouteRecordRaw::new("/users/:id")
///             .with_name("user")
///             .with_component(RouteComponent::new("User")),
///     )
///     .build()
///     .unwrap();
///
/// router.init().await.unwrap();
/// let failure = router.push(RouteLocationRaw::named("user").with_param("id", "1")).await.unwrap();
/// assert!(failure.is_none());
/// assert_eq!(router.current_route().full_path, "/users/1");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn builder(history: impl RouterHistory + 'static) -> RouterBuilder {
        RouterBuilder::new(history)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// Normalized base prepended to every href
    pub fn base(&self) -> &str {
        &self.inner.base
    }

    pub fn history(&self) -> &Arc<dyn RouterHistory> {
        &self.inner.history
    }

    // ========================================================================
    // Route table
    // ========================================================================

    pub fn add_route(&self, route: RouteRecordRaw) -> Result<RecordId, RouterError> {
        self.inner.matcher.write().add_route(route, None)
    }

    /// Adds `route` under the record named `parent`
    ///
    /// # Errors
    ///
    /// [`RouterError::UnknownParent`] when no record has that name.
    pub fn add_child_route(&self, parent: &str, route: RouteRecordRaw) -> Result<RecordId, RouterError> {
        let mut matcher = self.inner.matcher.write();
        let parent_id = matcher
            .get_record_matcher(parent)
            .map(|m| m.record().id())
            .ok_or_else(|| RouterError::UnknownParent(parent.to_string()))?;
        matcher.add_route(route, Some(parent_id))
    }

    /// Removes a record with its children and aliases
    pub fn remove_route(&self, target: impl Into<RouteRef>) -> bool {
        self.inner.matcher.write().remove_route(target)
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.inner.matcher.read().has_route(name)
    }

    /// Records in matching order
    pub fn get_routes(&self) -> Vec<Arc<RouteRecord>> {
        self.inner.matcher.read().get_routes()
    }

    pub fn get_route(&self, target: impl Into<RouteRef>) -> Option<Arc<RouteRecord>> {
        self.inner
            .matcher
            .read()
            .get_record_matcher(target)
            .map(|m| m.record().clone())
    }

    // ========================================================================
    // Locations
    // ========================================================================

    pub fn current_route(&self) -> Arc<RouteLocation> {
        self.inner.current.read().clone()
    }

    /// Resolves a target against the current location without navigating
    pub fn resolve(&self, to: impl Into<RouteLocationRaw>) -> Result<RouteLocation, RouterError> {
        let current = self.current_route();
        self.resolve_from(&to.into(), &current)
    }

    fn resolve_from(&self, raw: &RouteLocationRaw, current: &RouteLocation) -> Result<RouteLocation, RouterError> {
        let codec = self.inner.query.as_ref();

        let (matched, mut query, mut hash) = {
            let matcher = self.inner.matcher.read();
            match &raw.target {
                RouteTarget::Path(url) => {
                    let parsed = parse_url(codec, url, &current.path);
                    let matched = matcher.resolve(MatcherLocation::Path(&parsed.path), current)?;
                    (matched, parsed.query, parsed.hash)
                }
                RouteTarget::Named { name, params } => {
                    let location = MatcherLocation::Named { name: name.as_str(), params };
                    (matcher.resolve(location, current)?, LocationQuery::new(), String::new())
                }
                RouteTarget::Relative { params } => {
                    let location = MatcherLocation::Relative { params };
                    (matcher.resolve(location, current)?, LocationQuery::new(), String::new())
                }
            }
        };

        if let Some(overridden) = &raw.query {
            query = overridden.clone();
        }
        if let Some(overridden) = &raw.hash {
            hash = normalize_hash(overridden);
        }

        let full_path = stringify_url(codec, &matched.path, &query, &hash);
        let href = format!("{}{}", self.inner.base, full_path);
        trace!(full_path = %full_path, "resolved location");
        Ok(RouteLocation::from_match(matched, full_path, href, query, hash))
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Guard run for every navigation, after leave guards
    pub fn before_each(&self, guard: BoxedGuard) -> HookId {
        self.inner.before_each.add(guard)
    }

    pub fn remove_before_each(&self, id: HookId) -> bool {
        self.inner.before_each.remove(id)
    }

    /// Guard run last, once every other guard let the navigation through
    pub fn before_resolve(&self, guard: BoxedGuard) -> HookId {
        self.inner.before_resolve.add(guard)
    }

    pub fn remove_before_resolve(&self, id: HookId) -> bool {
        self.inner.before_resolve.remove(id)
    }

    pub fn after_each<F>(&self, hook: F) -> HookId
    where
        F: Fn(&RouteLocation, &RouteLocation, Option<&NavigationFailure>) + Send + Sync + 'static,
    {
        self.inner.after_each.add(Arc::new(hook))
    }

    pub fn remove_after_each(&self, id: HookId) -> bool {
        self.inner.after_each.remove(id)
    }

    pub fn on_error<F>(&self, handler: F) -> HookId
    where
        F: Fn(&anyhow::Error, &RouteLocation, &RouteLocation) + Send + Sync + 'static,
    {
        self.inner.error_handlers.add(Arc::new(handler))
    }

    pub fn remove_on_error(&self, id: HookId) -> bool {
        self.inner.error_handlers.remove(id)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigates to `to`, adding a history entry
    ///
    /// Resolves to `Ok(None)` once the navigation committed and to
    /// `Ok(Some(failure))` when it was aborted, cancelled or a duplicate.
    ///
    /// # Errors
    ///
    /// Resolution errors, invalid or endless redirects, and guard errors
    /// ([`RouterError::Guard`]).
    pub async fn push(&self, to: impl Into<RouteLocationRaw>) -> NavigationResult {
        self.navigate(to.into(), None).await
    }

    /// Same as [`push`](Self::push) but overwrites the current history entry
    pub async fn replace(&self, to: impl Into<RouteLocationRaw>) -> NavigationResult {
        self.navigate(to.into().replace(), None).await
    }

    /// Moves `delta` entries through history and waits for the resulting
    /// navigation to settle
    ///
    /// A zero delta does nothing.
    pub async fn go(&self, delta: i32) -> NavigationResult {
        if delta == 0 {
            return Ok(None);
        }
        self.setup_listeners();

        let (tx, rx) = oneshot::channel();
        self.inner.go_waiters.lock().push(tx);
        self.inner.history.go(delta, true);

        rx.await.unwrap_or(Ok(None))
    }

    pub async fn back(&self) -> NavigationResult {
        self.go(-1).await
    }

    pub async fn forward(&self) -> NavigationResult {
        self.go(1).await
    }

    /// Runs the initial navigation to the history's current location
    pub async fn init(&self) -> NavigationResult {
        let location = self.inner.history.location();
        debug!(location = %location, "initial navigation");
        self.push(location).await
    }

    /// Resolves once the initial navigation settled
    ///
    /// # Errors
    ///
    /// The error that ended the initial navigation, whether a guard threw it
    /// or resolving the target failed.
    pub async fn is_ready(&self) -> Result<(), RouterError> {
        let mut ready = self.inner.ready.subscribe();
        loop {
            let state = ready.borrow_and_update().clone();
            match state {
                ReadyState::Ready => return Ok(()),
                ReadyState::Failed(error) => return Err(error),
                ReadyState::Pending => {}
            }
            if ready.changed().await.is_err() {
                return Err(RouterError::Config("router dropped before it was ready".to_string()));
            }
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.ready.borrow().clone()
    }

    /// Detaches from history and goes back to the start location
    pub fn destroy(&self) {
        if let Some(unsubscribe) = self.inner.listener.lock().take() {
            unsubscribe();
        }
        *self.inner.current.write() = self.inner.start.clone();
        self.inner.pending.set(&self.inner.start);
        self.inner.ready.send_replace(ReadyState::Pending);
        self.settle_go_waiters(Ok(None));
        info!("router destroyed");
    }

    /// Runs a navigation; an error settles readiness when nothing did before
    async fn navigate(&self, raw: RouteLocationRaw, redirected_from: Option<Arc<RouteLocation>>) -> NavigationResult {
        let result = self.run_navigation(raw, redirected_from).await;
        if let Err(err) = &result {
            self.mark_ready(Some(err.clone()));
        }
        result
    }

    async fn run_navigation(
        &self,
        mut raw: RouteLocationRaw,
        mut redirected_from: Option<Arc<RouteLocation>>,
    ) -> NavigationResult {
        let mut hops = 0usize;

        loop {
            let from = self.current_route();
            let mut target = self.resolve_from(&raw, &from)?;
            target.redirected_from = redirected_from.take();
            let to = Arc::new(target);
            if !self.claim(&to, &from) {
                trace!(to = %to.full_path, "current route changed while resolving, resolving again");
                redirected_from = to.redirected_from.clone();
                continue;
            }

            if let Some(next) = self.record_redirect(&to)? {
                hops = self.count_hop(hops, to.original_target().unwrap_or(&to), &next)?;
                debug!(from = %to.full_path, to = %next.describe(), "following record redirect");
                raw = follow_redirect(next, &raw);
                redirected_from = Some(to);
                continue;
            }

            if !raw.force && is_same_route_location(self.inner.query.as_ref(), &from, &to) {
                debug!(to = %to.full_path, "skipping navigation to the current location");
                let failure = NavigationFailure::new(NavigationFailureKind::Duplicated, from.clone(), to.clone());
                self.scroll(&from, &from);
                self.trigger_after_each(&to, &from, Some(&failure));
                return Ok(Some(failure));
            }

            let outcome = run_guards(&to, &from, self.globals(), &self.inner.pending).await;
            let failure = match outcome {
                Ok(()) => self.finalize(&to, &from, Some(&raw)),
                Err(Interrupt::Failure(failure)) if failure.is(NavigationFailureKind::Redirected) => {
                    let next = match failure.redirect_to {
                        Some(next) if next.has_path_or_name() => *next,
                        _ => return Err(RouterError::InvalidRedirect { from: to.full_path.clone() }),
                    };
                    hops = self.count_hop(hops, to.original_target().unwrap_or(&to), &next)?;
                    raw = follow_redirect(next, &raw);
                    redirected_from = Some(to);
                    continue;
                }
                Err(Interrupt::Failure(failure)) => Some(failure),
                Err(Interrupt::Error(error)) => {
                    let error = self.trigger_error(error, &to, &from);
                    return Err(RouterError::Guard(error));
                }
            };

            if let Some(failure) = &failure {
                debug!(kind = ?failure.kind, to = %to.full_path, "navigation did not commit");
                if failure.is(NavigationFailureKind::Aborted) {
                    self.mark_ready(None);
                }
            }
            self.trigger_after_each(&to, &from, failure.as_ref());
            return Ok(failure);
        }
    }

    /// Redirect declared on the matched leaf, with query and hash carried over
    fn record_redirect(&self, to: &RouteLocation) -> Result<Option<RouteLocationRaw>, RouterError> {
        let Some(redirect) = to.leaf().and_then(|record| record.redirect.as_ref()) else {
            return Ok(None);
        };

        let mut next = redirect.target_for(to);
        if !next.has_path_or_name() {
            warn!(from = %to.full_path, "record redirect has neither a path nor a name");
            return Err(RouterError::InvalidRedirect { from: to.full_path.clone() });
        }

        let (keeps_query, keeps_hash) = match &next.target {
            RouteTarget::Path(path) => (!path.contains('?'), !path.contains('#')),
            _ => (true, true),
        };
        if keeps_query && next.query.is_none() {
            next.query = Some(to.query.clone());
        }
        if keeps_hash && next.hash.is_none() {
            next.hash = Some(to.hash.clone());
        }
        if let RouteTarget::Named { params, .. } = &mut next.target {
            if params.is_empty() {
                *params = to.params.clone();
            }
        }
        Ok(Some(next))
    }

    fn count_hop(&self, hops: usize, origin: &RouteLocation, next: &RouteLocationRaw) -> Result<usize, RouterError> {
        let hops = hops + 1;
        let limit = self.inner.config.max_redirects;
        if hops > limit {
            warn!(from = %origin.full_path, to = %next.describe(), limit, "too many redirects");
            return Err(RouterError::InfiniteRedirect {
                from: origin.full_path.clone(),
                to: next.describe(),
                limit,
            });
        }
        Ok(hops)
    }

    /// Makes `to` the pending navigation, unless a commit replaced `from`
    /// after it was read
    fn claim(&self, to: &Arc<RouteLocation>, from: &Arc<RouteLocation>) -> bool {
        let current = self.inner.current.read();
        if !Arc::ptr_eq(&*current, from) {
            return false;
        }
        self.inner.pending.set(to);
        true
    }

    fn globals(&self) -> GlobalGuards {
        GlobalGuards {
            before_each: self.inner.before_each.snapshot(),
            before_resolve: self.inner.before_resolve.snapshot(),
        }
    }

    /// Commits `to`; `raw` is `None` for pop navigations, which history
    /// already moved to
    fn finalize(
        &self,
        to: &Arc<RouteLocation>,
        from: &Arc<RouteLocation>,
        raw: Option<&RouteLocationRaw>,
    ) -> Option<NavigationFailure> {
        // checked under the write lock so no navigation can claim a stale `from`
        let mut current = self.inner.current.write();
        if let Err(failure) = self.inner.pending.check(to, from) {
            return Some(failure);
        }

        if let Some(raw) = raw {
            let first = Arc::ptr_eq(from, &self.inner.start);
            if raw.replace || first {
                self.inner.history.replace(&to.full_path, raw.state.clone());
            } else {
                self.inner.history.push(&to.full_path, raw.state.clone());
            }
        }

        for record in extract_changing_records(to, from).leaving {
            record.reset();
        }
        *current = to.clone();
        drop(current);
        info!(to = %to.full_path, from = %from.full_path, "navigation committed");

        self.mark_ready(None);
        self.scroll(to, from);
        None
    }

    fn scroll(&self, to: &RouteLocation, from: &RouteLocation) {
        if let Some(scroll) = &self.inner.scroll_behavior {
            scroll(to, from);
        }
    }

    fn trigger_after_each(&self, to: &RouteLocation, from: &RouteLocation, failure: Option<&NavigationFailure>) {
        for hook in self.inner.after_each.snapshot() {
            hook(to, from, failure);
        }
        self.settle_go_waiters(Ok(failure.cloned()));
    }

    fn trigger_error(&self, error: anyhow::Error, to: &RouteLocation, from: &RouteLocation) -> Arc<anyhow::Error> {
        let handlers = self.inner.error_handlers.snapshot();
        if handlers.is_empty() {
            error!(error = %error, to = %to.full_path, "uncaught error during navigation");
        }
        for handler in &handlers {
            handler(&error, to, from);
        }

        let error = Arc::new(error);
        self.mark_ready(Some(RouterError::Guard(error.clone())));
        self.settle_go_waiters(Err(RouterError::Guard(error.clone())));
        error
    }

    fn settle_go_waiters(&self, result: NavigationResult) {
        let waiters: Vec<GoWaiter> = std::mem::take(&mut *self.inner.go_waiters.lock());
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    /// Settles readiness once; later calls are ignored
    fn mark_ready(&self, error: Option<RouterError>) {
        if !matches!(*self.inner.ready.borrow(), ReadyState::Pending) {
            return;
        }
        self.setup_listeners();
        let state = match error {
            Some(error) => ReadyState::Failed(error),
            None => ReadyState::Ready,
        };
        debug!(?state, "router ready");
        self.inner.ready.send_replace(state);
    }

    /// Subscribes to history pops once
    fn setup_listeners(&self) {
        let mut slot = self.inner.listener.lock();
        if slot.is_some() {
            return;
        }

        let router: Weak<RouterInner> = Arc::downgrade(&self.inner);
        let listener: HistoryListener = Arc::new(move |to: &str, _from: &str, info: NavigationInformation| {
            let Some(inner) = router.upgrade() else { return };
            let router = Router { inner };
            let to = to.to_string();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { router.handle_pop(to, info).await });
                }
                Err(_) => warn!(to = %to, "history moved outside of a tokio runtime, ignoring"),
            }
        });
        *slot = Some(self.inner.history.listen(listener));
        trace!("listening to history");
    }

    /// Navigation started by history itself
    ///
    /// History already moved, so a failed navigation moves it back by the
    /// same delta. Cancelled navigations leave history alone.
    async fn handle_pop(self, location: String, info: NavigationInformation) {
        let (from, to) = loop {
            let from = self.current_route();
            let to = match self.resolve_from(&RouteLocationRaw::path(location.as_str()), &from) {
                Ok(to) => Arc::new(to),
                Err(err) => {
                    warn!(location = %location, error = %err, "history moved to an unknown location");
                    self.revert(info);
                    self.settle_go_waiters(Err(err));
                    return;
                }
            };

            if info.delta == 0 && is_same_route_location(self.inner.query.as_ref(), &from, &to) {
                let failure = NavigationFailure::new(NavigationFailureKind::Duplicated, from.clone(), to.clone());
                self.trigger_after_each(&to, &from, Some(&failure));
                return;
            }
            if self.claim(&to, &from) {
                break (from, to);
            }
        };
        debug!(to = %to.full_path, delta = info.delta, "history pop");

        match self.record_redirect(&to) {
            Ok(Some(next)) => {
                let next = next.replace().force();
                self.settle_redirect(self.navigate(next, Some(to)).await, info);
                return;
            }
            Ok(None) => {}
            Err(err) => {
                self.settle_go_waiters(Err(err));
                return;
            }
        }

        let outcome = run_guards(&to, &from, self.globals(), &self.inner.pending).await;
        let failure = match outcome {
            Ok(()) => self.finalize(&to, &from, None),
            Err(Interrupt::Failure(failure)) if failure.is(NavigationFailureKind::Redirected) => {
                let next = match failure.redirect_to {
                    Some(next) if next.has_path_or_name() => (*next).force(),
                    _ => {
                        self.revert(info);
                        let err = RouterError::InvalidRedirect { from: to.full_path.clone() };
                        self.settle_go_waiters(Err(err));
                        return;
                    }
                };
                self.settle_redirect(self.navigate(next, Some(to)).await, info);
                return;
            }
            Err(Interrupt::Failure(failure)) => Some(failure),
            Err(Interrupt::Error(error)) => {
                self.revert(info);
                self.trigger_error(error, &to, &from);
                return;
            }
        };

        if let Some(failure) = &failure {
            if !failure.is(NavigationFailureKind::Cancelled) {
                debug!(kind = ?failure.kind, "reverting history after a failed pop");
                self.revert(info);
            }
        }
        self.trigger_after_each(&to, &from, failure.as_ref());
    }

    /// A redirected pop that ends aborted or duplicated moves history back
    fn settle_redirect(&self, result: NavigationResult, info: NavigationInformation) {
        match result {
            Ok(Some(failure))
                if failure.is(NavigationFailureKind::Aborted) || failure.is(NavigationFailureKind::Duplicated) =>
            {
                self.revert(info);
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "redirect after history pop failed");
                self.settle_go_waiters(Err(err));
            }
        }
    }

    /// Moves history back over a pop; an unknown delta cannot be undone
    fn revert(&self, info: NavigationInformation) {
        if info.delta == 0 {
            warn!("cannot revert a history move of unknown size");
            return;
        }
        self.inner.history.go(-info.delta, false);
    }
}

/// Carries `replace`, `force` and `state` of the previous hop into a redirect
fn follow_redirect(mut next: RouteLocationRaw, previous: &RouteLocationRaw) -> RouteLocationRaw {
    next.replace = next.replace || previous.replace;
    next.force = next.force || previous.force;
    if next.state.is_none() {
        next.state = previous.state.clone();
    }
    next
}
