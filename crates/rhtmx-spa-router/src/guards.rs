/// Navigation guards and hook registries
///
/// A guard is an async check that runs while a navigation is pending. Guards
/// are trait objects so that closures ([`guard_fn`]) and stateful structs
/// both fit the same queue.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::location::{RouteLocation, RouteLocationRaw};

/// Handle to a mounted view instance, owned by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

/// Callback queued by an enter guard, run once the entered view mounts
pub type EnterCallback = Box<dyn FnOnce(InstanceHandle) + Send>;

/// What a guard decided
pub enum GuardResult {
    /// Let the navigation proceed
    Continue,
    /// Stop the navigation; it settles as aborted
    Abort,
    /// Restart the navigation towards another target
    Redirect(RouteLocationRaw),
    /// Proceed, and run the callback once the entered view is mounted.
    /// Only meaningful for component enter guards.
    OnMount(EnterCallback),
}

impl GuardResult {
    pub fn redirect(to: impl Into<RouteLocationRaw>) -> Self {
        GuardResult::Redirect(to.into())
    }

    pub fn on_mount<F>(callback: F) -> Self
    where
        F: FnOnce(InstanceHandle) + Send + 'static,
    {
        GuardResult::OnMount(Box::new(callback))
    }
}

impl fmt::Debug for GuardResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardResult::Continue => f.write_str("Continue"),
            GuardResult::Abort => f.write_str("Abort"),
            GuardResult::Redirect(to) => f.debug_tuple("Redirect").field(to).finish(),
            GuardResult::OnMount(_) => f.write_str("OnMount(..)"),
        }
    }
}

impl From<()> for GuardResult {
    fn from(_: ()) -> Self {
        GuardResult::Continue
    }
}

impl From<bool> for GuardResult {
    fn from(proceed: bool) -> Self {
        if proceed {
            GuardResult::Continue
        } else {
            GuardResult::Abort
        }
    }
}

impl From<RouteLocationRaw> for GuardResult {
    fn from(to: RouteLocationRaw) -> Self {
        GuardResult::Redirect(to)
    }
}

impl From<&str> for GuardResult {
    fn from(path: &str) -> Self {
        GuardResult::Redirect(path.into())
    }
}

/// An async navigation check
///
/// Returning `Err` fails the navigation with an error, which reaches the
/// router's error handlers.
#[async_trait]
pub trait NavigationGuard: Send + Sync {
    async fn check(&self, to: Arc<RouteLocation>, from: Arc<RouteLocation>) -> anyhow::Result<GuardResult>;
}

pub type BoxedGuard = Arc<dyn NavigationGuard>;

/// Adapter turning an async closure into a [`NavigationGuard`]
pub struct GuardFn<F>(F);

#[async_trait]
impl<F, Fut, R> NavigationGuard for GuardFn<F>
where
    F: Fn(Arc<RouteLocation>, Arc<RouteLocation>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Into<GuardResult> + Send + 'static,
{
    async fn check(&self, to: Arc<RouteLocation>, from: Arc<RouteLocation>) -> anyhow::Result<GuardResult> {
        (self.0)(to, from).await.map(Into::into)
    }
}

/// Wraps an async closure as a guard
///
/// The closure may return anything convertible into [`GuardResult`]:
/// `()`, `bool`, a [`RouteLocationRaw`] or a path.
///
/// ```
/// use rhtmx_spa_router::guards::guard_fn;
///
/// let requires_auth = guard_fn(|to, _from| async move {
///     Ok(to.meta.get("requires_auth").is_none())
/// });
/// # let _ = requires_auth;
/// ```
pub fn guard_fn<F, Fut, R>(f: F) -> BoxedGuard
where
    F: Fn(Arc<RouteLocation>, Arc<RouteLocation>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Into<GuardResult> + Send + 'static,
{
    Arc::new(GuardFn(f))
}

/// Identifies a registered hook for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

impl HookId {
    fn next() -> Self {
        HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ordered list of hooks that can be removed by id
///
/// Hooks run in registration order. Running code works on a
/// [`snapshot`](Self::snapshot), so hooks may add or remove hooks.
pub struct HookRegistry<T> {
    entries: RwLock<Vec<(HookId, T)>>,
}

impl<T: Clone> HookRegistry<T> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }

    pub fn add(&self, hook: T) -> HookId {
        let id = HookId::next();
        self.entries.write().push((id, hook));
        id
    }

    /// Returns `false` when the id was not registered
    pub fn remove(&self, id: HookId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().iter().map(|(_, hook)| hook.clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: Clone> Default for HookRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
