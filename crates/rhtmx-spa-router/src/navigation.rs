/// Navigation guard pipeline
///
/// Splits a transition into leaving, updating and entering records and runs
/// the guard stages in a fixed order:
///
/// 1. component leave guards, then in-view leave guards (innermost first)
/// 2. global `before_each`
/// 3. component update guards, then in-view update guards
/// 4. per-record `before_enter`
/// 5. component enter guards
/// 6. global `before_resolve`
///
/// Guards run one after another. After every guard the pipeline checks that
/// its target is still the pending navigation; a newer navigation makes it
/// stop with [`NavigationFailureKind::Cancelled`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{NavigationFailure, NavigationFailureKind};
use crate::guards::{BoxedGuard, GuardResult};
use crate::location::RouteLocation;
use crate::record::RouteRecord;

/// Records of a transition, grouped by what happens to them
#[derive(Debug, Default)]
pub struct ChangingRecords {
    /// In `from` only, innermost first
    pub leaving: Vec<Arc<RouteRecord>>,
    /// In both `from` and `to`
    pub updating: Vec<Arc<RouteRecord>>,
    /// In `to` only
    pub entering: Vec<Arc<RouteRecord>>,
}

/// Compares the two record chains position by position
///
/// Aliases count as their original, so switching between a record and its
/// alias updates the record instead of re-entering it.
pub fn extract_changing_records(to: &RouteLocation, from: &RouteLocation) -> ChangingRecords {
    let mut changes = ChangingRecords::default();
    let len = to.matched.len().max(from.matched.len());

    for i in 0..len {
        if let Some(record) = from.matched.get(i) {
            if to.matched.iter().any(|r| r.is_same_record(record)) {
                changes.updating.push(record.clone());
            } else {
                changes.leaving.push(record.clone());
            }
        }
        if let Some(record) = to.matched.get(i) {
            if !from.matched.iter().any(|r| r.is_same_record(record)) {
                changes.entering.push(record.clone());
            }
        }
    }

    changes.leaving.reverse();
    changes
}

/// Which stage a queued guard belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    ComponentLeave,
    RecordLeave,
    GlobalBefore,
    ComponentUpdate,
    RecordUpdate,
    BeforeEnter,
    ComponentEnter,
    GlobalBeforeResolve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationStage {
    Leave,
    BeforeEach,
    Update,
    BeforeEnter,
    Enter,
    BeforeResolve,
}

/// A guard with the record and view it was collected from
struct QueuedGuard {
    kind: GuardKind,
    guard: BoxedGuard,
    /// Owner of a component enter guard, where `OnMount` callbacks go
    target: Option<(Arc<RouteRecord>, String)>,
}

impl QueuedGuard {
    fn new(kind: GuardKind, guard: BoxedGuard) -> Self {
        Self { kind, guard, target: None }
    }
}

/// Component guards of `kind` for every view of `records`
///
/// Leave and update guards only run for views with a mounted instance.
fn component_guards(records: &[Arc<RouteRecord>], kind: GuardKind) -> Vec<QueuedGuard> {
    let mut queue = Vec::new();
    for record in records {
        for (view, component) in &record.components {
            let guard = match kind {
                GuardKind::ComponentLeave => component.before_route_leave(),
                GuardKind::ComponentUpdate => component.before_route_update(),
                GuardKind::ComponentEnter => component.before_route_enter(),
                _ => None,
            };
            let Some(guard) = guard else { continue };

            if kind != GuardKind::ComponentEnter && record.instance(view).is_none() {
                trace!(view = %view, path = %record.path, "skipping guard of an unmounted view");
                continue;
            }

            queue.push(QueuedGuard {
                kind,
                guard: guard.clone(),
                target: Some((record.clone(), view.clone())),
            });
        }
    }
    queue
}

/// The navigation currently allowed to commit
///
/// Identity is the `Arc` of the target location: starting a navigation
/// replaces it, which cancels whatever was pending before.
#[derive(Default)]
pub(crate) struct PendingNavigation {
    target: Mutex<Option<Arc<RouteLocation>>>,
}

impl PendingNavigation {
    pub fn set(&self, to: &Arc<RouteLocation>) {
        *self.target.lock() = Some(to.clone());
    }

    pub fn is_current(&self, to: &Arc<RouteLocation>) -> bool {
        self.target
            .lock()
            .as_ref()
            .is_some_and(|pending| Arc::ptr_eq(pending, to))
    }

    /// `Cancelled` failure when a newer navigation took over
    pub fn check(&self, to: &Arc<RouteLocation>, from: &Arc<RouteLocation>) -> Result<(), NavigationFailure> {
        if self.is_current(to) {
            Ok(())
        } else {
            Err(NavigationFailure::new(NavigationFailureKind::Cancelled, from.clone(), to.clone()))
        }
    }
}

/// Why the pipeline stopped early
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// Aborted, cancelled or redirected
    Failure(NavigationFailure),
    /// A guard returned an error
    Error(anyhow::Error),
}

impl From<NavigationFailure> for Interrupt {
    fn from(failure: NavigationFailure) -> Self {
        Interrupt::Failure(failure)
    }
}

/// Global guards captured when the navigation started
pub(crate) struct GlobalGuards {
    pub before_each: Vec<BoxedGuard>,
    pub before_resolve: Vec<BoxedGuard>,
}

async fn run_stage(
    stage: NavigationStage,
    queue: Vec<QueuedGuard>,
    to: &Arc<RouteLocation>,
    from: &Arc<RouteLocation>,
    pending: &PendingNavigation,
) -> Result<(), Interrupt> {
    if queue.is_empty() {
        return Ok(());
    }
    debug!(?stage, guards = queue.len(), to = %to.full_path, "running navigation guards");

    for queued in queue {
        trace!(kind = ?queued.kind, to = %to.full_path, "running guard");
        let result = queued.guard.check(to.clone(), from.clone()).await;
        pending.check(to, from)?;

        match result.map_err(Interrupt::Error)? {
            GuardResult::Continue => {}
            GuardResult::Abort => {
                debug!(?stage, to = %to.full_path, "navigation aborted by guard");
                return Err(NavigationFailure::new(NavigationFailureKind::Aborted, from.clone(), to.clone()).into());
            }
            GuardResult::Redirect(target) => {
                debug!(?stage, to = %to.full_path, target = %target.describe(), "navigation redirected by guard");
                return Err(NavigationFailure::redirected(from.clone(), to.clone(), target).into());
            }
            GuardResult::OnMount(callback) => match (&queued.kind, &queued.target) {
                (GuardKind::ComponentEnter, Some((record, view))) => {
                    record.queue_enter_callback(view, callback);
                }
                _ => warn!(kind = ?queued.kind, "only component enter guards can register mount callbacks"),
            },
        }
    }

    Ok(())
}

/// Runs every guard stage for `to`
///
/// Returns `Ok` when all guards let the navigation through and it is still
/// the pending one.
pub(crate) async fn run_guards(
    to: &Arc<RouteLocation>,
    from: &Arc<RouteLocation>,
    globals: GlobalGuards,
    pending: &PendingNavigation,
) -> Result<(), Interrupt> {
    let ChangingRecords { leaving, updating, entering } = extract_changing_records(to, from);

    let mut queue = component_guards(&leaving, GuardKind::ComponentLeave);
    for record in &leaving {
        queue.extend(
            record
                .leave_guards()
                .into_iter()
                .map(|guard| QueuedGuard::new(GuardKind::RecordLeave, guard)),
        );
    }
    run_stage(NavigationStage::Leave, queue, to, from, pending).await?;

    let queue = globals
        .before_each
        .into_iter()
        .map(|guard| QueuedGuard::new(GuardKind::GlobalBefore, guard))
        .collect();
    run_stage(NavigationStage::BeforeEach, queue, to, from, pending).await?;

    let mut queue = component_guards(&updating, GuardKind::ComponentUpdate);
    for record in &updating {
        queue.extend(
            record
                .update_guards()
                .into_iter()
                .map(|guard| QueuedGuard::new(GuardKind::RecordUpdate, guard)),
        );
    }
    run_stage(NavigationStage::Update, queue, to, from, pending).await?;

    let queue = entering
        .iter()
        .flat_map(|record| record.before_enter.iter().cloned())
        .map(|guard| QueuedGuard::new(GuardKind::BeforeEnter, guard))
        .collect();
    run_stage(NavigationStage::BeforeEnter, queue, to, from, pending).await?;

    // callbacks from an earlier attempt at these records are stale
    for record in &to.matched {
        record.clear_enter_callbacks();
    }
    let queue = component_guards(&entering, GuardKind::ComponentEnter);
    run_stage(NavigationStage::Enter, queue, to, from, pending).await?;

    let queue = globals
        .before_resolve
        .into_iter()
        .map(|guard| QueuedGuard::new(GuardKind::GlobalBeforeResolve, guard))
        .collect();
    run_stage(NavigationStage::BeforeResolve, queue, to, from, pending).await?;

    pending.check(to, from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatcherLocation, RouterMatcher};
    use crate::record::{RouteComponent, RouteRecordRaw};

    fn location(matcher: &RouterMatcher, path: &str) -> RouteLocation {
        let matched = matcher
            .resolve(MatcherLocation::Path(path), &RouteLocation::start())
            .unwrap();
        let mut location = RouteLocation::start();
        location.path = matched.path.clone();
        location.full_path = matched.path;
        location.params = matched.params;
        location.matched = matched.matched;
        location
    }

    fn matcher() -> RouterMatcher {
        let mut matcher = RouterMatcher::default();
        matcher
            .add_route(
                RouteRecordRaw::new("/users")
                    .with_component(RouteComponent::new("Users"))
                    .with_alias("/people")
                    .with_children([
                        RouteRecordRaw::new(":id").with_component(RouteComponent::new("User")),
                        RouteRecordRaw::new("new").with_component(RouteComponent::new("NewUser")),
                    ]),
                None,
            )
            .unwrap();
        matcher
            .add_route(RouteRecordRaw::new("/about").with_component(RouteComponent::new("About")), None)
            .unwrap();
        matcher
    }

    fn paths(records: &[Arc<RouteRecord>]) -> Vec<&str> {
        records.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn test_changing_records_between_siblings() {
        let matcher = matcher();
        let from = location(&matcher, "/users/1");
        let to = location(&matcher, "/users/new");
        let changes = extract_changing_records(&to, &from);
        assert_eq!(paths(&changes.leaving), vec!["/users/:id"]);
        assert_eq!(paths(&changes.updating), vec!["/users"]);
        assert_eq!(paths(&changes.entering), vec!["/users/new"]);
    }

    #[test]
    fn test_leaving_is_innermost_first() {
        let matcher = matcher();
        let from = location(&matcher, "/users/1");
        let to = location(&matcher, "/about");
        let changes = extract_changing_records(&to, &from);
        assert_eq!(paths(&changes.leaving), vec!["/users/:id", "/users"]);
        assert!(changes.updating.is_empty());
        assert_eq!(paths(&changes.entering), vec!["/about"]);
    }

    #[test]
    fn test_alias_switch_is_an_update() {
        let matcher = matcher();
        let from = location(&matcher, "/users/1");
        let to = location(&matcher, "/people/1");
        let changes = extract_changing_records(&to, &from);
        assert!(changes.leaving.is_empty());
        assert!(changes.entering.is_empty());
        assert_eq!(changes.updating.len(), 2);
    }

    #[test]
    fn test_pending_navigation_identity() {
        let pending = PendingNavigation::default();
        let a = Arc::new(RouteLocation::start());
        let b = Arc::new(RouteLocation::start());
        pending.set(&a);
        assert!(pending.check(&a, &b).is_ok());
        pending.set(&b);
        let failure = pending.check(&a, &b).unwrap_err();
        assert!(failure.is(NavigationFailureKind::Cancelled));
    }
}
