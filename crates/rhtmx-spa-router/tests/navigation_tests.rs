//! Integration tests for the navigation pipeline
//!
//! Covers:
//! - Guard order across leave, before-each, update, enter and resolve stages
//! - Aborts, guard redirects and record redirects
//! - Duplicate detection and forced navigations
//! - Cancellation when navigations race
//! - Guard errors, readiness and hook removal

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use common::{app_router, started_router, Log};
use pretty_assertions::assert_eq;
use rhtmx_spa_router::*;
use tokio::sync::Notify;

fn counting_guard(counter: &Arc<AtomicUsize>) -> BoxedGuard {
    let counter = counter.clone();
    guard_fn(move |_to, _from| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    })
}

// ========================================================================
// Basic navigation
// ========================================================================

#[tokio::test]
async fn test_push_named_route() {
    common::init_tracing();
    let router = Router::builder(MemoryHistory::new())
        .with_route(
            RouteRecordRaw::new("/users/:id")
                .with_name("user")
                .with_component(RouteComponent::new("User")),
        )
        .build()
        .unwrap();

    let failure = router
        .push(RouteLocationRaw::named("user").with_param("id", "1"))
        .await
        .unwrap();
    assert!(failure.is_none());

    let current = router.current_route();
    assert_eq!(current.full_path, "/users/1");
    assert_eq!(current.params["id"], "1");
    assert_eq!(current.matched.len(), 1);
}

#[tokio::test]
async fn test_push_and_replace_write_history() {
    let (router, history) = started_router().await;
    assert_eq!(history.entries(), vec!["/"]);

    router.push("/users/1").await.unwrap();
    router.push("/x?from=users#top").await.unwrap();
    assert_eq!(history.entries(), vec!["/", "/users/1", "/x?from=users#top"]);

    router.replace("/y").await.unwrap();
    assert_eq!(history.entries(), vec!["/", "/users/1", "/y"]);
    assert_eq!(router.current_route().path, "/y");
}

#[tokio::test]
async fn test_state_is_stored_in_history() {
    let (router, history) = started_router().await;
    let state = serde_json::json!({ "scroll": 120 });
    router
        .push(RouteLocationRaw::path("/x").with_state(state.clone()))
        .await
        .unwrap();
    assert_eq!(history.state(), Some(state));
}

#[tokio::test]
async fn test_relative_path_resolves_against_current() {
    let (router, _) = started_router().await;
    router.push("/users/1").await.unwrap();
    router.push("2").await.unwrap();
    assert_eq!(router.current_route().path, "/users/2");

    router.push(RouteLocationRaw::relative(params([("id", "9")]))).await.unwrap();
    assert_eq!(router.current_route().path, "/users/9");
}

#[tokio::test]
async fn test_unknown_path_is_an_error() {
    let (router, _) = started_router().await;
    let err = router.push("/nope").await.unwrap_err();
    assert!(matches!(err, RouterError::MatcherNotFound { .. }));
    assert_eq!(router.current_route().path, "/");
}

// ========================================================================
// Guard pipeline
// ========================================================================

#[tokio::test]
async fn test_guard_order() {
    common::init_tracing();
    let log = Log::default();
    let router = Router::builder(MemoryHistory::new())
        .with_route(RouteRecordRaw::new("/").with_component(RouteComponent::new("Home")))
        .with_route(
            RouteRecordRaw::new("/users")
                .with_name("users")
                .with_component(
                    RouteComponent::new("UsersLayout").with_before_route_update(log.guard("component-update")),
                )
                .with_children([
                    RouteRecordRaw::new(":id").with_name("user").with_component(
                        RouteComponent::new("User").with_before_route_leave(log.guard("component-leave")),
                    ),
                    RouteRecordRaw::new("new")
                        .with_name("new-user")
                        .with_before_enter(log.guard("before-enter"))
                        .with_component(
                            RouteComponent::new("NewUser").with_before_route_enter(log.guard("component-enter")),
                        ),
                ]),
        )
        .build()
        .unwrap();

    router.init().await.unwrap();
    router.push("/users/1").await.unwrap();
    assert!(log.entries().is_empty());

    let users = router.get_route("users").unwrap();
    let user = router.get_route("user").unwrap();
    users.mount_instance(record::DEFAULT_VIEW, InstanceHandle(1));
    user.mount_instance(record::DEFAULT_VIEW, InstanceHandle(2));
    user.add_leave_guard(log.guard("in-view-leave"));
    users.add_update_guard(log.guard("in-view-update"));

    router.before_each(log.guard("before-each"));
    router.before_resolve(log.guard("before-resolve"));
    let after = log.clone();
    router.after_each(move |_to, _from, _failure| after.push("after-each"));

    assert!(router.push("/users/new").await.unwrap().is_none());
    assert_eq!(
        log.entries(),
        vec![
            "component-leave",
            "in-view-leave",
            "before-each",
            "component-update",
            "in-view-update",
            "before-enter",
            "component-enter",
            "before-resolve",
            "after-each",
        ]
    );

    // the left record dropped its instance and in-view guards
    assert_eq!(user.instance(record::DEFAULT_VIEW), None);
    assert_eq!(users.instance(record::DEFAULT_VIEW), Some(InstanceHandle(1)));
}

#[tokio::test]
async fn test_leave_guard_abort_stops_before_global_guards() {
    let (router, history) = started_router().await;
    router.push("/users/1").await.unwrap();

    let user = router.get_route("user").unwrap();
    user.add_leave_guard(guard_fn(|_to, _from| async { Ok(false) }));

    let before_each = Arc::new(AtomicUsize::new(0));
    router.before_each(counting_guard(&before_each));

    let failures = Log::default();
    let seen = failures.clone();
    router.after_each(move |to, _from, failure| {
        if let Some(failure) = failure {
            seen.push(format!("{:?} {}", failure.kind, to.full_path));
        }
    });

    let failure = router.push("/x").await.unwrap().unwrap();
    assert!(failure.is(NavigationFailureKind::Aborted));
    assert_eq!(failure.from.path, "/users/1");
    assert_eq!(failure.to.path, "/x");

    assert_eq!(before_each.load(Ordering::SeqCst), 0);
    assert_eq!(failures.entries(), vec!["Aborted /x"]);
    assert_eq!(router.current_route().path, "/users/1");
    assert_eq!(history.location(), "/users/1");
}

#[tokio::test]
async fn test_update_guards_run_when_params_change() {
    let (router, _) = started_router().await;
    router.push("/users/1").await.unwrap();

    let user = router.get_route("user").unwrap();
    let updates = Arc::new(AtomicUsize::new(0));
    user.add_update_guard(counting_guard(&updates));

    router.push("/users/2").await.unwrap();
    router.push("/users/3?tab=posts").await.unwrap();
    assert_eq!(updates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_enter_callback_runs_once_view_mounts() {
    common::init_tracing();
    let mounted = Log::default();
    let seen = mounted.clone();
    let enter = guard_fn(move |_to, _from| {
        let seen = seen.clone();
        async move { Ok(GuardResult::on_mount(move |handle| seen.push(format!("mounted {}", handle.0)))) }
    });

    let router = Router::builder(MemoryHistory::new())
        .with_route(RouteRecordRaw::new("/").with_component(RouteComponent::new("Home")))
        .with_route(
            RouteRecordRaw::new("/profile")
                .with_name("profile")
                .with_component(RouteComponent::new("Profile").with_before_route_enter(enter)),
        )
        .build()
        .unwrap();

    router.init().await.unwrap();
    router.push("/profile").await.unwrap();

    let profile = router.get_route("profile").unwrap();
    assert_eq!(profile.pending_enter_callbacks(record::DEFAULT_VIEW), 1);
    assert!(mounted.entries().is_empty());

    profile.mount_instance(record::DEFAULT_VIEW, InstanceHandle(7));
    assert_eq!(mounted.entries(), vec!["mounted 7"]);
    assert_eq!(profile.pending_enter_callbacks(record::DEFAULT_VIEW), 0);
}

// ========================================================================
// Redirects
// ========================================================================

#[tokio::test]
async fn test_guard_redirect_records_origin() {
    let (router, history) = started_router().await;
    router.add_route(
        RouteRecordRaw::new("/admin")
            .with_component(RouteComponent::new("Admin"))
            .with_meta("requires_auth", true),
    )
    .unwrap();

    router.before_each(guard_fn(|to, _from| async move {
        if to.meta.contains_key("requires_auth") {
            Ok(GuardResult::redirect(RouteLocationRaw::named("login")))
        } else {
            Ok(GuardResult::Continue)
        }
    }));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    router.after_each(move |_to, _from, _failure| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(router.push("/admin").await.unwrap().is_none());

    let current = router.current_route();
    assert_eq!(current.name.as_deref(), Some("login"));
    assert_eq!(current.redirected_from.as_ref().unwrap().full_path, "/admin");
    assert_eq!(history.entries(), vec!["/", "/login"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_record_redirect_keeps_query_and_params() {
    common::init_tracing();
    let router = Router::builder(MemoryHistory::new())
        .with_route(RouteRecordRaw::new("/").with_component(RouteComponent::new("Home")))
        .with_route(RouteRecordRaw::new("/u/:id").with_redirect(RouteLocationRaw::named("user")))
        .with_route(
            RouteRecordRaw::new("/users/:id")
                .with_name("user")
                .with_component(RouteComponent::new("User")),
        )
        .with_route(RouteRecordRaw::new("/me").with_redirect(RouteRedirect::dynamic(|to| {
            RouteLocationRaw::path(format!("/users/self{}", to.hash))
        })))
        .build()
        .unwrap();
    router.init().await.unwrap();

    router.push("/u/5?tab=posts").await.unwrap();
    let current = router.current_route();
    assert_eq!(current.full_path, "/users/5?tab=posts");
    assert_eq!(current.redirected_from.as_ref().unwrap().path, "/u/5");

    router.push("/me#settings").await.unwrap();
    assert_eq!(router.current_route().full_path, "/users/self#settings");
}

#[tokio::test]
async fn test_redirect_loop_is_detected() {
    common::init_tracing();
    let config = RouterConfig {
        max_redirects: 4,
        ..RouterConfig::default()
    };
    let router = Router::builder(MemoryHistory::new())
        .with_config(config)
        .with_route(RouteRecordRaw::new("/").with_component(RouteComponent::new("Home")))
        .with_route(RouteRecordRaw::new("/ping").with_redirect("/pong"))
        .with_route(RouteRecordRaw::new("/pong").with_redirect("/ping"))
        .build()
        .unwrap();
    router.init().await.unwrap();

    let err = router.push("/ping").await.unwrap_err();
    assert!(matches!(err, RouterError::InfiniteRedirect { limit: 4, .. }));
    assert_eq!(router.current_route().path, "/");
}

#[tokio::test]
async fn test_guard_redirect_loop_is_detected() {
    let (router, _) = started_router().await;
    router.before_each(guard_fn(|to, _from| async move {
        let next = if to.path == "/x" { "/y" } else { "/x" };
        Ok(GuardResult::redirect(next))
    }));

    let err = router.push("/x").await.unwrap_err();
    assert!(matches!(err, RouterError::InfiniteRedirect { limit: 30, .. }));
}

#[tokio::test]
async fn test_redirect_needs_path_or_name() {
    let (router, _) = started_router().await;
    router.add_route(RouteRecordRaw::new("/nowhere").with_redirect(RouteLocationRaw::relative(RouteParams::new())))
        .unwrap();

    let err = router.push("/nowhere").await.unwrap_err();
    assert!(matches!(err, RouterError::InvalidRedirect { .. }));
}

// ========================================================================
// Duplicates and cancellation
// ========================================================================

#[tokio::test]
async fn test_duplicate_navigation_runs_no_guards() {
    let (router, history) = started_router().await;
    router.push("/users/1?tab=a").await.unwrap();

    let guards = Arc::new(AtomicUsize::new(0));
    router.before_each(counting_guard(&guards));
    let failures = Log::default();
    let seen = failures.clone();
    router.after_each(move |_to, _from, failure| {
        seen.push(format!("{:?}", failure.map(|f| f.kind)));
    });

    let failure = router.push("/users/1?tab=a").await.unwrap().unwrap();
    assert!(failure.is(NavigationFailureKind::Duplicated));
    assert_eq!(guards.load(Ordering::SeqCst), 0);
    assert_eq!(failures.entries(), vec!["Some(Duplicated)"]);

    // a different query is a different location
    assert!(router.push("/users/1?tab=b").await.unwrap().is_none());
    assert_eq!(guards.load(Ordering::SeqCst), 1);

    // force skips the check
    assert!(router
        .push(RouteLocationRaw::path("/users/1?tab=b").force())
        .await
        .unwrap()
        .is_none());
    assert_eq!(guards.load(Ordering::SeqCst), 2);
    assert_eq!(history.entries(), vec!["/", "/users/1?tab=a", "/users/1?tab=b", "/users/1?tab=b"]);
}

#[tokio::test]
async fn test_newer_navigation_cancels_pending_one() {
    let (router, history) = started_router().await;

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let (entered_tx, release_rx) = (entered.clone(), release.clone());
    router.before_each(guard_fn(move |to, _from| {
        let entered = entered_tx.clone();
        let release = release_rx.clone();
        async move {
            if to.path == "/x" {
                entered.notify_one();
                release.notified().await;
            }
            Ok(())
        }
    }));

    let slow = router.clone();
    let to_x = tokio::spawn(async move { slow.push("/x").await });
    entered.notified().await;

    assert!(router.push("/y").await.unwrap().is_none());
    release.notify_one();

    let failure = to_x.await.unwrap().unwrap().unwrap();
    assert!(failure.is(NavigationFailureKind::Cancelled));
    assert_eq!(failure.to.path, "/x");

    assert_eq!(router.current_route().path, "/y");
    assert_eq!(history.entries(), vec!["/", "/y"]);
}

// ========================================================================
// Errors and readiness
// ========================================================================

#[tokio::test]
async fn test_guard_error_reaches_error_handlers() {
    let (router, _) = started_router().await;
    router.before_each(guard_fn(|to, _from| async move {
        if to.path == "/x" {
            return Err(anyhow!("session store unavailable"));
        }
        Ok(true)
    }));

    let errors = Log::default();
    let seen = errors.clone();
    router.on_error(move |error, to, _from| seen.push(format!("{} {}", to.path, error)));

    let err = router.push("/x").await.unwrap_err();
    assert!(matches!(err, RouterError::Guard(_)));
    assert!(err.to_string().contains("session store unavailable"));
    assert_eq!(errors.entries(), vec!["/x session store unavailable"]);
    assert_eq!(router.current_route().path, "/");

    // readiness was settled by the first navigation
    router.is_ready().await.unwrap();
}

#[tokio::test]
async fn test_is_ready_waits_for_initial_navigation() {
    let (router, _) = app_router();
    assert!(matches!(router.ready_state(), ReadyState::Pending));

    let waiter = router.clone();
    let ready = tokio::spawn(async move { waiter.is_ready().await });

    router.init().await.unwrap();
    ready.await.unwrap().unwrap();
    assert!(matches!(router.ready_state(), ReadyState::Ready));
}

#[tokio::test]
async fn test_failed_initial_navigation_fails_readiness() {
    let (router, _) = app_router();
    router.before_each(guard_fn(|_to, _from| async { Err::<bool, _>(anyhow!("boom")) }));

    assert!(router.init().await.is_err());
    let err = router.is_ready().await.unwrap_err();
    assert!(matches!(err, RouterError::Guard(_)));
}

#[tokio::test]
async fn test_unmatched_initial_location_fails_readiness() {
    common::init_tracing();
    let router = Router::builder(MemoryHistory::with_location("/nope"))
        .with_routes(common::app_routes())
        .build()
        .unwrap();

    let waiter = router.clone();
    let ready = tokio::spawn(async move { waiter.is_ready().await });

    assert!(matches!(router.init().await, Err(RouterError::MatcherNotFound { .. })));
    let settled = tokio::time::timeout(Duration::from_secs(1), ready).await;
    let err = settled.expect("readiness settles").unwrap().unwrap_err();
    assert!(matches!(err, RouterError::MatcherNotFound { .. }));
    assert!(matches!(router.ready_state(), ReadyState::Failed(_)));
}

#[tokio::test]
async fn test_aborted_initial_navigation_marks_ready() {
    let (router, _) = app_router();
    router.before_each(guard_fn(|_to, _from| async { Ok(false) }));

    let failure = router.init().await.unwrap().unwrap();
    assert!(failure.is(NavigationFailureKind::Aborted));
    router.is_ready().await.unwrap();
    assert_eq!(router.current_route().matched.len(), 0);
}

#[tokio::test]
async fn test_removed_hooks_stop_running() {
    let (router, _) = started_router().await;
    let before = Arc::new(AtomicUsize::new(0));
    let resolve = Arc::new(AtomicUsize::new(0));
    let before_id = router.before_each(counting_guard(&before));
    let resolve_id = router.before_resolve(counting_guard(&resolve));
    let after = Arc::new(AtomicUsize::new(0));
    let counter = after.clone();
    let after_id = router.after_each(move |_to, _from, _failure| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    router.push("/x").await.unwrap();
    assert!(router.remove_before_each(before_id));
    assert!(router.remove_before_resolve(resolve_id));
    assert!(router.remove_after_each(after_id));
    assert!(!router.remove_after_each(after_id));
    router.push("/y").await.unwrap();

    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(resolve.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_scroll_behavior_sees_commits_and_duplicates() {
    common::init_tracing();
    let scrolls = Log::default();
    let seen = scrolls.clone();
    let router = Router::builder(MemoryHistory::new())
        .with_routes(common::app_routes())
        .with_scroll_behavior(move |to, from| seen.push(format!("{} <- {}", to.path, from.path)))
        .build()
        .unwrap();

    router.init().await.unwrap();
    router.push("/x").await.unwrap();
    router.push("/x").await.unwrap();

    assert_eq!(scrolls.entries(), vec!["/ <- /", "/x <- /", "/x <- /x"]);
}
