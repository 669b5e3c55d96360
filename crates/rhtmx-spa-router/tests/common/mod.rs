//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use rhtmx_spa_router::*;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Ordered record of which hooks ran
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Guard that records `label` and lets the navigation through
    pub fn guard(&self, label: &str) -> BoxedGuard {
        let log = self.clone();
        let label = label.to_string();
        guard_fn(move |_to, _from| {
            log.push(label.clone());
            async { Ok(()) }
        })
    }
}

/// `/`, `/login`, `/x`, `/y` and `/users` with `new` and `:id` children
pub fn app_routes() -> Vec<RouteRecordRaw> {
    vec![
        RouteRecordRaw::new("/").with_name("home").with_component(RouteComponent::new("Home")),
        RouteRecordRaw::new("/login")
            .with_name("login")
            .with_component(RouteComponent::new("Login")),
        RouteRecordRaw::new("/x").with_name("x").with_component(RouteComponent::new("X")),
        RouteRecordRaw::new("/y").with_name("y").with_component(RouteComponent::new("Y")),
        RouteRecordRaw::new("/users")
            .with_name("users")
            .with_component(RouteComponent::new("UsersLayout"))
            .with_children([
                RouteRecordRaw::new("new")
                    .with_name("new-user")
                    .with_component(RouteComponent::new("NewUser")),
                RouteRecordRaw::new(":id")
                    .with_name("user")
                    .with_component(RouteComponent::new("User")),
            ]),
    ]
}

pub fn app_router() -> (Router, MemoryHistory) {
    init_tracing();
    let history = MemoryHistory::new();
    let router = Router::builder(history.clone())
        .with_routes(app_routes())
        .build()
        .expect("app routes are valid");
    (router, history)
}

/// Router that already completed its initial navigation to `/`
pub async fn started_router() -> (Router, MemoryHistory) {
    let (router, history) = app_router();
    router.init().await.expect("initial navigation");
    (router, history)
}
