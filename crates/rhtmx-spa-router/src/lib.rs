//! # RHTMX SPA Router
//!
//! Client-side routing core for single-page RHTMX apps:
//! - Route matching with ranked path templates (`/users/:id`, `/files/:path+`,
//!   `/posts/:id(\d+)?`)
//! - Nested records, aliases, named routes and record redirects
//! - An async navigation guard pipeline (leave, before-each, update,
//!   before-enter, enter, before-resolve)
//! - A pluggable history contract with an in-memory implementation
//!
//! ## Matching
//!
//! Every template compiles to a regex plus a score. Records are kept sorted
//! by score so the first record whose regex matches wins:
//! - Static segments beat params (`/users/new` over `/users/:id`)
//! - Custom regexes beat plain params
//! - Optional, repeatable and catch-all params rank last
//!
//! ## Navigation
//!
//! A navigation resolves its target, follows record redirects, skips
//! duplicates and runs the guards one at a time. Only the latest navigation
//! may commit; an older one settles as cancelled.
//!
//! ## Example
//!
//! ```
//! use rhtmx_spa_router::{guard_fn, GuardResult, MemoryHistory, RouteComponent, RouteLocationRaw, RouteRecordRaw, Router};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let router = Router::builder(MemoryHistory::new())
//!     .with_route(RouteRecordRaw::new("/").with_component(RouteComponent::new("Home")))
//!     .with_route(
//!         RouteRecordRaw::new("/login")
//!             .with_name("login")
//!             .with_component(RouteComponent::new("Login")),
//!     )
//!     .with_route(
//!         RouteRecordRaw::new("/admin")
//!             .with_component(RouteComponent::new("Admin"))
//!             .with_meta("requires_auth", true),
//!     )
//!     .build()
//!     .unwrap();
//!
//! router.before_each(guard_fn(|to, _from| async move {
//!     if to.meta.contains_key("requires_auth") {
//!         Ok(GuardResult::redirect(RouteLocationRaw::named("login")))
//!     } else {
//!         Ok(GuardResult::Continue)
//!     }
//! }));
//!
//! router.init().await.unwrap();
//! router.push("/admin").await.unwrap();
//!
//! let current = router.current_route();
//! assert_eq!(current.full_path, "/login");
//! assert_eq!(current.redirected_from.as_ref().unwrap().full_path, "/admin");
//! # });
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
pub mod error;
pub mod guards;
pub mod history;
pub mod location;
pub mod matcher;
pub mod navigation;
pub mod path;
pub mod query;
pub mod record;
pub mod route;
pub mod router;

// Re-export commonly used types
pub use config::{PathParserOptions, RouterConfig};
pub use error::{NavigationFailure, NavigationFailureKind, RouterError};
pub use guards::{guard_fn, BoxedGuard, GuardResult, HookId, InstanceHandle, NavigationGuard};
pub use history::{
    HistoryListener, MemoryHistory, NavigationDirection, NavigationInformation, NavigationType, RouterHistory,
};
pub use location::{
    is_same_route_location, params, ParamValue, RouteLocation, RouteLocationRaw, RouteParams, RouteTarget,
};
pub use matcher::{RouteRef, RouterMatcher};
pub use navigation::{extract_changing_records, ChangingRecords};
pub use query::{DefaultQueryCodec, LocationQuery, QueryCodec, QueryValue};
pub use record::{RecordId, RouteComponent, RouteRecord, RouteRecordRaw, RouteRedirect};
pub use router::{NavigationResult, ReadyState, Router, RouterBuilder};
