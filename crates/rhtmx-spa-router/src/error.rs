/// Router errors and navigation failures
///
/// [`RouterError`] is for things that went wrong: bad templates, unknown
/// targets, throwing guards. [`NavigationFailure`] is the expected outcome of
/// a navigation that did not complete (aborted, superseded, redundant) and is
/// returned as a value.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::location::{RouteLocation, RouteLocationRaw};

#[derive(Debug, Clone, Error)]
pub enum RouterError {
    #[error("no route matches {location}")]
    MatcherNotFound { location: String },

    #[error("invalid route path {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(
        "alias {alias:?} of {original:?} must declare exactly the same params \
         (original: {original_params:?}, alias: {alias_params:?})"
    )]
    AliasParamMismatch {
        original: String,
        alias: String,
        original_params: Vec<String>,
        alias_params: Vec<String>,
    },

    #[error("missing required param {param:?} for {path:?}")]
    MissingParam { param: String, path: String },

    #[error("param {param:?} of {path:?} is not repeatable but received a list")]
    NotRepeatable { param: String, path: String },

    #[error("invalid redirect from {from:?}: the target needs a path or a name")]
    InvalidRedirect { from: String },

    #[error("detected an infinite redirection from {from:?} to {to:?} (limit {limit})")]
    InfiniteRedirect { from: String, to: String, limit: usize },

    #[error("parent route {0:?} does not exist")]
    UnknownParent(String),

    #[error("navigation guard failed: {0}")]
    Guard(Arc<anyhow::Error>),

    #[error("router configuration error: {0}")]
    Config(String),
}

impl RouterError {
    pub(crate) fn not_found(location: impl Into<String>) -> Self {
        RouterError::MatcherNotFound { location: location.into() }
    }
}

/// Why a navigation did not commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationFailureKind {
    /// A guard returned `false`
    Aborted,
    /// A newer navigation started before this one finished
    Cancelled,
    /// The target equals the current location
    Duplicated,
    /// A guard redirected elsewhere; only seen internally, the router
    /// follows the redirect and reports the final outcome instead
    Redirected,
}

/// A navigation that ended without committing
#[derive(Debug, Clone)]
pub struct NavigationFailure {
    pub kind: NavigationFailureKind,
    pub from: Arc<RouteLocation>,
    pub to: Arc<RouteLocation>,
    /// Target of a guard redirect, set for [`NavigationFailureKind::Redirected`]
    pub redirect_to: Option<Box<RouteLocationRaw>>,
}

impl NavigationFailure {
    pub fn new(kind: NavigationFailureKind, from: Arc<RouteLocation>, to: Arc<RouteLocation>) -> Self {
        Self { kind, from, to, redirect_to: None }
    }

    pub(crate) fn redirected(
        from: Arc<RouteLocation>,
        to: Arc<RouteLocation>,
        target: RouteLocationRaw,
    ) -> Self {
        Self {
            kind: NavigationFailureKind::Redirected,
            from,
            to,
            redirect_to: Some(Box::new(target)),
        }
    }

    pub fn is(&self, kind: NavigationFailureKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for NavigationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (from, to) = (&self.from.full_path, &self.to.full_path);
        match self.kind {
            NavigationFailureKind::Aborted => {
                write!(f, "navigation aborted from {from:?} to {to:?} via a navigation guard")
            }
            NavigationFailureKind::Cancelled => {
                write!(f, "navigation cancelled from {from:?} to {to:?} with a new navigation")
            }
            NavigationFailureKind::Duplicated => {
                write!(f, "avoided redundant navigation to current location {from:?}")
            }
            NavigationFailureKind::Redirected => {
                write!(f, "redirected from {from:?} to {to:?} via a navigation guard")
            }
        }
    }
}

impl std::error::Error for NavigationFailure {}
