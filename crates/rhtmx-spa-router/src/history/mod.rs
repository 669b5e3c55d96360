/// History collaborator
///
/// The router never touches a real URL bar. It talks to a [`RouterHistory`]
/// that stores entries and reports back/forward moves ("pop" navigations)
/// to registered listeners. [`MemoryHistory`] is the in-process
/// implementation used on the server and in tests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::location::HistoryState;

pub mod memory;
pub use memory::MemoryHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
    Pop,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirection {
    Back,
    Forward,
    Unknown,
}

/// Details of a history move reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationInformation {
    #[serde(rename = "type")]
    pub kind: NavigationType,
    pub direction: NavigationDirection,
    /// Entries actually moved; negative is backwards, zero when unknown or
    /// when the move was clamped to nothing
    pub delta: i32,
}

/// Called with `(to, from, info)` on every pop navigation
pub type HistoryListener = Arc<dyn Fn(&str, &str, NavigationInformation) + Send + Sync>;

/// Removes the listener it was returned for
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Entry storage the router writes to and listens on
///
/// Locations are full paths (path, query and hash) without any base.
pub trait RouterHistory: Send + Sync {
    /// Current location
    fn location(&self) -> String;

    /// State of the current entry
    fn state(&self) -> Option<HistoryState>;

    /// Adds an entry after the current one, dropping any forward entries
    fn push(&self, to: &str, state: Option<HistoryState>);

    /// Overwrites the current entry
    fn replace(&self, to: &str, state: Option<HistoryState>);

    /// Moves through the entries; listeners run only when `trigger_listeners` is set
    fn go(&self, delta: i32, trigger_listeners: bool);

    fn listen(&self, listener: HistoryListener) -> Unsubscribe;

    /// Drops listeners and resets the entries
    fn destroy(&self);
}
