/// In-memory history
///
/// Keeps a list of entries and a cursor. Cloning shares the same entries,
/// so a test can keep a handle after giving one to the router.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{
    HistoryListener, NavigationDirection, NavigationInformation, NavigationType, RouterHistory,
    Unsubscribe,
};
use crate::location::HistoryState;

const START: &str = "/";

struct Entry {
    location: String,
    state: Option<HistoryState>,
}

impl Entry {
    fn start() -> Self {
        Self {
            location: START.to_string(),
            state: None,
        }
    }
}

struct MemoryState {
    entries: Vec<Entry>,
    position: usize,
    listeners: Vec<(u64, HistoryListener)>,
    next_listener: u64,
}

#[derive(Clone)]
pub struct MemoryHistory {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryHistory {
    /// Starts with a single `/` entry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                entries: vec![Entry::start()],
                position: 0,
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// Starts at `location` instead of `/`
    pub fn with_location(location: impl Into<String>) -> Self {
        let history = Self::new();
        history.inner.lock().entries[0].location = location.into();
        history
    }

    /// Every entry, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.inner.lock().entries.iter().map(|e| e.location.clone()).collect()
    }

    pub fn position(&self) -> usize {
        self.inner.lock().position
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterHistory for MemoryHistory {
    fn location(&self) -> String {
        let state = self.inner.lock();
        state.entries[state.position].location.clone()
    }

    fn state(&self) -> Option<HistoryState> {
        let state = self.inner.lock();
        state.entries[state.position].state.clone()
    }

    fn push(&self, to: &str, state: Option<HistoryState>) {
        let mut inner = self.inner.lock();
        let keep = inner.position + 1;
        inner.entries.truncate(keep);
        inner.entries.push(Entry {
            location: to.to_string(),
            state,
        });
        let last = inner.entries.len() - 1;
        inner.position = last;
        trace!(to, position = inner.position, "history push");
    }

    fn replace(&self, to: &str, state: Option<HistoryState>) {
        let mut inner = self.inner.lock();
        let position = inner.position;
        inner.entries[position] = Entry {
            location: to.to_string(),
            state,
        };
        trace!(to, position, "history replace");
    }

    fn go(&self, delta: i32, trigger_listeners: bool) {
        let (to, from, moved, listeners) = {
            let mut inner = self.inner.lock();
            let from = inner.entries[inner.position].location.clone();
            let last = inner.entries.len() as i64 - 1;
            let position = inner.position as i64;
            let target = (position + i64::from(delta)).clamp(0, last);
            inner.position = target as usize;
            let to = inner.entries[inner.position].location.clone();
            let listeners: Vec<HistoryListener> = inner.listeners.iter().map(|(_, l)| l.clone()).collect();
            // clamping only shrinks the move, so it fits in i32
            (to, from, (target - position) as i32, listeners)
        };
        trace!(delta, moved, to = %to, "history go");

        if trigger_listeners {
            // listeners see the move that happened, not the one requested
            let info = NavigationInformation {
                kind: NavigationType::Pop,
                direction: match moved {
                    d if d < 0 => NavigationDirection::Back,
                    d if d > 0 => NavigationDirection::Forward,
                    _ => NavigationDirection::Unknown,
                },
                delta: moved,
            };
            for listener in listeners {
                listener(&to, &from, info);
            }
        }
    }

    fn listen(&self, listener: HistoryListener) -> Unsubscribe {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_listener;
            inner.next_listener += 1;
            inner.listeners.push((id, listener));
            id
        };

        let inner = Arc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.lock().listeners.retain(|(entry, _)| *entry != id);
            }
        })
    }

    fn destroy(&self) {
        let mut inner = self.inner.lock();
        inner.listeners.clear();
        inner.entries = vec![Entry::start()];
        inner.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::new();
        history.push("/a", None);
        history.push("/b", None);
        history.go(-1, false);
        history.push("/c", None);
        assert_eq!(history.entries(), vec!["/", "/a", "/c"]);
        assert_eq!(history.location(), "/c");
    }

    #[test]
    fn test_replace_keeps_position() {
        let history = MemoryHistory::new();
        history.push("/a", Some(serde_json::json!({ "scroll": 10 })));
        history.replace("/b", None);
        assert_eq!(history.entries(), vec!["/", "/b"]);
        assert_eq!(history.state(), None);
    }

    #[test]
    fn test_go_clamps_and_notifies() {
        let history = MemoryHistory::new();
        history.push("/a", None);
        let seen = Arc::new(PlMutex::new(Vec::new()));

        let sink = seen.clone();
        let unsubscribe = history.listen(Arc::new(move |to: &str, from: &str, info: NavigationInformation| {
            sink.lock().push((to.to_string(), from.to_string(), info.direction, info.delta));
        }));

        history.go(-5, true);
        assert_eq!(history.location(), "/");
        history.go(1, false);

        assert_eq!(
            *seen.lock(),
            vec![("/".to_string(), "/a".to_string(), NavigationDirection::Back, -1)]
        );

        unsubscribe();
        assert_eq!(history.listener_count(), 0);
    }

    #[test]
    fn test_go_past_the_start_reports_no_move() {
        let history = MemoryHistory::new();
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = seen.clone();
        let _unsubscribe = history.listen(Arc::new(move |_to: &str, _from: &str, info: NavigationInformation| {
            sink.lock().push(info);
        }));

        history.go(-2, true);
        assert_eq!(history.position(), 0);
        let info = seen.lock()[0];
        assert_eq!(info.delta, 0);
        assert_eq!(info.direction, NavigationDirection::Unknown);
    }

    #[test]
    fn test_destroy_resets() {
        let history = MemoryHistory::with_location("/start");
        assert_eq!(history.location(), "/start");
        history.push("/a", None);
        history.destroy();
        assert_eq!(history.entries(), vec!["/"]);
    }
}
