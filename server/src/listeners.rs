//! Subscribe/fan-out registry shared by the lobby and by each match.
//!
//! Callbacks are plain `Fn()` closures; subscribers learn *that* something
//! changed and query the source themselves. The registry takes its own lock
//! only to snapshot the subscriber list, then invokes the callbacks outside
//! every lock, so a callback may freely dispatch back into the match or
//! lobby that notified it.

use std::sync::{Arc, Mutex};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// A set of change listeners with stable ids for later removal.
#[derive(Default)]
pub struct ListenerSet {
    inner: Mutex<Registry>,
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Registry {
    next_id: usize,
    entries: Vec<(usize, Listener)>,
}

impl ListenerSet {
    pub fn new() -> ListenerSet {
        ListenerSet::default()
    }

    /// Registers a callback and returns a token that [`unsubscribe`] accepts.
    ///
    /// [`unsubscribe`]: ListenerSet::unsubscribe
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> usize {
        let mut registry = self.inner.lock().unwrap();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(listener)));
        id
    }

    /// Removes a previously registered callback; removing twice is a no-op.
    pub fn unsubscribe(&self, id: usize) {
        let mut registry = self.inner.lock().unwrap();
        registry.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    /// Invokes every currently registered callback. The subscriber list is
    /// snapshotted under the registry lock; the callbacks run outside it.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = {
            let registry = self.inner.lock().unwrap();
            registry
                .entries
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in snapshot {
            listener();
        }
    }
}
