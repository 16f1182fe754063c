use std::sync::{Mutex, MutexGuard};

/// Insertion-ordered listener list that only grows.
#[derive(Debug)]
pub struct ListenerRegistry<L> {
    listeners: Mutex<Vec<L>>,
}

impl<L> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<L: Clone> ListenerRegistry<L> {
    /// Appends a listener.
    pub fn register(&self, listener: L) {
        self.lock().push(listener);
    }

    /// Copy of the current listeners, taken so dispatch runs without the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<L> {
        self.lock().clone()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listener has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<L>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
