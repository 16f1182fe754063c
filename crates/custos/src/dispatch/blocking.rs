use std::sync::Arc;

use tracing::{debug, warn};

use super::{ListenerError, ListenerRegistry, WalletsClosedDispatch, WalletsClosedListener};
use crate::DISPATCH_TARGET;

/// Runs blocking listeners in registration order on the caller's thread.
///
/// Every listener runs even when an earlier one fails. Only the first failure
/// is returned; the others are logged and otherwise lost.
#[derive(Default)]
pub struct SyncDispatcher {
    registry: ListenerRegistry<WalletsClosedListener>,
}

impl SyncDispatcher {
    /// Creates a dispatcher with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener.
    pub fn register<F>(&self, listener: F)
    where
        F: Fn(&[String]) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.registry.register(Arc::new(listener));
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no listener has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Invokes every listener with `wallets`.
    pub fn dispatch(&self, wallets: &[String]) -> Result<(), ListenerError> {
        let mut first_failure = None;
        for (index, listener) in self.registry.snapshot().into_iter().enumerate() {
            if let Err(error) = listener(wallets) {
                warn!(
                    target: DISPATCH_TARGET,
                    index,
                    error = %error,
                    "wallet-closed listener failed"
                );
                first_failure.get_or_insert(error);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

impl WalletsClosedDispatch for SyncDispatcher {
    fn dispatch_closed(&self, wallets: &[String]) {
        match self.dispatch(wallets) {
            Ok(()) => debug!(
                target: DISPATCH_TARGET,
                listeners = self.len(),
                wallets = ?wallets,
                "wallet-closed listeners notified"
            ),
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                error = %error,
                "wallet-closed dispatch finished with failures"
            ),
        }
    }
}
