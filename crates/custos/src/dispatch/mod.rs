//! Wallet-closed callback dispatch.
//!
//! When the custodian announces that it is about to lock wallets, every
//! listener registered on the handle is told which wallets are affected. The
//! blocking facade runs listeners one after another on the notification
//! reader thread ([`SyncDispatcher`]); the concurrent facade runs their futures
//! on a tokio runtime behind a bounded worker pool ([`AsyncDispatcher`]).
//!
//! Listeners run while the handle's transition lock may be held by `close`,
//! so a listener must not call `start`, `close` or `restart` on the same
//! handle synchronously.

mod blocking;
mod concurrent;
mod registry;

use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

pub use blocking::SyncDispatcher;
pub use concurrent::{AsyncDispatcher, DispatchReport, ListenerFailure};
pub use registry::ListenerRegistry;

/// Blocking wallet-closed listener.
pub type WalletsClosedListener = Arc<dyn Fn(&[String]) -> Result<(), ListenerError> + Send + Sync>;

/// Future-returning wallet-closed listener.
pub type AsyncWalletsClosedListener =
    Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, Result<(), ListenerError>> + Send + Sync>;

/// Failure reported by a wallet-closed listener.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("wallet-closed listener failed: {message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    /// Wraps a failure description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Dispatch strategy invoked by the notification sink.
pub trait WalletsClosedDispatch: Send + Sync {
    /// Notifies every listener that `wallets` are being closed.
    ///
    /// Outcomes are logged; nothing is returned to the reader thread.
    fn dispatch_closed(&self, wallets: &[String]);
}
