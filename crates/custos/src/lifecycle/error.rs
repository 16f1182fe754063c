//! Error types for custodian lifecycle operations.

use std::time::Duration;

use custos_config::HttpEndpoint;
use custos_notify::ServerError;
use thiserror::Error;

use super::LifecycleState;
use crate::supervisor::SupervisorError;

/// Errors raised while starting, stopping or querying a custodian.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot {operation} a custodian that is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },
    #[error("custodian did not report readiness within {} ms", .timeout.as_millis())]
    NotReady { timeout: Duration },
    #[error("another custodian is already running at {address} (pid {pid})")]
    AlreadyRunning { address: HttpEndpoint, pid: u32 },
    #[error("custodian is not running")]
    NotRunning,
    #[error("remote custodians have no local process")]
    NoLocalProcess,
    #[error("remote custodian needs a concrete RPC endpoint, got {endpoint}")]
    MissingRpcEndpoint { endpoint: HttpEndpoint },
    #[error("custodian was never started, so there are no settings to reuse")]
    NeverStarted,
    #[error("{operation} is not supported for remote custodians")]
    NotSupported { operation: &'static str },
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("notification server failed: {0}")]
    Notification(#[from] ServerError),
    #[error("lifecycle task failed: {message}")]
    TaskFailed { message: String },
    #[error("no tokio runtime available: {message}")]
    NoRuntime { message: String },
}
