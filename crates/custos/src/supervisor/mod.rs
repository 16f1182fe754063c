//! Process supervision seam.
//!
//! The coordinator never touches `std::process` directly: it asks a
//! [`ProcessSupervisor`] to spawn the custodian and receives an opaque
//! [`CustodianProcess`] it can query and stop. [`LocalSupervisor`] runs the
//! custodian binary on this machine; tests substitute in-process fakes.

mod local;

use std::fmt;
use std::io;

use camino::Utf8Path;
use custos_config::ProcessSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::{DEFAULT_STOP_GRACE, LocalSupervisor};

/// Spawns custodian processes and runs one-shot custodian commands.
pub trait ProcessSupervisor: Send + Sync {
    /// Starts a custodian configured by `settings`.
    ///
    /// The notification endpoint in `settings` is always populated by the
    /// coordinator before this is called.
    fn spawn(&self, settings: &ProcessSettings)
    -> Result<Box<dyn CustodianProcess>, SupervisorError>;

    /// Exports the key pairs of `wallet` to `destination`.
    fn export_keys(
        &self,
        working_directory: &Utf8Path,
        wallet: &str,
        password: &str,
        destination: &Utf8Path,
    ) -> Result<Vec<KeyPair>, SupervisorError>;
}

/// A spawned custodian.
pub trait CustodianProcess: Send {
    /// Operating system process id.
    fn pid(&self) -> u32;

    /// Whether the process has not exited yet.
    fn is_running(&mut self) -> bool;

    /// Terminates the process, escalating after a grace period.
    fn stop(&mut self) -> Result<(), SupervisorError>;
}

/// Key pair exported from a wallet.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyPair {
    /// Public key in its prefixed text form.
    pub public_key: String,
    /// Private key in wallet import format.
    pub wif_private_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("wif_private_key", &"<redacted>")
            .finish()
    }
}

/// Errors raised by process supervisors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The custodian binary could not be found.
    #[error("custodian binary not found: {binary}")]
    BinaryNotFound {
        binary: String,
        #[source]
        source: io::Error,
    },
    /// The custodian could not be spawned.
    #[error("failed to spawn custodian '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    /// The working directory could not be prepared.
    #[error("failed to prepare working directory {path}: {source}")]
    WorkingDirectory {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Signalling the process failed.
    #[error("failed to signal custodian pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },
    /// Waiting for the process failed.
    #[error("failed to wait for custodian pid {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },
    /// Talking to a one-shot export process failed.
    #[error("failed to run key export for wallet '{wallet}': {source}")]
    ExportIo {
        wallet: String,
        #[source]
        source: io::Error,
    },
    /// The export process exited unsuccessfully.
    #[error("key export for wallet '{wallet}' failed (status: {status:?}): {stderr}")]
    ExportFailed {
        wallet: String,
        status: Option<i32>,
        stderr: String,
    },
    /// The exported key file could not be decoded.
    #[error("failed to decode exported keys for wallet '{wallet}': {source}")]
    ExportDecode {
        wallet: String,
        #[source]
        source: serde_json::Error,
    },
}
