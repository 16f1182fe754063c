//! Settings describing one custodian process.

use std::net::SocketAddr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::endpoint::HttpEndpoint;

/// Endpoints, working directory and session token of a custodian process.
///
/// The lifecycle coordinator fills in the notification endpoint each time it
/// starts the process and replaces an ephemeral RPC endpoint with the one the
/// custodian reports. Callers only ever see snapshots.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProcessSettings {
    notification_endpoint: Option<SocketAddr>,
    rpc_endpoint: HttpEndpoint,
    working_directory: Utf8PathBuf,
    session_token: Option<String>,
}

impl ProcessSettings {
    /// Settings for a custodian rooted at `working_directory` that picks its
    /// own RPC port.
    #[must_use]
    pub fn new(working_directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            notification_endpoint: None,
            rpc_endpoint: HttpEndpoint::ephemeral(),
            working_directory: working_directory.into(),
            session_token: None,
        }
    }

    /// Pre-assigns the RPC endpoint.
    #[must_use]
    pub fn with_rpc_endpoint(mut self, endpoint: HttpEndpoint) -> Self {
        self.rpc_endpoint = endpoint;
        self
    }

    /// Attaches a session token to hand to RPC clients.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Address of the notification server, once allocated.
    #[must_use]
    pub const fn notification_endpoint(&self) -> Option<SocketAddr> {
        self.notification_endpoint
    }

    /// RPC endpoint, possibly still ephemeral.
    #[must_use]
    pub const fn rpc_endpoint(&self) -> &HttpEndpoint {
        &self.rpc_endpoint
    }

    /// Directory the custodian keeps its wallets in.
    #[must_use]
    pub fn working_directory(&self) -> &Utf8Path {
        &self.working_directory
    }

    /// Session token, when one has been assigned.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Records the freshly allocated notification endpoint.
    pub fn assign_notification_endpoint(&mut self, address: SocketAddr) {
        self.notification_endpoint = Some(address);
    }

    /// Forgets the notification endpoint of a finished run cycle.
    pub fn clear_notification_endpoint(&mut self) {
        self.notification_endpoint = None;
    }

    /// Records the RPC endpoint the custodian actually bound.
    pub fn resolve_rpc_endpoint(&mut self, endpoint: HttpEndpoint) {
        self.rpc_endpoint = endpoint;
    }
}
