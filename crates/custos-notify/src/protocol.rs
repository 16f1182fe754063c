//! Wire format of custodian notifications.
//!
//! Each notification is a single JSON object terminated by a newline:
//!
//! ```text
//! {"name":"http_listening","value":{"type":"HTTP","address":"127.0.0.1","port":8093}}
//! {"name":"already_running","value":{"connection":{"address":"127.0.0.1","port":8093},"pid":4242}}
//! {"name":"attempt_closing_wallets","value":{"wallets":["alice","bob"]}}
//! ```

use custos_config::HttpEndpoint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A decoded notification pushed by the custodian.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "name", content = "value", rename_all = "snake_case")]
pub enum Notification {
    /// The custodian's webserver accepts RPC requests.
    HttpListening(ListeningPayload),
    /// Another custodian already owns the requested endpoint.
    AlreadyRunning(ConflictPayload),
    /// Wallets are about to be force-locked.
    AttemptClosingWallets(WalletsClosingPayload),
    /// The custodian reported an internal failure.
    Error(ErrorPayload),
    /// The custodian's status changed.
    StatusChange(StatusPayload),
}

impl Notification {
    /// Decodes one newline-delimited notification.
    pub fn decode(line: &[u8]) -> Result<Self, ProtocolError> {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return Err(ProtocolError::Empty);
        }
        serde_json::from_slice(trimmed).map_err(ProtocolError::Decode)
    }

    /// Encodes the notification followed by a newline.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = serde_json::to_vec(self).map_err(ProtocolError::Encode)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HttpListening(_) => "http_listening",
            Self::AlreadyRunning(_) => "already_running",
            Self::AttemptClosingWallets(_) => "attempt_closing_wallets",
            Self::Error(_) => "error",
            Self::StatusChange(_) => "status_change",
        }
    }
}

/// Address of a listening webserver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListeningPayload {
    /// Transport label reported by the custodian, usually `HTTP`.
    #[serde(rename = "type", default = "default_transport")]
    pub transport: String,
    /// Bound host.
    pub address: String,
    /// Bound port.
    pub port: u16,
}

fn default_transport() -> String {
    String::from("HTTP")
}

impl ListeningPayload {
    /// Builds a payload for an HTTP endpoint.
    #[must_use]
    pub fn http(endpoint: &HttpEndpoint) -> Self {
        Self {
            transport: default_transport(),
            address: endpoint.host().to_owned(),
            port: endpoint.port(),
        }
    }

    /// The endpoint this payload describes.
    #[must_use]
    pub fn endpoint(&self) -> HttpEndpoint {
        HttpEndpoint::new(self.address.clone(), self.port)
    }
}

/// Identity of a custodian that already owns the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConflictPayload {
    /// Endpoint the rival instance serves.
    pub connection: ListeningPayload,
    /// Process id of the rival instance.
    pub pid: u32,
}

/// Wallets the custodian is about to lock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WalletsClosingPayload {
    /// Names of the affected wallets.
    pub wallets: Vec<String>,
}

/// Diagnostic emitted by the custodian.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorPayload {
    /// Human-readable description.
    pub message: String,
    /// Any further fields sent alongside the message.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Status report emitted by the custodian.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusPayload {
    /// Status label.
    pub status: String,
    /// Any further fields sent alongside the status.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Errors raised while decoding or encoding notifications.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line held only whitespace.
    #[error("empty notification line")]
    Empty,
    /// The line was not a recognised notification.
    #[error("failed to decode notification: {0}")]
    Decode(#[source] serde_json::Error),
    /// The notification could not be serialised.
    #[error("failed to encode notification: {0}")]
    Encode(#[source] serde_json::Error),
}
