//! RPC channel seam.
//!
//! The transport that carries requests to the custodian is external; this
//! module defines what a call looks like to the rest of the crate and how a
//! failed call is described.

mod jsonrpc;

use serde_json::Value;
use thiserror::Error;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestIds};

/// A failed RPC call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcFailure {
    /// The custodian executed the request and reported an error.
    #[error("custodian request failed: {message}")]
    Request { message: String },
    /// The request or response did not match the expected structure.
    #[error("schema validation failed for {field}: {message}")]
    Schema { field: String, message: String },
}

impl RpcFailure {
    /// Failure reported by the custodian.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Structural validation failure of `field`.
    #[must_use]
    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Error text as reported.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Request { message } | Self::Schema { message, .. } => message,
        }
    }

    /// Whether this is a schema validation failure.
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}

/// Request/response channel to a running custodian.
pub trait RpcChannel: Send + Sync {
    /// Invokes `method` with `params` and returns the `result` member.
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcFailure>;
}

impl<T: RpcChannel + ?Sized> RpcChannel for &T {
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        (**self).call(method, params)
    }
}
