//! JSON-RPC 2.0 envelopes used on the custodian's webserver.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RpcFailure;

/// Request id source owned by one channel.
///
/// Ids start at 1 and increase by one per request.
#[derive(Debug)]
pub struct RequestIds {
    next: AtomicI64,
}

impl Default for RequestIds {
    fn default() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }
}

impl RequestIds {
    /// Builds a request carrying the next id.
    #[must_use]
    pub fn request(&self, method: impl Into<String>, params: Value) -> JsonRpcRequest {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        JsonRpcRequest::with_id(id, method, params)
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request id echoed by the response.
    pub id: i64,
    /// Method such as `beekeeper_api.open`.
    pub method: String,
    /// Named parameters.
    pub params: Value,
}

impl JsonRpcRequest {
    /// Request with an explicit id.
    #[must_use]
    pub fn with_id(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version.
    pub jsonrpc: String,
    /// Id of the request this answers.
    pub id: Option<i64>,
    /// Result on success.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Collapses the envelope into the call outcome.
    ///
    /// The custodian puts its assertion text in `error.data.message` when it
    /// has one; that text is what detectors match against.
    pub fn into_result(self) -> Result<Value, RpcFailure> {
        match (self.error, self.result) {
            (Some(error), _) => Err(RpcFailure::request(error.detail())),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Short message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default)]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn detail(&self) -> String {
        self.data
            .as_ref()
            .and_then(|data| data.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| self.message.clone(), |detail| format!("{}: {detail}", self.message))
    }
}
