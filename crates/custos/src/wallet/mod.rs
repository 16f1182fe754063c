//! Typed wallet calls over an [`RpcChannel`].
//!
//! Every call validates its inputs before anything is sent and attaches the
//! detectors for the failures it can produce, so callers match on
//! [`DetectedError`](crate::detect::DetectedError) rather than on custodian
//! text.

mod schema;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::WALLET_TARGET;
use crate::detect::{CallError, Detector, guard, guard_any};
use crate::rpc::{RpcChannel, RpcFailure};

pub use schema::{
    ACCOUNT_NAME_FIELD, DIGEST_FIELD, PUBLIC_KEY_FIELD, WIF_FIELD, validate_account_name,
    validate_digest, validate_public_key, validate_wif,
};

const API: &str = "beekeeper_api";
const RESULT_FIELD: &str = "result";

/// A wallet as listed by the custodian.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletInfo {
    /// Wallet name.
    pub name: String,
    /// Whether the wallet is unlocked in the session.
    pub unlocked: bool,
}

#[derive(Deserialize)]
struct TokenResult {
    token: String,
}

#[derive(Deserialize)]
struct PasswordResult {
    password: String,
}

#[derive(Deserialize)]
struct PublicKeyResult {
    public_key: String,
}

#[derive(Deserialize)]
struct WalletsResult {
    wallets: Vec<WalletInfo>,
}

#[derive(Deserialize)]
struct KeysResult {
    keys: Vec<PublicKeyResult>,
}

#[derive(Deserialize)]
struct SignatureResult {
    signature: String,
}

/// Wallet operations against a running custodian.
#[derive(Debug, Clone)]
pub struct WalletClient<R> {
    channel: R,
}

impl<R: RpcChannel> WalletClient<R> {
    /// Client sending calls through `channel`.
    pub const fn new(channel: R) -> Self {
        Self { channel }
    }

    /// The underlying channel.
    pub const fn channel(&self) -> &R {
        &self.channel
    }

    /// Opens a session and returns its token.
    pub fn create_session(
        &self,
        salt: &str,
        notifications_endpoint: Option<&str>,
    ) -> Result<String, CallError> {
        let mut params = json!({ "salt": salt });
        if let Some(endpoint) = notifications_endpoint {
            params["notifications_endpoint"] = Value::from(endpoint);
        }
        self.invoke::<TokenResult>("create_session", params)
            .map(|result| result.token)
            .map_err(CallError::Rpc)
    }

    /// Closes the session identified by `token`.
    pub fn close_session(&self, token: &str) -> Result<(), CallError> {
        self.invoke_unit("close_session", json!({ "token": token }))
            .map_err(CallError::Rpc)
    }

    /// Creates `wallet_name`, returning its password.
    ///
    /// When `password` is `None` the custodian generates one.
    pub fn create(
        &self,
        token: &str,
        wallet_name: &str,
        password: Option<&str>,
    ) -> Result<String, CallError> {
        let mut params = json!({ "token": token, "wallet_name": wallet_name });
        if let Some(password) = password {
            params["password"] = Value::from(password);
        }
        guard_any(
            vec![
                Detector::wallet_already_exists(wallet_name),
                Detector::invalid_wallet_name(wallet_name),
            ],
            || self.invoke::<PasswordResult>("create", params),
        )
        .map(|result| result.password)
    }

    /// Opens `wallet_name` in the session.
    pub fn open(&self, token: &str, wallet_name: &str) -> Result<(), CallError> {
        guard_any(
            vec![
                Detector::no_wallet_with_such_name(wallet_name),
                Detector::invalid_wallet_name(wallet_name),
            ],
            || self.invoke_unit("open", json!({ "token": token, "wallet_name": wallet_name })),
        )
    }

    /// Closes `wallet_name` in the session.
    pub fn close(&self, token: &str, wallet_name: &str) -> Result<(), CallError> {
        guard(Detector::no_wallet_with_such_name(wallet_name), || {
            self.invoke_unit("close", json!({ "token": token, "wallet_name": wallet_name }))
        })
    }

    /// Unlocks `wallet_name` with `password`.
    pub fn unlock(&self, token: &str, wallet_name: &str, password: &str) -> Result<(), CallError> {
        guard_any(
            vec![
                Detector::invalid_password(wallet_name),
                Detector::no_wallet_with_such_name(wallet_name),
            ],
            || {
                self.invoke_unit(
                    "unlock",
                    json!({ "token": token, "wallet_name": wallet_name, "password": password }),
                )
            },
        )
    }

    /// Locks `wallet_name`.
    pub fn lock(&self, token: &str, wallet_name: &str) -> Result<(), CallError> {
        guard(Detector::no_wallet_with_such_name(wallet_name), || {
            self.invoke_unit("lock", json!({ "token": token, "wallet_name": wallet_name }))
        })
    }

    /// Locks every wallet in the session.
    pub fn lock_all(&self, token: &str) -> Result<(), CallError> {
        self.invoke_unit("lock_all", json!({ "token": token }))
            .map_err(CallError::Rpc)
    }

    /// Imports `wif_key` into `wallet_name`, returning its public key.
    pub fn import_key(
        &self,
        token: &str,
        wallet_name: &str,
        wif_key: &str,
    ) -> Result<String, CallError> {
        guard(Detector::invalid_schema_private_key(), || validate_wif(wif_key))?;
        guard_any(
            vec![
                Detector::invalid_private_key(wif_key),
                Detector::no_wallet_with_such_name(wallet_name),
            ],
            || {
                self.invoke::<PublicKeyResult>(
                    "import_key",
                    json!({ "token": token, "wallet_name": wallet_name, "wif_key": wif_key }),
                )
            },
        )
        .map(|result| result.public_key)
    }

    /// Removes `public_key` from `wallet_name`.
    pub fn remove_key(
        &self,
        token: &str,
        wallet_name: &str,
        public_key: &str,
    ) -> Result<(), CallError> {
        guard(Detector::invalid_schema_public_key(public_key), || {
            validate_public_key(public_key)
        })?;
        guard_any(
            vec![
                Detector::key_not_found(public_key),
                Detector::missing_prefix(public_key),
                Detector::invalid_public_key(public_key),
                Detector::no_wallet_with_such_name(wallet_name),
            ],
            || {
                self.invoke_unit(
                    "remove_key",
                    json!({ "token": token, "wallet_name": wallet_name, "public_key": public_key }),
                )
            },
        )
    }

    /// Lists the wallets known to the session.
    pub fn list_wallets(&self, token: &str) -> Result<Vec<WalletInfo>, CallError> {
        self.invoke::<WalletsResult>("list_wallets", json!({ "token": token }))
            .map(|result| result.wallets)
            .map_err(CallError::Rpc)
    }

    /// Public keys of unlocked wallets, or of `wallet_name` only.
    pub fn public_keys(
        &self,
        token: &str,
        wallet_name: Option<&str>,
    ) -> Result<Vec<String>, CallError> {
        let mut params = json!({ "token": token });
        let detectors = wallet_name.map_or_else(Vec::new, |name| {
            params["wallet_name"] = Value::from(name);
            vec![Detector::no_wallet_with_such_name(name)]
        });
        guard_any(detectors, || {
            self.invoke::<KeysResult>("get_public_keys", params)
        })
        .map(|result| result.keys.into_iter().map(|key| key.public_key).collect())
    }

    /// Signs the hex `digest` with the private half of `public_key`.
    pub fn sign_digest(
        &self,
        token: &str,
        wallet_name: &str,
        digest: &str,
        public_key: &str,
    ) -> Result<String, CallError> {
        validate_digest(digest).map_err(CallError::Rpc)?;
        guard(Detector::invalid_schema_public_key(public_key), || {
            validate_public_key(public_key)
        })?;
        guard_any(
            vec![
                Detector::key_not_found(public_key),
                Detector::no_wallet_with_such_name(wallet_name),
            ],
            || {
                self.invoke::<SignatureResult>(
                    "sign_digest",
                    json!({
                        "token": token,
                        "wallet_name": wallet_name,
                        "sig_digest": digest,
                        "public_key": public_key,
                    }),
                )
            },
        )
        .map(|result| result.signature)
    }

    fn invoke<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcFailure> {
        let value = self.send(method, params)?;
        serde_json::from_value(value)
            .map_err(|error| RpcFailure::schema(RESULT_FIELD, error.to_string()))
    }

    fn invoke_unit(&self, method: &str, params: Value) -> Result<(), RpcFailure> {
        self.send(method, params).map(drop)
    }

    fn send(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let method = format!("{API}.{method}");
        debug!(target: WALLET_TARGET, method = %method, "calling custodian");
        self.channel.call(&method, params)
    }
}
