use std::fmt;

use thiserror::Error;

/// Private key in wallet import format, never rendered in logs or messages.
#[derive(Clone, PartialEq, Eq)]
pub struct Wif(String);

impl Wif {
    /// Wraps a WIF string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Wif {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Wif(<redacted>)")
    }
}

/// Domain error recognised in an RPC failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectedError {
    #[error("no wallet with such name: `{wallet_name}`")]
    NoWalletWithSuchName { wallet_name: String },
    #[error("wallet with name `{wallet_name}` already exists")]
    WalletAlreadyExists { wallet_name: String },
    #[error("invalid private key: the key could not be constructed")]
    InvalidPrivateKey { key: Wif },
    #[error("cannot remove key that does not exist: `{public_key}`")]
    KeyNotFound { public_key: String },
    #[error("public key `{public_key}` is missing its prefix")]
    MissingPrefix { public_key: String },
    #[error("invalid public key: `{public_key}`")]
    InvalidPublicKey { public_key: String },
    #[error("invalid wallet name: `{wallet_name}`")]
    InvalidWalletName { wallet_name: String },
    #[error("invalid password for wallet `{wallet_name}`")]
    InvalidPassword { wallet_name: String },
    #[error("invalid account name: `{account_name}`")]
    InvalidAccountName { account_name: String },
    #[error("public key `{public_key}` does not match the public key schema")]
    InvalidSchemaPublicKey { public_key: String },
    #[error("private key does not match the wallet import format schema")]
    InvalidSchemaPrivateKey,
}
