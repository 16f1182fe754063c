//! Catalogue of the custodian failures callers can match on.
//!
//! Text detectors key on the assertion text the custodian emits. Schema
//! detectors match any structural validation failure, so each one guards a
//! single validation step.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{DetectedError, Detector, Wif};

static MISSING_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)missing\s+(?:\w+\s+){0,3}prefix").expect("missing prefix regex is valid")
});

static INVALID_PUBLIC_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)invalid\s+public\s+key").expect("public key regex is valid"));

impl Detector {
    /// The custodian has no wallet file for `wallet_name`.
    pub fn no_wallet_with_such_name(wallet_name: impl Into<String>) -> Self {
        let wallet_name = wallet_name.into();
        let file = format!("/{wallet_name}.wallet");
        Self::on_message_containing(
            DetectedError::NoWalletWithSuchName { wallet_name },
            [String::from("Unable to open file"), file],
        )
    }

    /// A wallet named `wallet_name` exists already.
    pub fn wallet_already_exists(wallet_name: impl Into<String>) -> Self {
        let wallet_name = wallet_name.into();
        let needle = format!("Wallet with name: '{wallet_name}' already exists");
        Self::on_message_containing(DetectedError::WalletAlreadyExists { wallet_name }, [needle])
    }

    /// The custodian could not build a key from `key`.
    pub fn invalid_private_key(key: impl Into<String>) -> Self {
        Self::on_message_containing(
            DetectedError::InvalidPrivateKey { key: Wif::new(key) },
            ["Key can't be constructed"],
        )
    }

    /// `public_key` is not held by the wallet.
    pub fn key_not_found(public_key: impl Into<String>) -> Self {
        Self::on_message_containing(
            DetectedError::KeyNotFound {
                public_key: public_key.into(),
            },
            ["Key not in wallet"],
        )
    }

    /// `public_key` lacks its chain prefix.
    pub fn missing_prefix(public_key: impl Into<String>) -> Self {
        Self::on_message_matching(
            DetectedError::MissingPrefix {
                public_key: public_key.into(),
            },
            MISSING_PREFIX.clone(),
        )
    }

    /// `public_key` is not a valid public key.
    pub fn invalid_public_key(public_key: impl Into<String>) -> Self {
        Self::on_message_matching(
            DetectedError::InvalidPublicKey {
                public_key: public_key.into(),
            },
            INVALID_PUBLIC_KEY.clone(),
        )
    }

    /// The custodian rejected `wallet_name`.
    pub fn invalid_wallet_name(wallet_name: impl Into<String>) -> Self {
        Self::on_message_containing(
            DetectedError::InvalidWalletName {
                wallet_name: wallet_name.into(),
            },
            ["Name of wallet is incorrect"],
        )
    }

    /// The password does not unlock `wallet_name`.
    pub fn invalid_password(wallet_name: impl Into<String>) -> Self {
        Self::on_message_containing(
            DetectedError::InvalidPassword {
                wallet_name: wallet_name.into(),
            },
            ["Invalid password for wallet"],
        )
    }

    /// `account_name` failed account-name validation.
    pub fn invalid_account_name(account_name: impl Into<String>) -> Self {
        Self::on_schema_failure(
            DetectedError::InvalidAccountName {
                account_name: account_name.into(),
            },
        )
    }

    /// `public_key` failed public-key validation.
    pub fn invalid_schema_public_key(public_key: impl Into<String>) -> Self {
        Self::on_schema_failure(
            DetectedError::InvalidSchemaPublicKey {
                public_key: public_key.into(),
            },
        )
    }

    /// A private key failed WIF validation.
    #[must_use]
    pub fn invalid_schema_private_key() -> Self {
        Self::on_schema_failure(DetectedError::InvalidSchemaPrivateKey)
    }
}
