//! Structural validation of values sent to the custodian.
//!
//! Failures are reported as [`RpcFailure::Schema`] naming the field, so the
//! schema-family detectors can classify them like any other call failure.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rpc::RpcFailure;

/// Field name reported for private key failures.
pub const WIF_FIELD: &str = "wif_key";
/// Field name reported for public key failures.
pub const PUBLIC_KEY_FIELD: &str = "public_key";
/// Field name reported for account name failures.
pub const ACCOUNT_NAME_FIELD: &str = "account_name";
/// Field name reported for digest failures.
pub const DIGEST_FIELD: &str = "sig_digest";

static WIF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^5[1-9A-HJ-NP-Za-km-z]{50}$").expect("wif regex is valid"));

static PUBLIC_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{3}[1-9A-HJ-NP-Za-km-z]{50}$").expect("public key regex is valid")
});

static ACCOUNT_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*[a-z0-9]$").expect("account segment regex is valid")
});

static DIGEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("digest regex is valid"));

/// Checks that `key` is a base58 WIF private key.
pub fn validate_wif(key: &str) -> Result<(), RpcFailure> {
    if WIF.is_match(key) {
        Ok(())
    } else {
        // The key itself is never echoed back.
        Err(RpcFailure::schema(
            WIF_FIELD,
            "expected 51 base58 characters starting with '5'",
        ))
    }
}

/// Checks that `key` is a prefixed base58 public key.
pub fn validate_public_key(key: &str) -> Result<(), RpcFailure> {
    if PUBLIC_KEY.is_match(key) {
        Ok(())
    } else {
        Err(RpcFailure::schema(
            PUBLIC_KEY_FIELD,
            format!("`{key}` is not a three letter prefix followed by 50 base58 characters"),
        ))
    }
}

/// Checks that `name` is a valid account name.
///
/// Names are 3 to 16 characters of dot-separated segments; every segment is
/// at least three characters, starts with a letter and ends with a letter or
/// digit.
pub fn validate_account_name(name: &str) -> Result<(), RpcFailure> {
    let valid = (3..=16).contains(&name.len())
        && name
            .split('.')
            .all(|segment| segment.len() >= 3 && ACCOUNT_SEGMENT.is_match(segment));
    if valid {
        Ok(())
    } else {
        Err(RpcFailure::schema(
            ACCOUNT_NAME_FIELD,
            format!("`{name}` is not a valid account name"),
        ))
    }
}

/// Checks that `digest` is a hex-encoded SHA-256 digest.
pub fn validate_digest(digest: &str) -> Result<(), RpcFailure> {
    if DIGEST.is_match(digest) {
        Ok(())
    } else {
        Err(RpcFailure::schema(
            DIGEST_FIELD,
            format!("`{digest}` is not 64 hexadecimal characters"),
        ))
    }
}
