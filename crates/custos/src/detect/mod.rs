//! Classification of opaque RPC failures into typed domain errors.
//!
//! The custodian reports failures as free text. A [`Detector`] pairs the
//! domain error a caller expects with a predicate over the raw
//! [`RpcFailure`]; [`guard`] runs an operation and converts a matching
//! failure into [`CallError::Detected`], leaving anything else untouched:
//!
//! ```
//! use custos::detect::{CallError, Detector, DetectedError, guard};
//! use custos::rpc::RpcFailure;
//!
//! let outcome: Result<(), CallError> = guard(Detector::key_not_found("STM6xyz"), || {
//!     Err(RpcFailure::request("Assert Exception:false: Key not in wallet"))
//! });
//! assert!(matches!(
//!     outcome,
//!     Err(CallError::Detected(DetectedError::KeyNotFound { .. }))
//! ));
//! ```

mod catalog;
mod error;

use std::fmt;
use std::future::Future;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::DETECT_TARGET;
use crate::rpc::RpcFailure;

pub use error::{DetectedError, Wif};

type Predicate = Box<dyn Fn(&RpcFailure) -> bool + Send + Sync>;

/// Typed error plus the predicate that recognises it.
pub struct Detector {
    error: DetectedError,
    predicate: Predicate,
}

impl fmt::Debug for Detector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Detector")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Result of matching one failure against one detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The failure is the detector's domain error.
    Matched(DetectedError),
    /// The failure is something else and is returned unchanged.
    Unmatched(RpcFailure),
}

/// Error returned by guarded calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// A recognised domain error.
    #[error(transparent)]
    Detected(DetectedError),
    /// An unrecognised failure, exactly as reported.
    #[error(transparent)]
    Rpc(RpcFailure),
}

impl Detector {
    /// Detector matching failures accepted by `predicate`.
    pub fn new<P>(error: DetectedError, predicate: P) -> Self
    where
        P: Fn(&RpcFailure) -> bool + Send + Sync + 'static,
    {
        Self {
            error,
            predicate: Box::new(predicate),
        }
    }

    /// Detector matching custodian failures whose text contains every needle.
    pub fn on_message_containing<I, S>(error: DetectedError, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let needles: Vec<String> = needles.into_iter().map(Into::into).collect();
        Self::new(error, move |failure| {
            matches!(failure, RpcFailure::Request { .. })
                && needles
                    .iter()
                    .all(|needle| failure.message().contains(needle.as_str()))
        })
    }

    /// Detector matching custodian failures whose text matches `pattern`.
    #[must_use]
    pub fn on_message_matching(error: DetectedError, pattern: Regex) -> Self {
        Self::new(error, move |failure| {
            matches!(failure, RpcFailure::Request { .. }) && pattern.is_match(failure.message())
        })
    }

    /// Detector matching every schema failure.
    ///
    /// Callers scope it to a single validation step.
    #[must_use]
    pub fn on_schema_failure(error: DetectedError) -> Self {
        Self::new(error, RpcFailure::is_schema)
    }

    /// The domain error this detector stands for.
    #[must_use]
    pub const fn error(&self) -> &DetectedError {
        &self.error
    }

    /// Whether `failure` is this detector's domain error.
    #[must_use]
    pub fn matches(&self, failure: &RpcFailure) -> bool {
        (self.predicate)(failure)
    }

    /// Classifies `failure`, consuming the detector.
    #[must_use]
    pub fn classify(self, failure: RpcFailure) -> Classification {
        if self.matches(&failure) {
            debug!(
                target: DETECT_TARGET,
                detected = %self.error,
                "classified RPC failure"
            );
            Classification::Matched(self.error)
        } else {
            Classification::Unmatched(failure)
        }
    }
}

impl From<Classification> for CallError {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Matched(error) => Self::Detected(error),
            Classification::Unmatched(failure) => Self::Rpc(failure),
        }
    }
}

/// Runs `operation`, converting a failure matched by `detector`.
pub fn guard<T, F>(detector: Detector, operation: F) -> Result<T, CallError>
where
    F: FnOnce() -> Result<T, RpcFailure>,
{
    operation().map_err(|failure| detector.classify(failure).into())
}

/// Runs `operation`; the first detector matching a failure wins.
pub fn guard_any<T, F>(detectors: Vec<Detector>, operation: F) -> Result<T, CallError>
where
    F: FnOnce() -> Result<T, RpcFailure>,
{
    operation().map_err(|failure| classify_any(detectors, failure))
}

/// Awaits `operation`, converting a failure matched by `detector`.
pub async fn guard_async<T, Fut>(detector: Detector, operation: Fut) -> Result<T, CallError>
where
    Fut: Future<Output = Result<T, RpcFailure>>,
{
    operation
        .await
        .map_err(|failure| detector.classify(failure).into())
}

fn classify_any(detectors: Vec<Detector>, failure: RpcFailure) -> CallError {
    detectors
        .into_iter()
        .find(|detector| detector.matches(&failure))
        .map_or(CallError::Rpc(failure), |detector| {
            CallError::Detected(detector.error)
        })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn successful_operation_passes_value_through() {
        let outcome = guard(Detector::key_not_found("STM6xyz"), || Ok::<_, RpcFailure>(42));
        assert_eq!(outcome, Ok(42));
    }

    #[rstest]
    fn key_not_in_wallet_message_names_the_key() {
        let outcome: Result<(), CallError> = guard(Detector::key_not_found("STM6xyz..."), || {
            Err(RpcFailure::request("Assert Exception:false: Key not in wallet"))
        });

        let Err(CallError::Detected(error)) = outcome else {
            panic!("expected detected error, got {outcome:?}");
        };
        assert_eq!(
            error.to_string(),
            "cannot remove key that does not exist: `STM6xyz...`"
        );
    }

    #[rstest]
    fn unmatched_failure_is_returned_unchanged() {
        let failure = RpcFailure::request("Assert Exception: something unrelated");
        let outcome: Result<(), CallError> =
            guard(Detector::key_not_found("STM6xyz"), || Err(failure.clone()));
        assert_eq!(outcome, Err(CallError::Rpc(failure)));
    }

    #[rstest]
    fn first_matching_detector_wins() {
        let outcome: Result<(), CallError> = guard_any(
            vec![
                Detector::invalid_password("alice"),
                Detector::no_wallet_with_such_name("alice"),
                Detector::on_message_containing(
                    DetectedError::InvalidWalletName {
                        wallet_name: String::from("alice"),
                    },
                    ["Unable to open file"],
                ),
            ],
            || Err(RpcFailure::request("Unable to open file: /data/alice.wallet")),
        );

        assert_eq!(
            outcome,
            Err(CallError::Detected(DetectedError::NoWalletWithSuchName {
                wallet_name: String::from("alice"),
            }))
        );
    }

    #[rstest]
    fn text_detectors_ignore_schema_failures() {
        let failure = RpcFailure::schema("public_key", "Key not in wallet");
        assert_eq!(
            Detector::key_not_found("STM6xyz").classify(failure.clone()),
            Classification::Unmatched(failure)
        );
    }

    #[test]
    fn guard_async_classifies_failures() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("tokio runtime");
        let outcome: Result<(), CallError> = runtime.block_on(guard_async(
            Detector::wallet_already_exists("alice"),
            async { Err(RpcFailure::request("Wallet with name: 'alice' already exists")) },
        ));

        assert_eq!(
            outcome,
            Err(CallError::Detected(DetectedError::WalletAlreadyExists {
                wallet_name: String::from("alice"),
            }))
        );
    }
}
