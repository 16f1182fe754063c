//! Output formats for the custos telemetry subscriber.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How custodian lifecycle events are rendered on stderr.
///
/// Read from `log_format` in `custos.toml`, `CUSTOS_LOG_FORMAT` or
/// `--log-format`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Flattened JSON events for log shippers.
    #[default]
    Json,
    /// One line per event for terminals.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
