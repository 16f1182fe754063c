//! Shared configuration for the custos client library.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, then a
//! `custos.toml` file, then `CUSTOS_*` environment variables, then command
//! line flags. The value objects in this crate ([`HttpEndpoint`],
//! [`ProcessSettings`]) are what the lifecycle coordinator passes around once
//! configuration has been resolved.

mod defaults;
mod endpoint;
mod logging;
mod settings;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CUSTODIAN_BINARY, DEFAULT_DISPATCH_WORKERS, DEFAULT_LOG_FILTER,
    DEFAULT_STARTUP_TIMEOUT, default_custodian_binary, default_dispatch_workers,
    default_log_filter, default_log_format, default_rpc_endpoint, default_startup_timeout_ms,
    default_working_directory,
};
pub use endpoint::{EndpointParseError, HttpEndpoint};
pub use logging::{LogFormat, LogFormatParseError};
pub use settings::ProcessSettings;

/// Resolved configuration for a custodian handle.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "CUSTOS")]
pub struct Config {
    /// Custodian executable, resolved through `PATH` when relative.
    #[ortho_config(default = default_custodian_binary())]
    pub custodian_binary: String,
    /// Directory holding the custodian's wallet files.
    #[ortho_config(default = default_working_directory())]
    pub working_directory: Utf8PathBuf,
    /// RPC endpoint requested from the custodian; port `0` lets it choose.
    #[ortho_config(default = default_rpc_endpoint())]
    pub rpc_endpoint: HttpEndpoint,
    /// Bound on the readiness wait during start, in milliseconds.
    #[ortho_config(default = default_startup_timeout_ms())]
    pub startup_timeout_ms: u64,
    /// Worker count for concurrent wallet-closed dispatch.
    #[ortho_config(default = default_dispatch_workers())]
    pub dispatch_workers: usize,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Telemetry output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            custodian_binary: default_custodian_binary(),
            working_directory: default_working_directory(),
            rpc_endpoint: default_rpc_endpoint(),
            startup_timeout_ms: default_startup_timeout_ms(),
            dispatch_workers: default_dispatch_workers(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Readiness wait bound used by `start`.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Dispatch worker count, never below one.
    #[must_use]
    pub fn dispatch_workers(&self) -> usize {
        self.dispatch_workers.max(1)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Settings for one custodian process derived from this configuration.
    #[must_use]
    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings::new(self.working_directory.clone())
            .with_rpc_endpoint(self.rpc_endpoint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.startup_timeout(), Duration::from_secs(5));
        assert_eq!(config.dispatch_workers(), 1);
        assert_eq!(config.custodian_binary, DEFAULT_CUSTODIAN_BINARY);
        assert!(config.rpc_endpoint.is_ephemeral());
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[test]
    fn zero_workers_are_clamped() {
        let config = Config {
            dispatch_workers: 0,
            ..Config::default()
        };
        assert_eq!(config.dispatch_workers(), 1);
    }

    #[test]
    fn process_settings_carry_directory_and_endpoint() {
        let config = Config {
            working_directory: Utf8PathBuf::from("/srv/wallets"),
            rpc_endpoint: HttpEndpoint::new("127.0.0.1", 8093),
            ..Config::default()
        };
        let settings = config.process_settings();
        assert_eq!(settings.working_directory().as_str(), "/srv/wallets");
        assert_eq!(settings.rpc_endpoint().port(), 8093);
        assert_eq!(settings.notification_endpoint(), None);
    }
}
