use std::env;
use std::time::Duration;

use camino::Utf8PathBuf;

use crate::endpoint::HttpEndpoint;

/// Name of the custodian executable looked up on `PATH`.
pub const DEFAULT_CUSTODIAN_BINARY: &str = "beekeeper";

/// Bound on the wait for the custodian's `listening` or `conflict` signal.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Worker count for the concurrent wallet-closed dispatcher.
pub const DEFAULT_DISPATCH_WORKERS: usize = 1;

/// Default log filter expression.
///
/// Events from the custos crates are kept at `info`; everything else in the
/// host application is held to `warn`.
pub const DEFAULT_LOG_FILTER: &str = "warn,custos=info,custos-notify=info";

/// Default custodian executable.
#[must_use]
pub fn default_custodian_binary() -> String {
    DEFAULT_CUSTODIAN_BINARY.to_owned()
}

/// Default startup timeout in milliseconds, as carried by [`crate::Config`].
#[must_use]
pub fn default_startup_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_STARTUP_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

/// Default dispatch worker count.
#[must_use]
pub const fn default_dispatch_workers() -> usize {
    DEFAULT_DISPATCH_WORKERS
}

/// Owned log filter value.
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// RPC endpoint left for the custodian to choose.
#[must_use]
pub fn default_rpc_endpoint() -> HttpEndpoint {
    HttpEndpoint::ephemeral()
}

/// Directory holding the custodian's wallet files.
#[must_use]
pub fn default_working_directory() -> Utf8PathBuf {
    let mut base = data_base_directory();
    base.push("custos");
    base
}

#[cfg(unix)]
fn data_base_directory() -> Utf8PathBuf {
    dirs::data_local_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory)
}

#[cfg(not(unix))]
fn data_base_directory() -> Utf8PathBuf {
    fallback_base_directory()
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
