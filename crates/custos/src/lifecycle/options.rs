use std::time::Duration;

use custos_config::{Config, DEFAULT_DISPATCH_WORKERS, DEFAULT_STARTUP_TIMEOUT};

/// Tunables shared by both facades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustodianOptions {
    startup_timeout: Duration,
    dispatch_workers: usize,
}

impl Default for CustodianOptions {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
        }
    }
}

impl CustodianOptions {
    /// Options with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options taken from resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            startup_timeout: config.startup_timeout(),
            dispatch_workers: config.dispatch_workers(),
        }
    }

    /// Overrides the readiness wait bound.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Overrides the concurrent dispatch worker count.
    #[must_use]
    pub fn with_dispatch_workers(mut self, workers: usize) -> Self {
        self.dispatch_workers = workers.max(1);
        self
    }

    /// Readiness wait bound.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    /// Concurrent dispatch worker count.
    #[must_use]
    pub const fn dispatch_workers(&self) -> usize {
        self.dispatch_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_configuration() {
        let config = Config {
            startup_timeout_ms: 250,
            dispatch_workers: 4,
            ..Config::default()
        };
        let options = CustodianOptions::from_config(&config);
        assert_eq!(options.startup_timeout(), Duration::from_millis(250));
        assert_eq!(options.dispatch_workers(), 4);
    }

    #[test]
    fn worker_count_never_drops_to_zero() {
        assert_eq!(CustodianOptions::new().with_dispatch_workers(0).dispatch_workers(), 1);
    }
}
