use std::sync::Arc;

use camino::Utf8Path;
use custos_config::{Config, HttpEndpoint, ProcessSettings};
use custos_notify::Signal;

use super::needs_close;
use crate::dispatch::{ListenerError, SyncDispatcher, WalletsClosedDispatch};
use crate::lifecycle::{
    Coordinator, CustodianOptions, Deployment, LifecycleError, LifecycleState,
};
use crate::supervisor::{KeyPair, LocalSupervisor, ProcessSupervisor};

/// Blocking custodian handle.
///
/// Wallet-closed listeners run one after another on the notification reader
/// thread. A listener must not call [`start`](Self::start),
/// [`close`](Self::close) or [`restart`](Self::restart) on the handle that
/// invoked it.
pub struct Custodian {
    coordinator: Coordinator,
    listeners: Arc<SyncDispatcher>,
}

impl Custodian {
    /// Handle that spawns custodians through `supervisor`.
    #[must_use]
    pub fn new(supervisor: Arc<dyn ProcessSupervisor>, options: CustodianOptions) -> Self {
        Self::with_deployment(Deployment::Local(supervisor), options)
    }

    /// Handle spawning the binary named in `config`.
    #[must_use]
    pub fn local(config: &Config) -> Self {
        Self::new(
            Arc::new(LocalSupervisor::from_config(config)),
            CustodianOptions::from_config(config),
        )
    }

    /// Handle attached to a custodian managed elsewhere.
    #[must_use]
    pub fn remote(options: CustodianOptions) -> Self {
        Self::with_deployment(Deployment::Remote, options)
    }

    fn with_deployment(deployment: Deployment, options: CustodianOptions) -> Self {
        let listeners = Arc::new(SyncDispatcher::new());
        let dispatcher: Arc<dyn WalletsClosedDispatch> = listeners.clone();
        let coordinator = Coordinator::new(deployment, options, dispatcher);
        Self {
            coordinator,
            listeners,
        }
    }

    /// Registers a listener told which wallets the custodian is closing.
    pub fn on_wallets_closed<F>(&self, listener: F)
    where
        F: Fn(&[String]) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.register(listener);
    }

    /// Starts the custodian and waits for it to report readiness.
    pub fn start(&self, settings: ProcessSettings) -> Result<(), LifecycleError> {
        self.coordinator.start(settings)
    }

    /// Stops the custodian; calling it again is harmless.
    pub fn close(&self) {
        self.coordinator.close();
    }

    /// Stops the custodian and starts it again with the last settings.
    pub fn restart(&self) -> Result<(), LifecycleError> {
        self.coordinator.restart()
    }

    /// Whether the custodian is serving RPC.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Process id of the running custodian.
    pub fn pid(&self) -> Result<u32, LifecycleError> {
        self.coordinator.pid()
    }

    /// Settings of the current or last run.
    #[must_use]
    pub fn config(&self) -> Option<ProcessSettings> {
        self.coordinator.config()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.coordinator.state()
    }

    /// RPC endpoint of the running custodian.
    pub fn rpc_endpoint(&self) -> Result<HttpEndpoint, LifecycleError> {
        self.coordinator.rpc_endpoint()
    }

    /// Signals latched in the current run.
    #[must_use]
    pub fn signals(&self) -> Vec<Signal> {
        self.coordinator.signals()
    }

    /// Exports the key pairs held by `wallet`.
    pub fn export_keys(
        &self,
        wallet: &str,
        password: &str,
        destination: &Utf8Path,
    ) -> Result<Vec<KeyPair>, LifecycleError> {
        self.coordinator.export_keys(wallet, password, destination)
    }

    /// Number of registered wallet-closed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Drop for Custodian {
    fn drop(&mut self) {
        if needs_close(self.coordinator.state()) {
            self.coordinator.close();
        }
    }
}
