use std::future::Future;
use std::sync::Arc;

use camino::Utf8PathBuf;
use custos_config::{Config, HttpEndpoint, ProcessSettings};
use custos_notify::Signal;
use tokio::runtime::Handle;
use tracing::debug;

use super::needs_close;
use crate::LIFECYCLE_TARGET;
use crate::dispatch::{AsyncDispatcher, ListenerError, WalletsClosedDispatch};
use crate::lifecycle::{
    Coordinator, CustodianOptions, Deployment, LifecycleError, LifecycleState,
};
use crate::supervisor::{KeyPair, LocalSupervisor, ProcessSupervisor};

/// Custodian handle for tokio applications.
///
/// Lifecycle transitions run on the runtime's blocking pool so the awaiting
/// task never stalls a worker thread. Wallet-closed listeners return futures
/// that are spawned on the same runtime, at most
/// [`CustodianOptions::dispatch_workers`] at a time.
pub struct AsyncCustodian {
    coordinator: Arc<Coordinator>,
    listeners: Arc<AsyncDispatcher>,
    runtime: Handle,
}

impl AsyncCustodian {
    /// Handle on the current tokio runtime spawning through `supervisor`.
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        options: CustodianOptions,
    ) -> Result<Self, LifecycleError> {
        Ok(Self::with_runtime(current_runtime()?, supervisor, options))
    }

    /// Handle on `runtime` spawning through `supervisor`.
    #[must_use]
    pub fn with_runtime(
        runtime: Handle,
        supervisor: Arc<dyn ProcessSupervisor>,
        options: CustodianOptions,
    ) -> Self {
        Self::with_deployment(runtime, Deployment::Local(supervisor), options)
    }

    /// Handle on the current runtime spawning the binary named in `config`.
    pub fn local(config: &Config) -> Result<Self, LifecycleError> {
        Self::new(
            Arc::new(LocalSupervisor::from_config(config)),
            CustodianOptions::from_config(config),
        )
    }

    /// Handle on the current runtime attached to a custodian managed elsewhere.
    pub fn remote(options: CustodianOptions) -> Result<Self, LifecycleError> {
        Ok(Self::with_deployment(
            current_runtime()?,
            Deployment::Remote,
            options,
        ))
    }

    fn with_deployment(runtime: Handle, deployment: Deployment, options: CustodianOptions) -> Self {
        let listeners = Arc::new(AsyncDispatcher::new(
            runtime.clone(),
            options.dispatch_workers(),
        ));
        let dispatcher: Arc<dyn WalletsClosedDispatch> = listeners.clone();
        let coordinator = Coordinator::new(deployment, options, dispatcher);
        Self {
            coordinator: Arc::new(coordinator),
            listeners,
            runtime,
        }
    }

    /// Registers a listener told which wallets the custodian is closing.
    pub fn on_wallets_closed<F, Fut>(&self, listener: F)
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        self.listeners.register(listener);
    }

    /// Starts the custodian and waits for it to report readiness.
    pub async fn start(&self, settings: ProcessSettings) -> Result<(), LifecycleError> {
        self.transition(move |coordinator| coordinator.start(settings))
            .await
    }

    /// Stops the custodian; calling it again is harmless.
    pub async fn close(&self) -> Result<(), LifecycleError> {
        self.transition(|coordinator| {
            coordinator.close();
            Ok(())
        })
        .await
    }

    /// Stops the custodian and starts it again with the last settings.
    pub async fn restart(&self) -> Result<(), LifecycleError> {
        self.transition(Coordinator::restart).await
    }

    /// Exports the key pairs held by `wallet`.
    pub async fn export_keys(
        &self,
        wallet: impl Into<String>,
        password: impl Into<String>,
        destination: impl Into<Utf8PathBuf>,
    ) -> Result<Vec<KeyPair>, LifecycleError> {
        let wallet = wallet.into();
        let password = password.into();
        let destination = destination.into();
        self.transition(move |coordinator| {
            coordinator.export_keys(&wallet, &password, &destination)
        })
        .await
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

    /// Number of registered wallet-closed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Size of the wallet-closed dispatch worker pool.
    #[must_use]
    pub fn dispatch_workers(&self) -> usize {
        self.listeners.workers()
    }

    async fn transition<T, F>(&self, operation: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&Coordinator) -> Result<T, LifecycleError> + Send + 'static,
        T: Send + 'static,
    {
        let coordinator = Arc::clone(&self.coordinator);
        self.runtime
            .spawn_blocking(move || operation(&coordinator))
            .await
            .map_err(|error| LifecycleError::TaskFailed {
                message: error.to_string(),
            })?
    }
}

impl Drop for AsyncCustodian {
    fn drop(&mut self) {
        if !needs_close(self.coordinator.state()) {
            return;
        }
        debug!(target: LIFECYCLE_TARGET, "closing custodian on drop");
        let coordinator = Arc::clone(&self.coordinator);
        // Detached: the blocking pool finishes the close after the handle is gone.
        drop(self.runtime.spawn_blocking(move || coordinator.close()));
    }
}

fn current_runtime() -> Result<Handle, LifecycleError> {
    Handle::try_current().map_err(|error| LifecycleError::NoRuntime {
        message: error.to_string(),
    })
}
