//! Serialized run-cycle state machine shared by both facades.

use std::sync::{Arc, Mutex, MutexGuard};

use camino::Utf8Path;
use custos_config::{HttpEndpoint, ProcessSettings};
use custos_notify::{NotificationServer, NotificationTracker, Signal, StartupSignal};
use tracing::{debug, info, warn};

use super::cycle::{Cycle, CycleSink};
use super::{CustodianOptions, LifecycleError, LifecycleState};
use crate::LIFECYCLE_TARGET;
use crate::dispatch::WalletsClosedDispatch;
use crate::supervisor::{KeyPair, ProcessSupervisor};

/// Where the custodian runs.
#[derive(Clone)]
pub enum Deployment {
    /// Spawned and stopped by this handle.
    Local(Arc<dyn ProcessSupervisor>),
    /// Managed elsewhere; the handle only tracks its endpoint.
    Remote,
}

/// Owns one custodian run cycle at a time.
///
/// `start`, `close` and `restart` hold the transition lock for their whole
/// duration, so at most one transition is in flight per handle. Cycle data
/// sits behind a second, briefly held lock so queries such as [`state`] or
/// [`is_running`] answer immediately even while `start` waits for readiness.
///
/// [`state`]: Coordinator::state
/// [`is_running`]: Coordinator::is_running
pub struct Coordinator {
    deployment: Deployment,
    options: CustodianOptions,
    tracker: Arc<NotificationTracker>,
    dispatcher: Arc<dyn WalletsClosedDispatch>,
    transition: Mutex<()>,
    cycle: Mutex<Cycle>,
}

impl Coordinator {
    /// Creates an idle coordinator.
    #[must_use]
    pub fn new(
        deployment: Deployment,
        options: CustodianOptions,
        dispatcher: Arc<dyn WalletsClosedDispatch>,
    ) -> Self {
        Self {
            deployment,
            options,
            tracker: Arc::new(NotificationTracker::new()),
            dispatcher,
            transition: Mutex::new(()),
            cycle: Mutex::new(Cycle::default()),
        }
    }

    /// Starts a new run cycle with `settings`.
    ///
    /// Blocks until the custodian reports that it is listening, reports a
    /// conflicting instance, or the startup timeout elapses.
    pub fn start(&self, settings: ProcessSettings) -> Result<(), LifecycleError> {
        let _transition = lock(&self.transition);
        self.start_locked(settings)
    }

    /// Tears down the current run cycle. Safe to call in any state.
    pub fn close(&self) {
        let _transition = lock(&self.transition);
        self.close_locked();
    }

    /// Closes and starts again with the last settings.
    ///
    /// A resolved RPC endpoint is reused; the notification endpoint is
    /// allocated afresh.
    pub fn restart(&self) -> Result<(), LifecycleError> {
        let _transition = lock(&self.transition);
        let mut settings = self
            .cycle()
            .settings
            .clone()
            .ok_or(LifecycleError::NeverStarted)?;
        self.close_locked();
        settings.clear_notification_endpoint();
        self.start_locked(settings)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.cycle().state
    }

    /// Whether the custodian is serving RPC.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let mut cycle = self.cycle();
        if cycle.state != LifecycleState::Running {
            return false;
        }
        match cycle.process.as_mut() {
            Some(process) => process.is_running(),
            None => matches!(self.deployment, Deployment::Remote),
        }
    }

    /// Process id of the running custodian.
    pub fn pid(&self) -> Result<u32, LifecycleError> {
        if matches!(self.deployment, Deployment::Remote) {
            return Err(LifecycleError::NoLocalProcess);
        }
        let cycle = self.cycle();
        match (&cycle.process, cycle.state) {
            (Some(process), LifecycleState::Running) => Ok(process.pid()),
            _ => Err(LifecycleError::NotRunning),
        }
    }

    /// Snapshot of the settings of the current or last run cycle.
    #[must_use]
    pub fn config(&self) -> Option<ProcessSettings> {
        self.cycle().settings.clone()
    }

    /// RPC endpoint of the running custodian.
    pub fn rpc_endpoint(&self) -> Result<HttpEndpoint, LifecycleError> {
        let cycle = self.cycle();
        match (&cycle.settings, cycle.state) {
            (Some(settings), LifecycleState::Running) => Ok(settings.rpc_endpoint().clone()),
            _ => Err(LifecycleError::NotRunning),
        }
    }

    /// Signals latched in the current run cycle.
    #[must_use]
    pub fn signals(&self) -> Vec<Signal> {
        self.tracker.snapshot()
    }

    /// Tracker fed by the current run cycle.
    #[must_use]
    pub fn tracker(&self) -> &NotificationTracker {
        &self.tracker
    }

    /// Startup and dispatch tunables.
    #[must_use]
    pub const fn options(&self) -> &CustodianOptions {
        &self.options
    }

    /// Exports the keys of `wallet` using the last settings' working directory.
    pub fn export_keys(
        &self,
        wallet: &str,
        password: &str,
        destination: &Utf8Path,
    ) -> Result<Vec<KeyPair>, LifecycleError> {
        let Deployment::Local(supervisor) = &self.deployment else {
            return Err(LifecycleError::NotSupported {
                operation: "export_keys",
            });
        };
        let working_directory = self
            .cycle()
            .settings
            .as_ref()
            .map(|settings| settings.working_directory().to_owned())
            .ok_or(LifecycleError::NeverStarted)?;
        supervisor
            .export_keys(&working_directory, wallet, password, destination)
            .map_err(LifecycleError::from)
    }

    fn start_locked(&self, settings: ProcessSettings) -> Result<(), LifecycleError> {
        let state = self.state();
        if !state.can_start() {
            return Err(LifecycleError::InvalidState {
                operation: "start",
                state,
            });
        }
        self.tracker.reset();
        match &self.deployment {
            Deployment::Remote => self.attach_remote(settings),
            Deployment::Local(supervisor) => self.launch_local(supervisor.as_ref(), settings),
        }
    }

    fn attach_remote(&self, settings: ProcessSettings) -> Result<(), LifecycleError> {
        let endpoint = settings.rpc_endpoint().clone();
        if endpoint.is_ephemeral() {
            return Err(LifecycleError::MissingRpcEndpoint { endpoint });
        }
        let mut cycle = self.cycle();
        cycle.settings = Some(settings);
        cycle.enter(LifecycleState::Running);
        info!(target: LIFECYCLE_TARGET, %endpoint, "attached to remote custodian");
        Ok(())
    }

    fn launch_local(
        &self,
        supervisor: &dyn ProcessSupervisor,
        mut settings: ProcessSettings,
    ) -> Result<(), LifecycleError> {
        let server = NotificationServer::bind_loopback()?;
        settings.assign_notification_endpoint(server.local_addr());
        let sink = CycleSink::new(Arc::clone(&self.tracker), Arc::clone(&self.dispatcher));
        let server = server.start(Arc::new(sink))?;
        {
            let mut cycle = self.cycle();
            cycle.settings = Some(settings.clone());
            cycle.server = Some(server);
            cycle.enter(LifecycleState::Starting);
        }

        let process = match supervisor.spawn(&settings) {
            Ok(process) => process,
            Err(error) => {
                warn!(target: LIFECYCLE_TARGET, error = %error, "failed to spawn custodian");
                self.teardown();
                return Err(error.into());
            }
        };
        let pid = process.pid();
        self.cycle().process = Some(process);
        debug!(
            target: LIFECYCLE_TARGET,
            pid,
            timeout_ms = self.options.startup_timeout().as_millis(),
            "waiting for custodian readiness"
        );

        match self.tracker.wait_for_startup(self.options.startup_timeout()) {
            StartupSignal::Listening(endpoint) => {
                let mut cycle = self.cycle();
                if let Some(settings) = cycle.settings.as_mut() {
                    settings.resolve_rpc_endpoint(endpoint.clone());
                }
                cycle.enter(LifecycleState::Ready);
                cycle.enter(LifecycleState::Running);
                info!(target: LIFECYCLE_TARGET, pid, %endpoint, "custodian running");
                Ok(())
            }
            StartupSignal::Conflict(conflict) => {
                self.cycle().enter(LifecycleState::ConflictDetected);
                warn!(
                    target: LIFECYCLE_TARGET,
                    pid,
                    rival_pid = conflict.pid,
                    address = %conflict.address,
                    "another custodian owns the endpoint"
                );
                self.teardown();
                Err(LifecycleError::AlreadyRunning {
                    address: conflict.address,
                    pid: conflict.pid,
                })
            }
            StartupSignal::TimedOut => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    pid,
                    timeout_ms = self.options.startup_timeout().as_millis(),
                    "custodian did not report readiness"
                );
                Err(LifecycleError::NotReady {
                    timeout: self.options.startup_timeout(),
                })
            }
        }
    }

    fn close_locked(&self) {
        let previous = self.state();
        self.teardown();
        if previous != LifecycleState::Closed {
            info!(target: LIFECYCLE_TARGET, from = %previous, "custodian closed");
        }
    }

    /// Stops everything the current cycle created and ends in `Closed`.
    fn teardown(&self) {
        let (process, server) = {
            let mut cycle = self.cycle();
            cycle.enter(LifecycleState::Closing);
            (cycle.process.take(), cycle.server.take())
        };
        // The cycle lock is released here: stopping can take the whole grace
        // period and notification readers still call into the handle.
        if let Some(mut process) = process {
            let pid = process.pid();
            match process.stop() {
                Ok(()) => debug!(target: LIFECYCLE_TARGET, pid, "custodian stopped"),
                Err(error) => warn!(
                    target: LIFECYCLE_TARGET,
                    pid,
                    error = %error,
                    "failed to stop custodian"
                ),
            }
        }
        if let Some(server) = server {
            if let Err(error) = server.stop() {
                warn!(
                    target: LIFECYCLE_TARGET,
                    error = %error,
                    "failed to stop notification server"
                );
            }
        }
        self.tracker.reset();
        self.cycle().enter(LifecycleState::Closed);
    }

    fn cycle(&self) -> MutexGuard<'_, Cycle> {
        lock(&self.cycle)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
