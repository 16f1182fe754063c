//! Scenario world for the lifecycle behaviour suite.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use custos_config::ProcessSettings;
use tempfile::TempDir;

use super::custodian::{FakeSupervisor, Script};
use crate::dispatch::ListenerError;
use crate::{Custodian, CustodianOptions, LifecycleError};

pub type StepResult = Result<(), String>;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// A blocking custodian wired to a scripted fake, plus what the steps saw.
pub struct LifecycleWorld {
    supervisor: Arc<FakeSupervisor>,
    custodian: Custodian,
    workdir: TempDir,
    outcome: Option<Result<(), LifecycleError>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl LifecycleWorld {
    pub fn new() -> Self {
        let supervisor = FakeSupervisor::new(Script::Listening);
        let options = CustodianOptions::new().with_startup_timeout(STARTUP_TIMEOUT);
        Self {
            custodian: Custodian::new(supervisor.clone(), options),
            supervisor,
            workdir: TempDir::new().expect("create working directory"),
            outcome: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn use_script(&self, script: Script) {
        self.supervisor.set_script(script);
    }

    pub fn register_listeners(&self, count: usize) {
        for _ in 0..count {
            let calls = Arc::clone(&self.calls);
            self.custodian.on_wallets_closed(move |wallets| {
                calls
                    .lock()
                    .map_err(|_| ListenerError::new("calls lock poisoned"))?
                    .push(wallets.to_vec());
                Ok(())
            });
        }
    }

    pub fn settings(&self) -> ProcessSettings {
        let path = self.workdir.path().to_str().expect("utf-8 temp path");
        ProcessSettings::new(path)
    }

    pub fn start(&mut self) {
        let settings = self.settings();
        self.outcome = Some(self.custodian.start(settings));
    }

    pub fn restart(&mut self) {
        self.outcome = Some(self.custodian.restart());
    }

    pub fn close(&self) {
        self.custodian.close();
    }

    pub const fn custodian(&self) -> &Custodian {
        &self.custodian
    }

    pub fn supervisor(&self) -> &FakeSupervisor {
        &self.supervisor
    }

    pub fn outcome(&self) -> Result<&Result<(), LifecycleError>, String> {
        self.outcome
            .as_ref()
            .ok_or_else(|| String::from("no lifecycle operation has run"))
    }

    pub fn listener_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn wait_for_listener_calls(&self, expected: usize) -> StepResult {
        if wait_until(Duration::from_secs(2), || {
            self.listener_calls().len() >= expected
        }) {
            Ok(())
        } else {
            Err(format!(
                "expected {expected} listener calls, saw {:?}",
                self.listener_calls()
            ))
        }
    }
}
