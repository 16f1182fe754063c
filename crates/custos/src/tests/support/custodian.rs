//! In-process stand-in for the custodian binary.
//!
//! [`FakeSupervisor`] hands out [`FakeProcess`]es that connect to the
//! notification endpoint the coordinator allocated and replay a scripted
//! sequence of notifications, the way the real custodian announces itself.

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use camino::Utf8Path;
use custos_config::{HttpEndpoint, ProcessSettings};
use custos_notify::{
    ConflictPayload, ListeningPayload, Notification, WalletsClosingPayload,
};

use crate::supervisor::{CustodianProcess, KeyPair, ProcessSupervisor, SupervisorError};

/// Process id reported by the rival custodian in conflict scripts.
pub const RIVAL_PID: u32 = 4242;

/// RPC endpoint the fake reports once listening.
pub fn listening_endpoint() -> HttpEndpoint {
    HttpEndpoint::new("127.0.0.1", 18_093)
}

/// RPC endpoint owned by the rival custodian.
pub fn rival_endpoint() -> HttpEndpoint {
    HttpEndpoint::new("127.0.0.1", 18_090)
}

/// What a spawned fake announces on the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Reports [`listening_endpoint`].
    Listening,
    /// Reports that the rival owns [`rival_endpoint`].
    Conflict,
    /// Says nothing.
    Silent,
    /// Reports [`listening_endpoint`], then that `wallets` are closing.
    ClosingWallets(Vec<String>),
}

impl Script {
    fn notifications(&self) -> Vec<Notification> {
        let listening = Notification::HttpListening(ListeningPayload::http(&listening_endpoint()));
        match self {
            Self::Listening => vec![listening],
            Self::Conflict => vec![Notification::AlreadyRunning(ConflictPayload {
                connection: ListeningPayload::http(&rival_endpoint()),
                pid: RIVAL_PID,
            })],
            Self::Silent => Vec::new(),
            Self::ClosingWallets(wallets) => vec![
                listening,
                Notification::AttemptClosingWallets(WalletsClosingPayload {
                    wallets: wallets.clone(),
                }),
            ],
        }
    }
}

/// Supervisor spawning scripted in-process custodians.
pub struct FakeSupervisor {
    script: Mutex<Script>,
    next_pid: AtomicU32,
    spawned: Mutex<Vec<ProcessSettings>>,
    stopped: Arc<Mutex<Vec<u32>>>,
    live: Arc<AtomicUsize>,
    announce_failures: Arc<Mutex<Vec<String>>>,
}

impl FakeSupervisor {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            next_pid: AtomicU32::new(1_000),
            spawned: Mutex::new(Vec::new()),
            stopped: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(AtomicUsize::new(0)),
            announce_failures: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Changes what the next spawned custodian announces.
    pub fn set_script(&self, script: Script) {
        *self.script.lock().expect("script lock") = script;
    }

    /// Settings passed to every spawn so far.
    pub fn spawned(&self) -> Vec<ProcessSettings> {
        self.spawned.lock().expect("spawned lock").clone()
    }

    /// Pids stopped through [`CustodianProcess::stop`].
    pub fn stopped(&self) -> Vec<u32> {
        self.stopped.lock().expect("stopped lock").clone()
    }

    /// Errors hit while replaying notifications.
    pub fn announce_failures(&self) -> Vec<String> {
        self.announce_failures
            .lock()
            .expect("announce failures lock")
            .clone()
    }

    /// Fakes spawned and not yet stopped.
    pub fn live_processes(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl ProcessSupervisor for FakeSupervisor {
    fn spawn(
        &self,
        settings: &ProcessSettings,
    ) -> Result<Box<dyn CustodianProcess>, SupervisorError> {
        self.spawned
            .lock()
            .expect("spawned lock")
            .push(settings.clone());
        let address = settings
            .notification_endpoint()
            .expect("coordinator assigns a notification endpoint before spawning");
        let notifications = self.script.lock().expect("script lock").notifications();
        if !notifications.is_empty() {
            let failures = Arc::clone(&self.announce_failures);
            thread::spawn(move || {
                if let Err(error) = announce(address, &notifications) {
                    if let Ok(mut guard) = failures.lock() {
                        guard.push(format!("{error:#}"));
                    }
                }
            });
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeProcess {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            running: true,
            stopped: Arc::clone(&self.stopped),
            live: Arc::clone(&self.live),
        }))
    }

    fn export_keys(
        &self,
        _working_directory: &Utf8Path,
        wallet: &str,
        _password: &str,
        _destination: &Utf8Path,
    ) -> Result<Vec<KeyPair>, SupervisorError> {
        Ok(vec![KeyPair {
            public_key: format!("STM-{wallet}"),
            wif_private_key: String::from("5JNHfZYKGaomSFvd4NUdQ9qMcEAC43kujbfjueTHpVapX1Kzq2n"),
        }])
    }
}

fn announce(address: SocketAddr, notifications: &[Notification]) -> Result<()> {
    let mut stream = TcpStream::connect(address).context("connect to notification endpoint")?;
    for notification in notifications {
        let line = notification.encode().context("encode notification")?;
        stream.write_all(&line).context("write notification")?;
    }
    stream.flush().context("flush notifications")
}

struct FakeProcess {
    pid: u32,
    running: bool,
    stopped: Arc<Mutex<Vec<u32>>>,
    live: Arc<AtomicUsize>,
}

impl CustodianProcess for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_running(&mut self) -> bool {
        self.running
    }

    fn stop(&mut self) -> Result<(), SupervisorError> {
        if self.running {
            self.running = false;
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.stopped.lock().expect("stopped lock").push(self.pid);
        }
        Ok(())
    }
}
