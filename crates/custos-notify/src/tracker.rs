//! Latched notification signals with timeout-bounded waits.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use custos_config::HttpEndpoint;
use strum::Display;
use thiserror::Error;
use tracing::{debug, warn};

use crate::TRACKER_TARGET;
use crate::protocol::{ErrorPayload, Notification, StatusPayload};
use crate::sink::NotificationSink;

/// Signal categories tracked per run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Signal {
    /// The custodian's webserver is listening.
    Listening,
    /// Another custodian owns the endpoint.
    Conflict,
    /// Wallets are about to be force-closed.
    WalletsClosing,
    /// The custodian reported an error.
    OperationalError,
    /// The custodian reported a status change.
    StatusChanged,
}

/// Rival custodian reported by an `already_running` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Endpoint served by the rival.
    pub address: HttpEndpoint,
    /// Process id of the rival.
    pub pid: u32,
}

/// Outcome of waiting for the custodian to come up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupSignal {
    /// The custodian is serving RPC on this endpoint.
    Listening(HttpEndpoint),
    /// Another custodian already owns the endpoint.
    Conflict(Conflict),
    /// Neither signal fired within the bound.
    TimedOut,
}

/// Errors raised when latching signals.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The signal already fired in this run cycle.
    #[error("{signal} signal already latched for this run cycle")]
    AlreadyLatched { signal: Signal },
}

#[derive(Debug, Default)]
struct Signals {
    listening: Option<HttpEndpoint>,
    conflict: Option<Conflict>,
    wallets_closing: Option<Vec<String>>,
    operational_error: Option<ErrorPayload>,
    status_changed: Option<StatusPayload>,
}

impl Signals {
    fn latched(&self) -> Vec<Signal> {
        [
            (Signal::Listening, self.listening.is_some()),
            (Signal::Conflict, self.conflict.is_some()),
            (Signal::WalletsClosing, self.wallets_closing.is_some()),
            (Signal::OperationalError, self.operational_error.is_some()),
            (Signal::StatusChanged, self.status_changed.is_some()),
        ]
        .into_iter()
        .filter_map(|(signal, set)| set.then_some(signal))
        .collect()
    }
}

/// Set of independent latched signals fed by the notification reader.
///
/// Each signal may be set once per run cycle; [`NotificationTracker::reset`]
/// starts a new cycle. Waiters block on a condition variable and are woken by
/// every latch, so a wait returns as soon as its signal fires or the timeout
/// elapses.
#[derive(Debug, Default)]
pub struct NotificationTracker {
    signals: Mutex<Signals>,
    changed: Condvar,
}

impl NotificationTracker {
    /// Creates a tracker with no signal latched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches `listening` with the endpoint the custodian bound.
    pub fn set_listening(&self, endpoint: HttpEndpoint) -> Result<(), TrackerError> {
        self.latch(Signal::Listening, |signals| &mut signals.listening, endpoint)
    }

    /// Latches `conflict` with the rival's identity.
    pub fn set_conflict(&self, conflict: Conflict) -> Result<(), TrackerError> {
        self.latch(Signal::Conflict, |signals| &mut signals.conflict, conflict)
    }

    /// Latches `wallets_closing` with the affected wallet names.
    pub fn set_wallets_closing(&self, wallets: Vec<String>) -> Result<(), TrackerError> {
        self.latch(
            Signal::WalletsClosing,
            |signals| &mut signals.wallets_closing,
            wallets,
        )
    }

    /// Latches `operational_error`.
    pub fn set_operational_error(&self, payload: ErrorPayload) -> Result<(), TrackerError> {
        self.latch(
            Signal::OperationalError,
            |signals| &mut signals.operational_error,
            payload,
        )
    }

    /// Latches `status_changed`.
    pub fn set_status_changed(&self, payload: StatusPayload) -> Result<(), TrackerError> {
        self.latch(
            Signal::StatusChanged,
            |signals| &mut signals.status_changed,
            payload,
        )
    }

    /// Latches the signal matching a decoded notification.
    pub fn record(&self, notification: Notification) -> Result<Signal, TrackerError> {
        match notification {
            Notification::HttpListening(payload) => {
                self.set_listening(payload.endpoint())?;
                Ok(Signal::Listening)
            }
            Notification::AlreadyRunning(payload) => {
                self.set_conflict(Conflict {
                    address: payload.connection.endpoint(),
                    pid: payload.pid,
                })?;
                Ok(Signal::Conflict)
            }
            Notification::AttemptClosingWallets(payload) => {
                self.set_wallets_closing(payload.wallets)?;
                Ok(Signal::WalletsClosing)
            }
            Notification::Error(payload) => {
                self.set_operational_error(payload)?;
                Ok(Signal::OperationalError)
            }
            Notification::StatusChange(payload) => {
                self.set_status_changed(payload)?;
                Ok(Signal::StatusChanged)
            }
        }
    }

    /// Waits up to `timeout` for `listening`.
    #[must_use]
    pub fn wait_for_listening(&self, timeout: Duration) -> Option<HttpEndpoint> {
        self.wait_for(timeout, |signals| signals.listening.clone())
    }

    /// Waits up to `timeout` for `conflict`.
    #[must_use]
    pub fn wait_for_conflict(&self, timeout: Duration) -> Option<Conflict> {
        self.wait_for(timeout, |signals| signals.conflict.clone())
    }

    /// Waits up to `timeout` for `wallets_closing`.
    #[must_use]
    pub fn wait_for_wallets_closing(&self, timeout: Duration) -> Option<Vec<String>> {
        self.wait_for(timeout, |signals| signals.wallets_closing.clone())
    }

    /// Waits up to `timeout` for `operational_error`.
    #[must_use]
    pub fn wait_for_operational_error(&self, timeout: Duration) -> Option<ErrorPayload> {
        self.wait_for(timeout, |signals| signals.operational_error.clone())
    }

    /// Waits up to `timeout` for `status_changed`.
    #[must_use]
    pub fn wait_for_status_changed(&self, timeout: Duration) -> Option<StatusPayload> {
        self.wait_for(timeout, |signals| signals.status_changed.clone())
    }

    /// Waits up to `timeout` for either `listening` or `conflict`.
    ///
    /// A conflict wins when both have fired: the rival owns the endpoint and
    /// the listening report cannot be trusted.
    #[must_use]
    pub fn wait_for_startup(&self, timeout: Duration) -> StartupSignal {
        self.wait_for(timeout, |signals| {
            if let Some(conflict) = &signals.conflict {
                Some(StartupSignal::Conflict(conflict.clone()))
            } else {
                signals.listening.clone().map(StartupSignal::Listening)
            }
        })
        .unwrap_or(StartupSignal::TimedOut)
    }

    /// Whether `signal` fired in the current cycle.
    #[must_use]
    pub fn is_latched(&self, signal: Signal) -> bool {
        self.lock().latched().contains(&signal)
    }

    /// Signals latched in the current cycle, in declaration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Signal> {
        self.lock().latched()
    }

    /// Clears every signal, starting a new run cycle.
    pub fn reset(&self) {
        *self.lock() = Signals::default();
        self.changed.notify_all();
    }

    fn latch<T>(
        &self,
        signal: Signal,
        slot: impl FnOnce(&mut Signals) -> &mut Option<T>,
        value: T,
    ) -> Result<(), TrackerError> {
        let mut signals = self.lock();
        let slot = slot(&mut *signals);
        if slot.is_some() {
            return Err(TrackerError::AlreadyLatched { signal });
        }
        *slot = Some(value);
        drop(signals);
        self.changed.notify_all();
        debug!(target: TRACKER_TARGET, %signal, "signal latched");
        Ok(())
    }

    fn wait_for<T>(&self, timeout: Duration, pick: impl Fn(&Signals) -> Option<T>) -> Option<T> {
        let signals = self.lock();
        let (signals, _) = self
            .changed
            .wait_timeout_while(signals, timeout, |signals| pick(signals).is_none())
            .unwrap_or_else(|poison| poison.into_inner());
        pick(&signals)
    }

    fn lock(&self) -> MutexGuard<'_, Signals> {
        self.signals
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl NotificationSink for NotificationTracker {
    fn deliver(&self, notification: Notification) {
        if let Err(error) = self.record(notification) {
            warn!(target: TRACKER_TARGET, %error, "dropping repeated notification");
        }
    }
}
