//! State owned by one run cycle and the sink feeding it.

use std::sync::Arc;

use custos_config::ProcessSettings;
use custos_notify::{Notification, NotificationSink, NotificationTracker, ServerHandle, Signal};
use tracing::{debug, error, warn};

use super::LifecycleState;
use crate::LIFECYCLE_TARGET;
use crate::dispatch::WalletsClosedDispatch;
use crate::supervisor::CustodianProcess;

#[derive(Default)]
pub(super) struct Cycle {
    pub(super) state: LifecycleState,
    pub(super) settings: Option<ProcessSettings>,
    pub(super) process: Option<Box<dyn CustodianProcess>>,
    pub(super) server: Option<ServerHandle>,
}

impl Cycle {
    pub(super) fn enter(&mut self, next: LifecycleState) {
        debug!(target: LIFECYCLE_TARGET, from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }
}

/// Routes notifications of the current cycle into the tracker and fires
/// wallet-closed dispatch once `wallets_closing` latches.
pub(super) struct CycleSink {
    tracker: Arc<NotificationTracker>,
    dispatcher: Arc<dyn WalletsClosedDispatch>,
}

impl CycleSink {
    pub(super) fn new(
        tracker: Arc<NotificationTracker>,
        dispatcher: Arc<dyn WalletsClosedDispatch>,
    ) -> Self {
        Self {
            tracker,
            dispatcher,
        }
    }
}

impl NotificationSink for CycleSink {
    fn deliver(&self, notification: Notification) {
        let closing = match &notification {
            Notification::AttemptClosingWallets(payload) => Some(payload.wallets.clone()),
            Notification::Error(payload) => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    message = %payload.message,
                    "custodian reported an error"
                );
                None
            }
            Notification::StatusChange(payload) => {
                debug!(target: LIFECYCLE_TARGET, status = %payload.status, "custodian status changed");
                None
            }
            Notification::HttpListening(_) | Notification::AlreadyRunning(_) => None,
        };

        match self.tracker.record(notification) {
            Ok(Signal::WalletsClosing) => {
                if let Some(wallets) = closing {
                    self.dispatcher.dispatch_closed(&wallets);
                }
            }
            Ok(_) => {}
            Err(rejected) => {
                error!(
                    target: LIFECYCLE_TARGET,
                    error = %rejected,
                    "custodian repeated a notification within one run cycle"
                );
            }
        }
    }
}
