//! Notification side-channel of the custodian.
//!
//! The custodian pushes newline-delimited JSON notifications to a TCP
//! endpoint the client allocates per run cycle. [`NotificationServer`] accepts
//! those connections on background threads and forwards every decoded
//! [`Notification`] to a [`NotificationSink`]. [`NotificationTracker`] is the
//! sink the lifecycle coordinator waits on: one latched signal per
//! notification kind, each settable once until the tracker is reset.

mod protocol;
mod server;
#[cfg(test)]
mod server_tests;
mod sink;
mod tracker;

pub use protocol::{
    ConflictPayload, ErrorPayload, ListeningPayload, Notification, ProtocolError, StatusPayload,
    WalletsClosingPayload,
};
pub use server::{NotificationServer, ServerError, ServerHandle};
pub use sink::NotificationSink;
pub use tracker::{Conflict, NotificationTracker, Signal, StartupSignal, TrackerError};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");
const TRACKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::tracker");
