//! Custodian lifecycle coordination.
//!
//! A [`Coordinator`] drives one custodian through its run cycles. Each start
//! allocates a fresh notification server, spawns the custodian through a
//! [`ProcessSupervisor`](crate::supervisor::ProcessSupervisor) and waits on
//! the notification tracker until the custodian either reports its RPC
//! endpoint or reports that a rival instance already owns it.

mod coordinator;
mod cycle;
mod error;
mod options;
mod state;

pub use coordinator::{Coordinator, Deployment};
pub use error::LifecycleError;
pub use options::CustodianOptions;
pub use state::LifecycleState;
