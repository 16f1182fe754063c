//! Public handles over the lifecycle coordinator.
//!
//! [`Custodian`] runs every transition on the caller's thread and dispatches
//! wallet-closed listeners sequentially. [`AsyncCustodian`] runs the same
//! transitions on tokio's blocking pool and fans listeners out as tasks.
//! Both close their custodian when dropped.

mod blocking;
mod concurrent;

pub use blocking::Custodian;
pub use concurrent::AsyncCustodian;

use crate::lifecycle::LifecycleState;

/// Whether dropping a handle in `state` has anything to tear down.
const fn needs_close(state: LifecycleState) -> bool {
    !matches!(state, LifecycleState::Idle | LifecycleState::Closed)
}
