//! Fakes shared by the lifecycle and dispatch suites.

mod custodian;
mod world;

pub use custodian::{FakeSupervisor, RIVAL_PID, Script, listening_endpoint, rival_endpoint};
pub use world::{LifecycleWorld, StepResult, wait_until};
