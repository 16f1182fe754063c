use strum::Display;

/// Position of a custodian handle in its run cycle.
///
/// ```text
/// Idle -> Starting -> Ready -> Running -> Closing -> Closed
///            |
///            +-> ConflictDetected -> Closing -> Closed
/// ```
///
/// `Closed` may start again. A start that times out stays in `Starting`
/// until the handle is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    /// Never started.
    #[default]
    Idle,
    /// Spawned, waiting for the custodian to report.
    Starting,
    /// The custodian reported its endpoint.
    Ready,
    /// Serving RPC.
    Running,
    /// Another custodian owns the endpoint.
    ConflictDetected,
    /// Tearing down.
    Closing,
    /// Torn down; may start again.
    Closed,
}

impl LifecycleState {
    /// Whether `start` is accepted from this state.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }
}
