use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{AsyncWalletsClosedListener, ListenerError, ListenerRegistry, WalletsClosedDispatch};
use crate::DISPATCH_TARGET;

/// Listener failure recorded during a concurrent dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Registration index of the failing listener.
    pub index: usize,
    /// What went wrong.
    pub error: ListenerError,
}

/// Outcome of one concurrent dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of listeners that were run.
    pub dispatched: usize,
    /// Listeners that failed or panicked.
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    /// Whether every listener succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs future-returning listeners on a tokio runtime.
///
/// Each listener's future is spawned as its own task; a semaphore caps how
/// many run at once. [`AsyncDispatcher::dispatch`] blocks the calling thread
/// until every task has finished, so it must not be called from inside the
/// runtime it dispatches onto.
pub struct AsyncDispatcher {
    registry: ListenerRegistry<AsyncWalletsClosedListener>,
    runtime: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl AsyncDispatcher {
    /// Dispatcher running at most `workers` listeners at once on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            registry: ListenerRegistry::default(),
            runtime,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Size of the worker pool.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Appends a listener.
    pub fn register<F, Fut>(&self, listener: F)
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        self.registry
            .register(Arc::new(move |wallets| listener(wallets).boxed()));
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no listener has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Runs every listener and waits for all of them.
    pub async fn dispatch_async(&self, wallets: &[String]) -> DispatchReport {
        let listeners = self.registry.snapshot();
        let tasks = listeners.into_iter().map(|listener| {
            let permits = Arc::clone(&self.permits);
            let wallets = wallets.to_vec();
            self.runtime.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| ListenerError::new("dispatch worker pool closed"))?;
                listener(wallets).await
            })
        });
        let outcomes = join_all(tasks).await;

        let mut report = DispatchReport {
            dispatched: outcomes.len(),
            failures: Vec::new(),
        };
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(join_error) => ListenerError::new(format!("listener task aborted: {join_error}")),
            };
            warn!(
                target: DISPATCH_TARGET,
                index,
                error = %error,
                "wallet-closed listener failed"
            );
            report.failures.push(ListenerFailure { index, error });
        }
        report
    }

    /// Runs every listener from a thread outside the runtime and waits.
    #[must_use]
    pub fn dispatch(&self, wallets: &[String]) -> DispatchReport {
        self.runtime.block_on(self.dispatch_async(wallets))
    }
}

impl WalletsClosedDispatch for AsyncDispatcher {
    fn dispatch_closed(&self, wallets: &[String]) {
        let report = self.dispatch(wallets);
        if report.is_clean() {
            debug!(
                target: DISPATCH_TARGET,
                listeners = report.dispatched,
                wallets = ?wallets,
                "wallet-closed listeners notified"
            );
        } else {
            warn!(
                target: DISPATCH_TARGET,
                listeners = report.dispatched,
                failed = report.failures.len(),
                "wallet-closed dispatch finished with failures"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rstest::{fixture, rstest};
    use tokio::runtime::{Builder, Runtime};

    use super::*;

    #[fixture]
    fn runtime() -> Runtime {
        Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .expect("tokio runtime")
    }

    fn wallets() -> Vec<String> {
        vec![String::from("a"), String::from("b")]
    }

    #[rstest]
    fn dispatch_waits_for_every_listener(runtime: Runtime) {
        let dispatcher = AsyncDispatcher::new(runtime.handle().clone(), 2);
        let finished = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        for delay in [30_u64, 10, 20] {
            let finished = Arc::clone(&finished);
            let seen = Arc::clone(&seen);
            dispatcher.register(move |wallets: Vec<String>| {
                let finished = Arc::clone(&finished);
                let seen = Arc::clone(&seen);
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    seen.lock().expect("seen lock").push(wallets);
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        let report = dispatcher.dispatch(&wallets());

        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(report.dispatched, 3);
        assert!(report.is_clean());
        assert!(
            seen.lock()
                .expect("seen lock")
                .iter()
                .all(|received| *received == wallets())
        );
    }

    #[rstest]
    fn failures_are_collected_without_aborting_the_batch(runtime: Runtime) {
        let dispatcher = AsyncDispatcher::new(runtime.handle().clone(), 1);
        let ran = Arc::new(AtomicUsize::new(0));
        for index in 0..3_usize {
            let ran = Arc::clone(&ran);
            dispatcher.register(move |_wallets: Vec<String>| {
                let ran = Arc::clone(&ran);
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    if index == 1 {
                        Err(ListenerError::new("listener one failed"))
                    } else {
                        Ok(())
                    }
                }
            });
        }

        let report = dispatcher.dispatch(&wallets());

        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(
            report.failures,
            vec![ListenerFailure {
                index: 1,
                error: ListenerError::new("listener one failed"),
            }]
        );
    }

    #[rstest]
    fn worker_pool_bounds_concurrency(runtime: Runtime) {
        let dispatcher = AsyncDispatcher::new(runtime.handle().clone(), 1);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            dispatcher.register(move |_wallets: Vec<String>| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        let report = dispatcher.dispatch(&wallets());

        assert!(report.is_clean());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.workers(), 1);
    }

    #[rstest]
    fn panicking_listener_is_reported(runtime: Runtime) {
        let dispatcher = AsyncDispatcher::new(runtime.handle().clone(), 1);
        dispatcher.register(|wallets: Vec<String>| async move {
            if wallets.is_empty() {
                return Ok(());
            }
            panic!("listener exploded");
        });

        let report = dispatcher.dispatch(&wallets());

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures.iter().all(|failure| failure.index == 0));
    }
}
