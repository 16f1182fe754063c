//! Client-side lifecycle management for a wallet-custody process.
//!
//! A [`Custodian`] (or [`AsyncCustodian`] under tokio) spawns the custodian
//! binary, waits on its notification channel until it reports an RPC
//! endpoint, and tears everything down again on `close`. When the custodian
//! announces that it is locking wallets the registered listeners are told
//! which ones. Failures returned by wallet RPC calls are classified into
//! [`DetectedError`]s by the [`detect`] module.
//!
//! ```no_run
//! use custos::{Custodian, CustodianOptions, LocalSupervisor};
//! use custos_config::ProcessSettings;
//! use std::sync::Arc;
//!
//! let custodian = Custodian::new(
//!     Arc::new(LocalSupervisor::new("beekeeper")),
//!     CustodianOptions::new(),
//! );
//! custodian.on_wallets_closed(|wallets| {
//!     println!("closing {wallets:?}");
//!     Ok(())
//! });
//! custodian.start(ProcessSettings::new("/var/lib/custos"))?;
//! println!("RPC at {}", custodian.rpc_endpoint()?);
//! custodian.close();
//! # Ok::<(), custos::LifecycleError>(())
//! ```

pub mod detect;
pub mod dispatch;
mod facade;
pub mod lifecycle;
pub mod rpc;
pub mod supervisor;
pub mod telemetry;
pub mod wallet;

#[cfg(test)]
mod tests;

pub use detect::{CallError, DetectedError, Detector};
pub use dispatch::{DispatchReport, ListenerError};
pub use facade::{AsyncCustodian, Custodian};
pub use lifecycle::{Coordinator, CustodianOptions, Deployment, LifecycleError, LifecycleState};
pub use supervisor::{CustodianProcess, KeyPair, LocalSupervisor, ProcessSupervisor, SupervisorError};
pub use wallet::{WalletClient, WalletInfo};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");
const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");
const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
const DETECT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::detect");
const WALLET_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::wallet");
