//! Deterministic simulation harness for Chorus client testing.
//!
//! Runs any number of [`chorus_client::Client`]s against an in-memory
//! provider over a broadcast channel that can drop, duplicate and reorder
//! envelopes. Everything is driven by seeds, so a failing case replays
//! exactly.
//!
//! # Model-Based Testing
//!
//! [`Operation`]s are generated by proptest and applied to a [`SimWorld`].
//! After each run the observable client state ([`ClientView`]) is compared
//! against the provider's authoritative table and against a fault-free run
//! of the same operations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod operation;
pub mod provider;
pub mod sim_env;
pub mod world;

pub use faults::{FaultConfig, FaultInjector, FaultStats};
pub use operation::{
    ClientId, GROUP_SPACE, GroupId, Operation, OperationResult, SmallMessage, group_name,
};
pub use provider::{LifecycleStyle, ProviderGroups, SimProvider};
pub use sim_env::SimEnv;
pub use world::{ClientView, SimWorld, ViewLine, identity_name, refusal};
