//! Client
//!
//! Action-based client state machine for the Chorus protocol. Keeps a
//! consistent local view of groups, group chat and private sessions on top of
//! an unordered, lossy, at-most-once stream of provider envelopes.
//!
//! # Architecture
//!
//! The client is a pure state machine that:
//! - Receives events from the caller (inbound envelopes, user intents,
//!   shutdown)
//! - Produces actions for the caller to execute (send envelopes, render
//!   lines, log)
//! - Uses the `Environment` trait for time and randomness (deterministic
//!   testing)
//!
//! # Components
//!
//! - [`Client`]: State synchronizer owning all client state
//! - [`command`]: Pure builders for outbound envelopes
//! - [`SessionRegistry`]: One private session per peer identity
//! - [`GroupTable`]: Snapshot, joined set, and group display logs
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chat_log;
mod client;
pub mod command;
mod env;
mod error;
mod event;
mod groups;
mod registry;

pub use chat_log::ChatLog;
pub use chorus_proto as proto;
pub use client::{Client, ClientIdentity};
pub use env::Environment;
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, Intent, LogLevel, LogLine};
pub use groups::{GroupTable, Snapshot};
pub use registry::{Appended, PrivateSession, SessionRegistry};
