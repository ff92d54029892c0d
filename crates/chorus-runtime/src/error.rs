//! Runtime error types.

use chorus_client::ClientError;
use chorus_proto::ProtoError;
use thiserror::Error;

/// Errors that can occur in the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Connecting a channel did not finish in time
    #[error("connect to {addr} timed out")]
    ConnectTimeout {
        /// Address that did not answer.
        addr: String,
    },

    /// Envelope could not be encoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtoError),

    /// The client refused a user intent
    #[error("refused: {0}")]
    Refused(#[from] ClientError),

    /// Outbound queue is full; the envelope was dropped
    #[error("outbound queue full, dropped {kind}")]
    OutboundFull {
        /// Kind of the dropped envelope.
        kind: &'static str,
    },

    /// The runtime has stopped
    #[error("runtime stopped")]
    Stopped,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Returns true for user input refusals, which leave the runtime healthy.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Refused(err) if !err.is_fatal())
    }
}
