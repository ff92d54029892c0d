//! Client error types.
//!
//! Every variant is a refusal of a user intent, reported before any envelope
//! is produced. Inbound provider traffic never yields an error.

use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Local identity is empty.
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// Group name is empty or whitespace.
    #[error("group name must not be empty")]
    EmptyGroupName,

    /// Group name collides with the reserved placeholder.
    #[error("group name is reserved: {group}")]
    ReservedGroupName {
        /// The rejected name.
        group: String,
    },

    /// Message text is empty or whitespace.
    #[error("message must not be empty")]
    EmptyMessage,

    /// Private message peer is empty.
    #[error("peer identity must not be empty")]
    EmptyPeer,

    /// Group is not in the current snapshot.
    #[error("unknown group: {group}")]
    UnknownGroup {
        /// The group that was not found.
        group: String,
    },

    /// Group is already in the current snapshot.
    #[error("group already exists: {group}")]
    GroupAlreadyExists {
        /// The group that already exists.
        group: String,
    },

    /// Local identity has not joined the group.
    #[error("not joined: {group}")]
    NotJoined {
        /// The group that has not been joined.
        group: String,
    },

    /// Local identity already joined the group.
    #[error("already joined: {group}")]
    AlreadyJoined {
        /// The group that was already joined.
        group: String,
    },

    /// Client has been shut down.
    #[error("client is shutting down")]
    ShuttingDown,
}

impl ClientError {
    /// Returns true if this error is fatal (the client will refuse every
    /// further intent).
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ShuttingDown => true,

            Self::EmptyIdentity
            | Self::EmptyGroupName
            | Self::ReservedGroupName { .. }
            | Self::EmptyMessage
            | Self::EmptyPeer
            | Self::UnknownGroup { .. }
            | Self::GroupAlreadyExists { .. }
            | Self::NotJoined { .. }
            | Self::AlreadyJoined { .. } => false,
        }
    }
}
