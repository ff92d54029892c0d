//! Client events and actions.
//!
//! Events flow into [`crate::Client::handle`]; actions flow out for the
//! caller to execute. The client never performs I/O itself.

use std::time::SystemTime;

use chorus_proto::Envelope;

/// A single line in a group or private conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Identity that wrote the line.
    pub sender: String,
    /// Line text.
    pub text: String,
    /// When the line was appended locally.
    pub at: SystemTime,
    /// Correlation id carried by the envelope, if any.
    pub id: Option<String>,
}

/// User initiated operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Ask the provider to create a group.
    CreateGroup {
        /// Group to create.
        group: String,
    },
    /// Ask the provider to remove a group.
    RemoveGroup {
        /// Group to remove.
        group: String,
    },
    /// Ask the provider to add the local identity to a group.
    JoinGroup {
        /// Group to join.
        group: String,
    },
    /// Ask the provider to remove the local identity from a group.
    LeaveGroup {
        /// Group to leave.
        group: String,
    },
    /// Ask the provider for a fresh snapshot.
    Refresh,
    /// Send a line to a joined group.
    SendGroupMessage {
        /// Destination group.
        group: String,
        /// Message text.
        text: String,
    },
    /// Send a private line to a peer.
    SendPrivateMessage {
        /// Peer identity.
        peer: String,
        /// Message text.
        text: String,
    },
    /// Open (or focus) the conversation with a peer without sending.
    OpenSession {
        /// Peer identity.
        peer: String,
    },
}

/// Events fed into the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Envelope received from the provider.
    Inbound(Envelope),
    /// User intent.
    Intent(Intent),
    /// Stop request: leave every joined group and stop accepting intents.
    Shutdown,
}

/// Severity of a [`ClientAction::Log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Ignored input worth tracing.
    Debug,
    /// Notable state transition.
    Info,
    /// Provider sent something the client refuses to apply.
    Warn,
    /// Unexpected failure.
    Error,
}

/// Actions produced by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Publish an envelope on the outbound channel.
    Send(Envelope),

    /// Group snapshot or joined set changed.
    GroupsChanged,

    /// A line was appended to a group log.
    DeliverGroupMessage {
        /// Group the line belongs to.
        group: String,
        /// The appended line.
        line: LogLine,
    },

    /// A line was appended to a private session.
    DeliverPrivateMessage {
        /// Peer that owns the session.
        peer: String,
        /// The appended line.
        line: LogLine,
    },

    /// A private session was created.
    SessionOpened {
        /// Peer that owns the session.
        peer: String,
    },

    /// Diagnostic for the caller's logger.
    Log {
        /// Severity.
        level: LogLevel,
        /// Description.
        message: String,
    },

    /// Every leave command has been emitted; release the channels.
    Shutdown,
}
