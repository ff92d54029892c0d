//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest and applied to a
//! [`crate::SimWorld`]. Identifiers are small integers mapped onto a tiny
//! name space so that random sequences collide on the same groups and peers
//! often enough to be interesting.

use arbitrary::Arbitrary;
use chorus_client::ClientError;

/// Client index (0-based).
pub type ClientId = u8;

/// Group index, mapped onto [`GROUP_SPACE`] names.
pub type GroupId = u8;

/// Number of distinct group names operations can reach.
pub const GROUP_SPACE: u8 = 4;

/// Group name for an index.
pub fn group_name(id: GroupId) -> String {
    format!("g{}", id % GROUP_SPACE)
}

/// Operations that can be applied to the world.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client asks to create a group.
    CreateGroup {
        /// Acting client.
        client_id: ClientId,
        /// Target group.
        group: GroupId,
    },

    /// Client asks to remove a group.
    RemoveGroup {
        /// Acting client.
        client_id: ClientId,
        /// Target group.
        group: GroupId,
    },

    /// Client joins a group.
    JoinGroup {
        /// Acting client.
        client_id: ClientId,
        /// Target group.
        group: GroupId,
    },

    /// Client leaves a group.
    LeaveGroup {
        /// Acting client.
        client_id: ClientId,
        /// Target group.
        group: GroupId,
    },

    /// Client requests a snapshot.
    Refresh {
        /// Acting client.
        client_id: ClientId,
    },

    /// Client sends to a group.
    SendGroupMessage {
        /// Sender.
        client_id: ClientId,
        /// Target group.
        group: GroupId,
        /// Message content.
        content: SmallMessage,
    },

    /// Client sends privately to another client.
    SendPrivateMessage {
        /// Sender.
        client_id: ClientId,
        /// Recipient client.
        peer: ClientId,
        /// Message content.
        content: SmallMessage,
    },

    /// Deliver up to `count` queued envelopes to one client.
    Deliver {
        /// Receiving client.
        client_id: ClientId,
        /// Maximum envelopes to deliver.
        count: u8,
    },

    /// Deliver everything queued, including follow-up traffic.
    DeliverAll,

    /// Advance virtual time.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Client leaves every group and stops.
    Shutdown {
        /// Stopping client.
        client_id: ClientId,
    },
}

/// Small message content.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct SmallMessage {
    /// Content seed.
    pub seed: u8,
}

impl SmallMessage {
    /// Expand to message text.
    pub fn to_text(self) -> String {
        format!("msg-{}", self.seed)
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation applied.
    Ok,

    /// The client refused the intent.
    Refused(ClientError),

    /// No client with that index.
    InvalidClient,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}
