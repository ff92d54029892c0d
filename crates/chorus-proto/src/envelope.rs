//! Envelope types.
//!
//! An [`Envelope`] is one self-contained JSON object on the wire. The `type`
//! field selects the variant:
//!
//! ```text
//! {"type":"command","from":"alice","action":"join","group":"dev"}
//! {"type":"event","groups":{"dev":["alice"]}}
//! {"type":"event","data":"alice joined group dev.","lifecycle":{...}}
//! {"type":"message","from":"alice","group":"dev","data":"hi"}
//! {"type":"message","from":"alice","to":"bob","data":"hi"}
//! ```
//!
//! Fields a variant does not use are omitted on encode and ignored on decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;

/// Group name to member identities, as published by the provider.
pub type GroupMap = BTreeMap<String, Vec<String>>;

/// Command actions understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create a group.
    Create,
    /// Remove a group.
    Remove,
    /// Join a group.
    Join,
    /// Leave a group.
    Leave,
    /// Ask the provider to publish a fresh group snapshot.
    Refresh,
}

impl Action {
    /// Whether the action names a target group.
    pub fn targets_group(self) -> bool {
        !matches!(self, Self::Refresh)
    }

    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wire unit exchanged with the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Client to provider request.
    Command(Command),
    /// Provider notification.
    Event(Event),
    /// Chat line, group or private.
    Message(Message),
}

/// Client to provider request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Issuing identity.
    pub from: String,
    /// Requested action.
    pub action: Action,
    /// Target group, absent for `refresh`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Provider notification.
///
/// A single event may carry a snapshot, a lifecycle transition, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Recipient identity when the event targets a single client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Full replacement of the group table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<GroupMap>,
    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Structured lifecycle transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
}

/// Chat line.
///
/// Exactly one of `to` (private) or `group` is expected; `to` wins when a
/// provider sends both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending identity.
    pub from: String,
    /// Private recipient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Destination group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Message text.
    pub data: String,
    /// Client generated correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Where a [`Message`] is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination<'a> {
    /// Private line to one identity.
    Private(&'a str),
    /// Group chat line.
    Group(&'a str),
}

impl Message {
    /// Resolve the destination, `None` when neither `to` nor `group` is set.
    pub fn destination(&self) -> Option<Destination<'_>> {
        match (&self.to, &self.group) {
            (Some(to), _) => Some(Destination::Private(to)),
            (None, Some(group)) => Some(Destination::Group(group)),
            (None, None) => None,
        }
    }
}

impl Envelope {
    /// Build a command envelope.
    pub fn command(from: impl Into<String>, action: Action, group: Option<String>) -> Self {
        Self::Command(Command { from: from.into(), action, group })
    }

    /// Build a group chat message.
    pub fn group_message(
        from: impl Into<String>,
        group: impl Into<String>,
        data: impl Into<String>,
        id: Option<String>,
    ) -> Self {
        Self::Message(Message {
            from: from.into(),
            to: None,
            group: Some(group.into()),
            data: data.into(),
            id,
        })
    }

    /// Build a private message.
    pub fn private_message(
        from: impl Into<String>,
        to: impl Into<String>,
        data: impl Into<String>,
        id: Option<String>,
    ) -> Self {
        Self::Message(Message {
            from: from.into(),
            to: Some(to.into()),
            group: None,
            data: data.into(),
            id,
        })
    }

    /// Build a snapshot event.
    pub fn snapshot(groups: GroupMap) -> Self {
        Self::Event(Event { groups: Some(groups), ..Event::default() })
    }

    /// Build a lifecycle event carrying both the structured value and its
    /// description.
    pub fn lifecycle(lifecycle: Lifecycle) -> Self {
        Self::Event(Event {
            data: Some(lifecycle.describe()),
            lifecycle: Some(lifecycle),
            ..Event::default()
        })
    }

    /// Wire name of the envelope kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Event(_) => "event",
            Self::Message(_) => "message",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn command_omits_absent_group() {
        let refresh = Envelope::command("alice", Action::Refresh, None);
        let value = serde_json::to_value(&refresh).unwrap();
        assert_eq!(value, json!({"type": "command", "from": "alice", "action": "refresh"}));
    }

    #[test]
    fn private_message_shape() {
        let msg = Envelope::private_message("alice", "bob", "hi", None);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "message", "from": "alice", "to": "bob", "data": "hi"}));
    }

    #[test]
    fn destination_prefers_private() {
        let msg = Message {
            from: "alice".to_string(),
            to: Some("bob".to_string()),
            group: Some("dev".to_string()),
            data: String::new(),
            id: None,
        };
        assert_eq!(msg.destination(), Some(Destination::Private("bob")));
    }

    #[test]
    fn snapshot_event_decodes_with_unknown_fields() {
        let raw = json!({"type": "event", "groups": {"dev": ["alice"]}, "server": "x"});
        let envelope: Envelope = serde_json::from_value(raw).unwrap();
        let Envelope::Event(event) = envelope else {
            panic!("expected event");
        };
        assert_eq!(event.groups.unwrap()["dev"], vec!["alice".to_string()]);
    }

    #[test]
    fn action_targets_group() {
        assert!(Action::Join.targets_group());
        assert!(!Action::Refresh.targets_group());
        assert_eq!(Action::Leave.to_string(), "leave");
    }
}
