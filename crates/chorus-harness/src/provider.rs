//! In-memory provider.
//!
//! A broker that keeps the authoritative group table and answers commands
//! the way a real provider does: `refresh` yields a snapshot addressed to
//! the requester, group commands yield lifecycle events, and messages are
//! re-published unchanged. Every output is a broadcast; clients filter.

use std::collections::{BTreeMap, BTreeSet};

use chorus_proto::{Action, Command, Envelope, Event, Lifecycle};

/// Authoritative group table.
pub type ProviderGroups = BTreeMap<String, BTreeSet<String>>;

/// How lifecycle events are published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleStyle {
    /// Structured `lifecycle` field plus the sentence.
    #[default]
    Structured,
    /// Only the free-text sentence in `data`.
    TextOnly,
}

/// Simulated provider.
#[derive(Debug, Clone, Default)]
pub struct SimProvider {
    groups: ProviderGroups,
    style: LifecycleStyle,
    handled: u64,
}

impl SimProvider {
    /// Create an empty provider publishing structured lifecycle events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty provider publishing lifecycle events as text only.
    pub fn text_only() -> Self {
        Self { style: LifecycleStyle::TextOnly, ..Self::default() }
    }

    /// Authoritative group table.
    pub fn groups(&self) -> &ProviderGroups {
        &self.groups
    }

    /// Envelopes handled so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Groups `identity` is a member of.
    pub fn memberships(&self, identity: &str) -> BTreeSet<String> {
        self.groups
            .iter()
            .filter(|(_, members)| members.contains(identity))
            .map(|(group, _)| group.clone())
            .collect()
    }

    /// Snapshot event, optionally addressed to one identity.
    pub fn snapshot_for(&self, to: Option<&str>) -> Envelope {
        let groups = self
            .groups
            .iter()
            .map(|(group, members)| (group.clone(), members.iter().cloned().collect()))
            .collect();
        let to = to.map(str::to_string);
        Envelope::Event(Event { to, groups: Some(groups), ..Event::default() })
    }

    /// Process one published envelope; returns what the provider broadcasts.
    pub fn handle(&mut self, envelope: Envelope) -> Vec<Envelope> {
        self.handled += 1;

        match envelope {
            Envelope::Command(command) => self.handle_command(command),
            Envelope::Message(message) => vec![Envelope::Message(message)],
            // Providers do not accept events from clients.
            Envelope::Event(_) => Vec::new(),
        }
    }

    fn handle_command(&mut self, command: Command) -> Vec<Envelope> {
        let Command { from, action, group } = command;

        if action == Action::Refresh {
            return vec![self.snapshot_for(Some(&from))];
        }
        let Some(group) = group else {
            return Vec::new();
        };

        let lifecycle = match action {
            Action::Create => {
                if self.groups.contains_key(&group) {
                    return Vec::new();
                }
                self.groups.insert(group.clone(), BTreeSet::new());
                Lifecycle::Created { group: Some(group), actor: Some(from) }
            },
            Action::Remove => {
                if self.groups.remove(&group).is_none() {
                    return Vec::new();
                }
                Lifecycle::Removed { group: Some(group), actor: Some(from) }
            },
            // Membership confirmations are re-sent even when nothing changed so
            // a client that lost the first one can recover by retrying.
            Action::Join => {
                let Some(members) = self.groups.get_mut(&group) else {
                    return Vec::new();
                };
                members.insert(from.clone());
                Lifecycle::Joined { group, actor: from }
            },
            Action::Leave => {
                let Some(members) = self.groups.get_mut(&group) else {
                    return Vec::new();
                };
                members.remove(&from);
                Lifecycle::Left { group, actor: from }
            },
            Action::Refresh => return Vec::new(),
        };

        vec![self.publish(lifecycle)]
    }

    fn publish(&self, lifecycle: Lifecycle) -> Envelope {
        match self.style {
            LifecycleStyle::Structured => Envelope::lifecycle(lifecycle),
            LifecycleStyle::TextOnly => {
                Envelope::Event(Event { data: Some(lifecycle.describe()), ..Event::default() })
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn command(from: &str, action: Action, group: Option<&str>) -> Envelope {
        Envelope::command(from, action, group.map(str::to_string))
    }

    #[test]
    fn refresh_answers_requester_only() {
        let mut provider = SimProvider::new();
        provider.handle(command("alice", Action::Create, Some("dev")));

        let out = provider.handle(command("bob", Action::Refresh, None));

        match out.as_slice() {
            [Envelope::Event(event)] => {
                assert_eq!(event.to.as_deref(), Some("bob"));
                assert!(event.groups.as_ref().unwrap().contains_key("dev"));
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_existing_group_is_silent() {
        let mut provider = SimProvider::new();

        assert_eq!(provider.handle(command("alice", Action::Create, Some("dev"))).len(), 1);
        assert!(provider.handle(command("bob", Action::Create, Some("dev"))).is_empty());
    }

    #[test]
    fn join_unknown_group_is_silent() {
        let mut provider = SimProvider::new();

        assert!(provider.handle(command("alice", Action::Join, Some("dev"))).is_empty());
        assert!(provider.memberships("alice").is_empty());
    }

    #[test]
    fn text_only_events_decode_to_lifecycle() {
        let mut provider = SimProvider::text_only();
        provider.handle(command("alice", Action::Create, Some("dev")));

        let out = provider.handle(command("alice", Action::Join, Some("dev")));
        let frame = chorus_proto::encode(&out[0]).unwrap();

        match chorus_proto::decode(&frame).unwrap() {
            Envelope::Event(event) => assert_eq!(
                event.lifecycle,
                Some(Lifecycle::Joined { group: "dev".to_string(), actor: "alice".to_string() })
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn messages_are_forwarded_unchanged() {
        let mut provider = SimProvider::new();
        let message = Envelope::private_message("alice", "bob", "hi", Some("00ff".to_string()));

        assert_eq!(provider.handle(message.clone()), vec![message]);
    }
}
