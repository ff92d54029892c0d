//! Client state machine.
//!
//! The `Client` is the state synchronizer: it owns the group snapshot, the
//! joined set and the private session registry, and applies inbound
//! envelopes and user intents to them one at a time. The caller is
//! responsible for funnelling every event through a single owner.
//!
//! # Trust boundary
//!
//! Provider input never produces an error. Anything the client cannot apply
//! (unknown group, stale join, reserved name, echo of its own message)
//! degrades to a [`ClientAction::Log`] and is otherwise ignored.
//!
//! # Idempotency
//!
//! Applying the same inbound envelope twice changes nothing after the first
//! application: snapshots replace, membership patches are set operations,
//! and messages carrying a correlation id are appended once.

use std::collections::BTreeSet;

use chorus_proto::{
    Action, Destination, Envelope, Event, GroupMap, Lifecycle, Message, is_reserved_group_name,
};

use crate::{
    command,
    env::Environment,
    error::ClientError,
    event::{ClientAction, ClientEvent, Intent, LogLevel, LogLine},
    groups::{GroupTable, Snapshot},
    registry::{PrivateSession, SessionRegistry},
};

/// Client identity.
///
/// An opaque, non-empty name chosen at login. Compared by exact string
/// equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    name: String,
}

impl ClientIdentity {
    /// Create an identity, refusing empty names.
    pub fn new(name: impl Into<String>) -> Result<Self, ClientError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ClientError::EmptyIdentity);
        }
        Ok(Self { name })
    }

    /// The identity string.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Client state machine.
///
/// Pure state machine - returns actions, caller handles I/O.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time/randomness
pub struct Client<E: Environment> {
    /// Local identity.
    identity: ClientIdentity,

    /// Group snapshot, joined set, group logs.
    groups: GroupTable,

    /// Private conversations.
    sessions: SessionRegistry,

    /// Environment for time/randomness.
    env: E,

    /// Set once shutdown has been processed.
    shutting_down: bool,
}

impl<E: Environment> Client<E> {
    /// Create a new client with the given identity.
    pub fn new(env: E, identity: ClientIdentity) -> Self {
        let sessions = SessionRegistry::new(identity.name());
        Self { identity, groups: GroupTable::new(), sessions, env, shutting_down: false }
    }

    /// Local identity.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Current group snapshot.
    pub fn groups(&self) -> &Snapshot {
        self.groups.snapshot()
    }

    /// Members of `group`, if the group is known.
    pub fn members(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.members(group)
    }

    /// Groups the local identity joined.
    pub fn joined(&self) -> &BTreeSet<String> {
        self.groups.joined()
    }

    /// Whether the local identity joined `group`.
    pub fn is_joined(&self, group: &str) -> bool {
        self.groups.is_joined(group)
    }

    /// Display log of a known group.
    pub fn group_log(&self, group: &str) -> Option<&[LogLine]> {
        self.groups.log(group)
    }

    /// Private session with `peer`, if one exists.
    pub fn session(&self, peer: &str) -> Option<&PrivateSession> {
        self.sessions.get(peer)
    }

    /// Private session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Whether shutdown has been processed.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Only [`ClientEvent::Intent`] can fail, with a user-facing refusal.
    /// Inbound envelopes and shutdown always succeed.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Inbound(envelope) => Ok(self.handle_inbound(envelope)),
            ClientEvent::Intent(intent) => self.handle_intent(intent),
            ClientEvent::Shutdown => Ok(self.handle_shutdown()),
        }
    }

    /// Apply one envelope received from the provider.
    fn handle_inbound(&mut self, envelope: Envelope) -> Vec<ClientAction> {
        if self.shutting_down {
            let message = format!("ignoring {} after shutdown", envelope.kind());
            return vec![log(LogLevel::Debug, message)];
        }

        match envelope {
            Envelope::Event(event) => self.handle_event(event),
            Envelope::Message(message) => self.handle_message(message),
            Envelope::Command(command) => vec![log(
                LogLevel::Debug,
                format!("ignoring {} command from {}", command.action, command.from),
            )],
        }
    }

    /// Handle snapshot and lifecycle events.
    fn handle_event(&mut self, event: Event) -> Vec<ClientAction> {
        if let Some(to) = &event.to
            && to != self.identity.name()
        {
            return vec![];
        }

        let mut actions = Vec::new();
        let carried_snapshot = event.groups.is_some();

        if let Some(groups) = event.groups {
            self.apply_snapshot(groups, &mut actions);
        }

        match event.lifecycle {
            Some(lifecycle) => self.apply_lifecycle(lifecycle, carried_snapshot, &mut actions),
            None if !carried_snapshot => actions.push(log(
                LogLevel::Debug,
                format!("ignoring unrecognised event: {:?}", event.data.unwrap_or_default()),
            )),
            None => {},
        }

        actions
    }

    /// Replace the snapshot wholesale; the joined set is intersected with it.
    fn apply_snapshot(&mut self, groups: GroupMap, actions: &mut Vec<ClientAction>) {
        let mut snapshot = Snapshot::new();

        for (group, members) in groups {
            if is_reserved_group_name(&group) {
                actions.push(log(
                    LogLevel::Warn,
                    format!("provider snapshot names reserved group {group:?}, dropping it"),
                ));
                continue;
            }
            snapshot.insert(group, members.into_iter().collect());
        }

        if self.groups.replace(snapshot) {
            actions.push(ClientAction::GroupsChanged);
        }
    }

    /// Apply a structured lifecycle transition.
    fn apply_lifecycle(
        &mut self,
        lifecycle: Lifecycle,
        carried_snapshot: bool,
        actions: &mut Vec<ClientAction>,
    ) {
        if let Some(group) = lifecycle.group()
            && is_reserved_group_name(group)
        {
            actions.push(log(
                LogLevel::Warn,
                format!("provider lifecycle names reserved group {group:?}, ignoring"),
            ));
            return;
        }

        match lifecycle {
            Lifecycle::Created { .. } | Lifecycle::Removed { .. } => {
                // The event does not carry membership, so ask for a full snapshot
                // unless this event already brought one.
                if !carried_snapshot {
                    actions.push(ClientAction::Send(Envelope::command(
                        self.identity.name(),
                        Action::Refresh,
                        None,
                    )));
                }
            },
            Lifecycle::Joined { group, actor } => {
                if !self.groups.contains(&group) {
                    actions.push(log(
                        LogLevel::Debug,
                        format!("{actor} joined unknown group {group}, ignoring"),
                    ));
                    return;
                }
                let is_local = actor == self.identity.name();
                if self.groups.add_member(&group, &actor, is_local) {
                    actions.push(ClientAction::GroupsChanged);
                }
            },
            Lifecycle::Left { group, actor } => {
                let is_local = actor == self.identity.name();
                if self.groups.remove_member(&group, &actor, is_local) {
                    actions.push(ClientAction::GroupsChanged);
                }
            },
        }
    }

    /// Route a chat line to a group log or a private session.
    fn handle_message(&mut self, message: Message) -> Vec<ClientAction> {
        if message.from == self.identity.name() {
            // Own lines were already echoed locally when sent.
            return vec![log(LogLevel::Debug, "ignoring echo of own message".to_string())];
        }

        let line = LogLine {
            sender: message.from.clone(),
            text: message.data.clone(),
            at: self.env.now(),
            id: message.id.clone(),
        };

        match message.destination() {
            Some(Destination::Private(to)) => {
                if to != self.identity.name() {
                    return vec![];
                }
                self.deliver_private(&message.from, line)
            },
            Some(Destination::Group(group)) => {
                if is_reserved_group_name(group) {
                    return vec![log(
                        LogLevel::Warn,
                        format!("message to reserved group {group:?} from {}", message.from),
                    )];
                }
                if !self.groups.contains(group) {
                    return vec![log(
                        LogLevel::Debug,
                        format!("dropping message for unknown group {group}"),
                    )];
                }
                self.deliver_group(group, line)
            },
            None => vec![],
        }
    }

    /// Handle a user intent.
    fn handle_intent(&mut self, intent: Intent) -> Result<Vec<ClientAction>, ClientError> {
        if self.shutting_down {
            return Err(ClientError::ShuttingDown);
        }

        match intent {
            Intent::CreateGroup { group } => {
                let envelope =
                    command::command(&self.identity, Action::Create, Some(group.as_str()))?;
                if self.groups.contains(&group) {
                    return Err(ClientError::GroupAlreadyExists { group });
                }
                Ok(vec![ClientAction::Send(envelope)])
            },
            Intent::RemoveGroup { group } => {
                let envelope =
                    command::command(&self.identity, Action::Remove, Some(group.as_str()))?;
                self.require_known(&group)?;
                Ok(vec![ClientAction::Send(envelope)])
            },
            Intent::JoinGroup { group } => {
                let envelope =
                    command::command(&self.identity, Action::Join, Some(group.as_str()))?;
                self.require_known(&group)?;
                if self.groups.is_joined(&group) {
                    return Err(ClientError::AlreadyJoined { group });
                }
                Ok(vec![ClientAction::Send(envelope)])
            },
            Intent::LeaveGroup { group } => {
                let envelope =
                    command::command(&self.identity, Action::Leave, Some(group.as_str()))?;
                self.require_joined(&group)?;
                Ok(vec![ClientAction::Send(envelope)])
            },
            Intent::Refresh => {
                let envelope = command::command(&self.identity, Action::Refresh, None)?;
                Ok(vec![ClientAction::Send(envelope)])
            },
            Intent::SendGroupMessage { group, text } => self.send_group_message(&group, &text),
            Intent::SendPrivateMessage { peer, text } => self.send_private_message(&peer, &text),
            Intent::OpenSession { peer } => {
                let peer = command::validate_peer(&peer)?;
                let (_, created) = self.sessions.get_or_create(peer);
                Ok(if created {
                    vec![ClientAction::SessionOpened { peer: peer.to_string() }]
                } else {
                    vec![]
                })
            },
        }
    }

    /// Send a group line and echo it locally.
    fn send_group_message(
        &mut self,
        group: &str,
        text: &str,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let id = self.env.message_id();
        let envelope = command::group_message(&self.identity, group, text, Some(id.clone()))?;
        self.require_joined(group)?;

        let line = self.local_line(text, id);
        let mut actions = vec![ClientAction::Send(envelope)];
        actions.extend(self.deliver_group(group, line));
        Ok(actions)
    }

    /// Send a private line and echo it into the peer's session.
    fn send_private_message(
        &mut self,
        peer: &str,
        text: &str,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let id = self.env.message_id();
        let envelope = command::private_message(&self.identity, peer, text, Some(id.clone()))?;

        let line = self.local_line(text, id);
        let mut actions = vec![ClientAction::Send(envelope)];
        actions.extend(self.deliver_private(peer, line));
        Ok(actions)
    }

    /// Emit a leave command for every joined group, then stop.
    ///
    /// Repeated calls produce nothing.
    fn handle_shutdown(&mut self) -> Vec<ClientAction> {
        if self.shutting_down {
            return vec![];
        }
        self.shutting_down = true;

        let mut actions: Vec<ClientAction> = self
            .groups
            .joined()
            .iter()
            .map(|group| {
                ClientAction::Send(Envelope::command(
                    self.identity.name(),
                    Action::Leave,
                    Some(group.clone()),
                ))
            })
            .collect();

        actions.push(log(
            LogLevel::Info,
            format!("shutting down, leaving {} group(s)", actions.len()),
        ));
        actions.push(ClientAction::Shutdown);
        actions
    }

    fn deliver_group(&mut self, group: &str, line: LogLine) -> Vec<ClientAction> {
        if self.groups.append(group, line.clone()) {
            vec![ClientAction::DeliverGroupMessage { group: group.to_string(), line }]
        } else {
            vec![log(LogLevel::Debug, format!("duplicate line in group {group}"))]
        }
    }

    fn deliver_private(&mut self, peer: &str, line: LogLine) -> Vec<ClientAction> {
        let outcome = self.sessions.append(peer, line.clone());

        let mut actions = Vec::with_capacity(2);
        if outcome.session_created {
            actions.push(ClientAction::SessionOpened { peer: peer.to_string() });
        }
        if outcome.appended {
            actions.push(ClientAction::DeliverPrivateMessage { peer: peer.to_string(), line });
        } else {
            actions.push(log(LogLevel::Debug, format!("duplicate line from {peer}")));
        }
        actions
    }

    fn local_line(&self, text: &str, id: String) -> LogLine {
        LogLine {
            sender: self.identity.name().to_string(),
            text: text.trim().to_string(),
            at: self.env.now(),
            id: Some(id),
        }
    }

    fn require_known(&self, group: &str) -> Result<(), ClientError> {
        if self.groups.contains(group) {
            Ok(())
        } else {
            Err(ClientError::UnknownGroup { group: group.to_string() })
        }
    }

    fn require_joined(&self, group: &str) -> Result<(), ClientError> {
        if self.groups.is_joined(group) {
            Ok(())
        } else {
            Err(ClientError::NotJoined { group: group.to_string() })
        }
    }
}

fn log(level: LogLevel, message: String) -> ClientAction {
    ClientAction::Log { level, message }
}
