//! Simulated world: clients, provider and faulty broadcast channel.
//!
//! Publishing is synchronous: an envelope a client sends reaches the
//! provider immediately, and the provider's output is queued on every
//! client's inbox (through the fault injector). Inboxes drain only when an
//! operation delivers them, which is where ordering and timing vary.
//! Every delivered envelope crosses the real JSON codec.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chorus_client::{
    Client, ClientAction, ClientError, ClientEvent, ClientIdentity, Intent, LogLine, Snapshot,
};
use chorus_proto::{Envelope, is_reserved_group_name};

use crate::{
    faults::{FaultConfig, FaultInjector, FaultStats},
    operation::{ClientId, Operation, OperationResult, group_name},
    provider::SimProvider,
    sim_env::SimEnv,
};

/// Upper bound on deliveries in one [`SimWorld::settle`] call.
const MAX_SETTLE_DELIVERIES: usize = 100_000;

const NAMES: [&str; 6] = ["alice", "bob", "carol", "dave", "erin", "frank"];

/// Identity used for client `index`.
pub fn identity_name(index: usize) -> String {
    NAMES.get(index).map_or_else(|| format!("user{index}"), |name| (*name).to_string())
}

/// A chat line reduced to what other clients can observe.
pub type ViewLine = (String, String);

/// Observable state of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    /// Client identity.
    pub identity: String,
    /// Group snapshot.
    pub groups: Snapshot,
    /// Joined set.
    pub joined: BTreeSet<String>,
    /// Group display logs, by group.
    pub group_logs: BTreeMap<String, Vec<ViewLine>>,
    /// Private session logs, by peer.
    pub sessions: BTreeMap<String, Vec<ViewLine>>,
    /// Whether the client has shut down.
    pub stopped: bool,
}

/// Clients plus provider plus faulty channel.
pub struct SimWorld {
    env: SimEnv,
    provider: SimProvider,
    clients: Vec<Client<SimEnv>>,
    inboxes: Vec<VecDeque<Envelope>>,
    faults: FaultInjector,
    decode_errors: u64,
}

impl SimWorld {
    /// Create `num_clients` clients against an empty provider with perfect
    /// delivery.
    pub fn new(num_clients: usize, seed: u64) -> Self {
        Self::with_provider(num_clients, seed, SimProvider::new(), FaultConfig::NONE)
    }

    /// Create a world with a specific provider and fault profile.
    pub fn with_provider(
        num_clients: usize,
        seed: u64,
        provider: SimProvider,
        faults: FaultConfig,
    ) -> Self {
        let env = SimEnv::with_seed(seed);
        let clients = (0..num_clients)
            .filter_map(|i| ClientIdentity::new(identity_name(i)).ok())
            .map(|identity| Client::new(env.clone(), identity))
            .collect();

        Self {
            env,
            provider,
            clients,
            inboxes: vec![VecDeque::new(); num_clients],
            faults: FaultInjector::new(seed.rotate_left(17) ^ 0x5eed, faults),
            decode_errors: 0,
        }
    }

    /// Number of clients.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Client by index.
    pub fn client(&self, id: ClientId) -> Option<&Client<SimEnv>> {
        self.clients.get(usize::from(id))
    }

    /// The provider.
    pub fn provider(&self) -> &SimProvider {
        &self.provider
    }

    /// Faults injected so far.
    pub fn fault_stats(&self) -> FaultStats {
        self.faults.stats()
    }

    /// Frames that failed to decode on delivery.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Envelopes waiting in any inbox.
    pub fn pending(&self) -> usize {
        self.inboxes.iter().map(VecDeque::len).sum()
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::CreateGroup { client_id, group } => {
                self.intent(client_id, Intent::CreateGroup { group: group_name(group) })
            },
            Operation::RemoveGroup { client_id, group } => {
                self.intent(client_id, Intent::RemoveGroup { group: group_name(group) })
            },
            Operation::JoinGroup { client_id, group } => {
                self.intent(client_id, Intent::JoinGroup { group: group_name(group) })
            },
            Operation::LeaveGroup { client_id, group } => {
                self.intent(client_id, Intent::LeaveGroup { group: group_name(group) })
            },
            Operation::Refresh { client_id } => self.intent(client_id, Intent::Refresh),
            Operation::SendGroupMessage { client_id, group, content } => self.intent(
                client_id,
                Intent::SendGroupMessage { group: group_name(group), text: content.to_text() },
            ),
            Operation::SendPrivateMessage { client_id, peer, content } => {
                let peer = identity_name(usize::from(peer) % self.clients.len().max(1));
                let text = content.to_text();
                self.intent(client_id, Intent::SendPrivateMessage { peer, text })
            },
            Operation::Deliver { client_id, count } => {
                if usize::from(client_id) >= self.clients.len() {
                    return OperationResult::InvalidClient;
                }
                for _ in 0..count {
                    if !self.deliver_one(usize::from(client_id)) {
                        break;
                    }
                }
                OperationResult::Ok
            },
            Operation::DeliverAll => {
                self.settle();
                OperationResult::Ok
            },
            Operation::AdvanceTime { millis } => {
                self.env.advance(std::time::Duration::from_millis(u64::from(millis)));
                OperationResult::Ok
            },
            Operation::Shutdown { client_id } => {
                self.handle(usize::from(client_id), ClientEvent::Shutdown)
            },
        }
    }

    /// Submit an intent for one client.
    pub fn intent(&mut self, client_id: ClientId, intent: Intent) -> OperationResult {
        self.handle(usize::from(client_id), ClientEvent::Intent(intent))
    }

    /// Deliver until every inbox is empty. Returns the number of deliveries.
    pub fn settle(&mut self) -> usize {
        let mut delivered = 0;
        while self.pending() > 0 && delivered < MAX_SETTLE_DELIVERIES {
            for index in 0..self.inboxes.len() {
                if self.deliver_one(index) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Stop injecting faults, have every live client refresh, and settle.
    pub fn converge(&mut self) {
        self.faults.set_enabled(false);
        self.settle();
        for index in 0..self.clients.len() {
            if let Ok(id) = ClientId::try_from(index) {
                let _ = self.intent(id, Intent::Refresh);
            }
        }
        self.settle();
    }

    /// Observable state of one client.
    pub fn view(&self, id: ClientId) -> Option<ClientView> {
        let client = self.client(id)?;

        let group_logs = client
            .groups()
            .keys()
            .filter_map(|group| {
                let lines = client.group_log(group).filter(|lines| !lines.is_empty())?;
                Some((group.clone(), lines.iter().map(view_line).collect()))
            })
            .collect();

        let sessions = client
            .sessions()
            .peers()
            .into_iter()
            .filter_map(|peer| {
                let session = client.session(peer)?;
                Some((peer.to_string(), session.lines().iter().map(view_line).collect()))
            })
            .collect();

        Some(ClientView {
            identity: client.identity().name().to_string(),
            groups: client.groups().clone(),
            joined: client.joined().clone(),
            group_logs,
            sessions,
            stopped: client.is_shutting_down(),
        })
    }

    /// Observable state of every client.
    pub fn views(&self) -> Vec<ClientView> {
        (0..self.clients.len())
            .filter_map(|i| ClientId::try_from(i).ok())
            .filter_map(|id| self.view(id))
            .collect()
    }

    /// Check the state invariants every client must hold at all times.
    pub fn check_invariants(&self) -> Result<(), String> {
        for client in &self.clients {
            let name = client.identity().name();

            let groups = client.groups();
            if let Some(group) = client.joined().iter().find(|g| !groups.contains_key(*g)) {
                return Err(format!("{name}: joined {group} which is not in the snapshot"));
            }
            if let Some(group) = client.groups().keys().find(|g| is_reserved_group_name(g)) {
                return Err(format!("{name}: snapshot contains reserved name {group:?}"));
            }
            for group in client.groups().keys() {
                let ids = client
                    .group_log(group)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|l| l.id.as_deref());
                if let Some(id) = first_duplicate(ids) {
                    return Err(format!("{name}: id {id} appended twice to {group}"));
                }
            }
            for peer in client.sessions().peers() {
                let Some(session) = client.session(peer) else {
                    return Err(format!("{name}: listed session {peer} is missing"));
                };
                if session.peer() != peer || session.local() != name {
                    return Err(format!("{name}: session {peer} is keyed wrongly"));
                }
                let ids = session.lines().iter().filter_map(|l| l.id.as_deref());
                if let Some(id) = first_duplicate(ids) {
                    return Err(format!("{name}: id {id} appended twice to session {peer}"));
                }
            }
        }
        Ok(())
    }

    fn handle(&mut self, index: usize, event: ClientEvent) -> OperationResult {
        let Some(client) = self.clients.get_mut(index) else {
            return OperationResult::InvalidClient;
        };
        match client.handle(event) {
            Ok(actions) => {
                self.execute(actions);
                OperationResult::Ok
            },
            Err(e) => OperationResult::Refused(e),
        }
    }

    /// Deliver the head of one inbox. Returns false if it was empty.
    fn deliver_one(&mut self, index: usize) -> bool {
        let Some(envelope) = self.inboxes.get_mut(index).and_then(VecDeque::pop_front) else {
            return false;
        };

        let decoded =
            chorus_proto::encode(&envelope).and_then(|frame| chorus_proto::decode(&frame));
        match decoded {
            Ok(envelope) => {
                let _ = self.handle(index, ClientEvent::Inbound(envelope));
            },
            Err(_) => self.decode_errors += 1,
        }
        true
    }

    fn execute(&mut self, actions: Vec<ClientAction>) {
        for action in actions {
            if let ClientAction::Send(envelope) = action {
                self.publish(envelope);
            }
        }
    }

    fn publish(&mut self, envelope: Envelope) {
        for output in self.provider.handle(envelope) {
            for inbox in &mut self.inboxes {
                self.faults.deliver(inbox, output.clone());
            }
        }
    }
}

fn first_duplicate<'a>(mut ids: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = BTreeSet::new();
    ids.find(|id| !seen.insert(*id))
}

fn view_line(line: &LogLine) -> ViewLine {
    (line.sender.clone(), line.text.clone())
}

/// Convenience: refusal reported by the client, if any.
pub fn refusal(result: &OperationResult) -> Option<&ClientError> {
    match result {
        OperationResult::Refused(e) => Some(e),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operation::SmallMessage;

    #[test]
    fn identities_are_distinct() {
        let names: BTreeSet<_> = (0..10).map(identity_name).collect();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn create_reaches_every_client_after_settle() {
        let mut world = SimWorld::new(3, 1);

        assert!(world.apply(&Operation::CreateGroup { client_id: 0, group: 1 }).is_ok());
        world.settle();

        for view in world.views() {
            assert!(view.groups.contains_key("g1"), "{} missed g1", view.identity);
        }
        world.check_invariants().unwrap();
    }

    #[test]
    fn group_message_reaches_other_members_once() {
        let mut world = SimWorld::new(2, 2);
        world.apply(&Operation::CreateGroup { client_id: 0, group: 0 });
        world.settle();
        world.apply(&Operation::JoinGroup { client_id: 0, group: 0 });
        world.settle();

        let send = Operation::SendGroupMessage {
            client_id: 0,
            group: 0,
            content: SmallMessage { seed: 9 },
        };
        assert!(world.apply(&send).is_ok());
        world.settle();

        let expected = vec![("alice".to_string(), "msg-9".to_string())];
        assert_eq!(world.view(0).unwrap().group_logs["g0"], expected);
        assert_eq!(world.view(1).unwrap().group_logs["g0"], expected);
    }

    #[test]
    fn invalid_client_is_reported() {
        let mut world = SimWorld::new(1, 3);

        let refresh = world.apply(&Operation::Refresh { client_id: 5 });
        assert_eq!(refresh, OperationResult::InvalidClient);
        assert_eq!(
            world.apply(&Operation::Deliver { client_id: 5, count: 1 }),
            OperationResult::InvalidClient
        );
    }

    #[test]
    fn refusals_surface_client_errors() {
        let mut world = SimWorld::new(1, 4);

        let result = world.apply(&Operation::JoinGroup { client_id: 0, group: 2 });

        assert_eq!(refusal(&result), Some(&ClientError::UnknownGroup { group: "g2".to_string() }));
    }
}
