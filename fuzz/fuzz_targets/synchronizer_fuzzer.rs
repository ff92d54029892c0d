//! Fuzz target for the client state synchronizer
//!
//! The client must stay consistent no matter what the provider sends or in
//! which order the user acts.
//!
//! # Strategy
//!
//! - Structured envelopes over a tiny name space so groups and peers collide
//! - Raw frames through the decoder, including legacy lifecycle text
//! - Intents interleaved with inbound traffic, plus shutdown
//!
//! # Invariants
//!
//! - Inbound handling NEVER returns an error or panics
//! - Joined set is always a subset of the snapshot
//! - The reserved placeholder never appears as a group
//! - At most one private session per peer
//! - After shutdown every intent is refused

#![no_main]

use std::{
    cell::Cell,
    collections::BTreeSet,
    time::{Duration, SystemTime},
};

use arbitrary::Arbitrary;
use chorus_client::{Client, ClientError, ClientEvent, ClientIdentity, Environment, Intent};
use chorus_proto::{
    decode, is_reserved_group_name, Action, Envelope, GroupMap, Lifecycle, RESERVED_GROUP_NAME,
};
use libfuzzer_sys::fuzz_target;

const LOCAL: &str = "alice";

#[derive(Clone, Default)]
struct FuzzEnv;

thread_local! {
    static COUNTER: Cell<u64> = const { Cell::new(0) };
}

impl Environment for FuzzEnv {
    fn now(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let n = COUNTER.with(|c| {
            let n = c.get();
            c.set(n + 1);
            n
        });
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = n.to_be_bytes()[i % 8];
        }
    }
}

fn name(id: u8) -> String {
    match id % 5 {
        0 => LOCAL.to_string(),
        4 => RESERVED_GROUP_NAME.to_string(),
        n => format!("n{n}"),
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    Snapshot(Vec<(u8, Vec<u8>)>),
    Lifecycle { kind: u8, group: u8, actor: u8 },
    GroupMessage { from: u8, group: u8, id: Option<u8> },
    PrivateMessage { from: u8, to: u8, id: Option<u8> },
    AddressedEvent { to: u8 },
    RawFrame(Vec<u8>),
    LegacyText(String),
    Intent { kind: u8, target: u8, text: String },
    Shutdown,
}

fn envelope(event: &FuzzEvent) -> Option<Envelope> {
    let envelope = match event {
        FuzzEvent::Snapshot(entries) => {
            let groups: GroupMap = entries
                .iter()
                .map(|(g, members)| (name(*g), members.iter().map(|m| name(*m)).collect()))
                .collect();
            Envelope::snapshot(groups)
        },
        FuzzEvent::Lifecycle { kind, group, actor } => {
            let (group, actor) = (name(*group), name(*actor));
            Envelope::lifecycle(match kind % 4 {
                0 => Lifecycle::Created { group: Some(group), actor: Some(actor) },
                1 => Lifecycle::Removed { group: Some(group), actor: Some(actor) },
                2 => Lifecycle::Joined { group, actor },
                _ => Lifecycle::Left { group, actor },
            })
        },
        FuzzEvent::GroupMessage { from, group, id } => Envelope::group_message(
            name(*from),
            name(*group),
            "text",
            id.map(|id| format!("{id:016x}")),
        ),
        FuzzEvent::PrivateMessage { from, to, id } => Envelope::private_message(
            name(*from),
            name(*to),
            "text",
            id.map(|id| format!("{id:016x}")),
        ),
        FuzzEvent::AddressedEvent { to } => {
            let mut groups = GroupMap::new();
            groups.insert("n1".to_string(), vec![name(*to)]);
            match Envelope::snapshot(groups) {
                Envelope::Event(mut event) => {
                    event.to = Some(name(*to));
                    Envelope::Event(event)
                },
                other => other,
            }
        },
        FuzzEvent::RawFrame(bytes) => return decode(bytes).ok(),
        FuzzEvent::LegacyText(text) => {
            let frame = serde_json::json!({ "type": "event", "data": text }).to_string();
            return decode(frame.as_bytes()).ok();
        },
        FuzzEvent::Intent { .. } | FuzzEvent::Shutdown => return None,
    };
    Some(envelope)
}

fn intent(kind: u8, target: u8, text: &str) -> Intent {
    let target = name(target);
    let text = text.to_string();
    match kind % 8 {
        0 => Intent::CreateGroup { group: target },
        1 => Intent::RemoveGroup { group: target },
        2 => Intent::JoinGroup { group: target },
        3 => Intent::LeaveGroup { group: target },
        4 => Intent::Refresh,
        5 => Intent::SendGroupMessage { group: target, text },
        6 => Intent::SendPrivateMessage { peer: target, text },
        _ => Intent::OpenSession { peer: target },
    }
}

fuzz_target!(|events: Vec<FuzzEvent>| {
    let identity = ClientIdentity::new(LOCAL).expect("valid identity");
    let mut client = Client::new(FuzzEnv, identity);

    for event in &events {
        match event {
            FuzzEvent::Intent { kind, target, text } => {
                let result = client.handle(ClientEvent::Intent(intent(*kind, *target, text)));
                if client.is_shutting_down() {
                    assert_eq!(result, Err(ClientError::ShuttingDown));
                }
                if let Ok(actions) = result {
                    for action in actions {
                        if let chorus_client::ClientAction::Send(Envelope::Command(c)) = action {
                            let reserved = c.group.as_deref().is_some_and(is_reserved_group_name);
                            assert!(!reserved || c.action == Action::Refresh);
                        }
                    }
                }
            },
            FuzzEvent::Shutdown => {
                client.handle(ClientEvent::Shutdown).expect("shutdown never fails");
            },
            other => {
                if let Some(envelope) = envelope(other) {
                    client.handle(ClientEvent::Inbound(envelope)).expect("inbound never fails");
                }
            },
        }

        let groups = client.groups();
        assert!(client.joined().iter().all(|g| groups.contains_key(g)));
        assert!(groups.keys().all(|g| !is_reserved_group_name(g)));

        let peers = client.sessions().peers();
        let unique: BTreeSet<_> = peers.iter().collect();
        assert_eq!(unique.len(), peers.len());
    }
});
