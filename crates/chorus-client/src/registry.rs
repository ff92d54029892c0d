//! Private session registry.
//!
//! At most one [`PrivateSession`] exists per peer identity. Sessions are
//! created lazily on the first line in either direction and live until the
//! process ends; the protocol has no close operation. Peer identities are
//! used verbatim (no case or whitespace normalisation).

use std::collections::{HashMap, hash_map::Entry};

use crate::{chat_log::ChatLog, event::LogLine};

/// One private conversation.
#[derive(Debug, Clone)]
pub struct PrivateSession {
    local: String,
    peer: String,
    log: ChatLog,
}

impl PrivateSession {
    fn new(local: String, peer: String) -> Self {
        Self { local, peer, log: ChatLog::new() }
    }

    /// Local identity.
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Remote peer identity.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Lines in arrival order.
    pub fn lines(&self) -> &[LogLine] {
        self.log.lines()
    }
}

/// Outcome of [`SessionRegistry::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    /// The session did not exist before this call.
    pub session_created: bool,
    /// The line was appended (false for a duplicate id).
    pub appended: bool,
}

/// Sessions keyed by peer identity.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    local: String,
    sessions: HashMap<String, PrivateSession>,
}

impl SessionRegistry {
    /// Create an empty registry for `local`.
    pub fn new(local: impl Into<String>) -> Self {
        Self { local: local.into(), sessions: HashMap::new() }
    }

    /// Return the session for `peer`, creating it if needed.
    ///
    /// The flag is true when the session was created by this call.
    pub fn get_or_create(&mut self, peer: &str) -> (&mut PrivateSession, bool) {
        match self.sessions.entry(peer.to_string()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let session = PrivateSession::new(self.local.clone(), peer.to_string());
                (entry.insert(session), true)
            },
        }
    }

    /// Append a line to the session for `peer`, creating it if needed.
    pub fn append(&mut self, peer: &str, line: LogLine) -> Appended {
        let (session, session_created) = self.get_or_create(peer);
        let appended = session.log.append(line);
        Appended { session_created, appended }
    }

    /// Session for `peer`, if one exists.
    pub fn get(&self, peer: &str) -> Option<&PrivateSession> {
        self.sessions.get(peer)
    }

    /// Peers with an open session, sorted.
    pub fn peers(&self) -> Vec<&str> {
        let mut peers: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        peers.sort_unstable();
        peers
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session exists.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
