//! Group snapshot, joined set, and group display logs.
//!
//! The snapshot is the provider's last reported picture and is replaced
//! wholesale, never merged. The joined set is tracked separately because join
//! confirmations arrive independently of snapshots.
//!
//! # Invariants
//!
//! - The joined set only names groups present in the snapshot
//! - Display logs exist only for groups present in the snapshot

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{chat_log::ChatLog, event::LogLine};

/// Group name to member identities.
pub type Snapshot = BTreeMap<String, BTreeSet<String>>;

/// Client side view of groups.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    snapshot: Snapshot,
    joined: BTreeSet<String>,
    logs: HashMap<String, ChatLog>,
}

impl GroupTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot and prune state for groups it no longer lists.
    ///
    /// Returns true if the snapshot or the joined set changed.
    pub fn replace(&mut self, snapshot: Snapshot) -> bool {
        let snapshot_changed = self.snapshot != snapshot;
        self.snapshot = snapshot;

        let joined_before = self.joined.len();
        let known = &self.snapshot;
        self.joined.retain(|group| known.contains_key(group));
        self.logs.retain(|group, _| known.contains_key(group));

        snapshot_changed || self.joined.len() != joined_before
    }

    /// Record that `actor` joined `group`.
    ///
    /// No-op for unknown groups. `is_local` also marks the group joined.
    /// Returns true if anything changed.
    pub fn add_member(&mut self, group: &str, actor: &str, is_local: bool) -> bool {
        let Some(members) = self.snapshot.get_mut(group) else {
            return false;
        };

        let mut changed = members.insert(actor.to_string());
        if is_local {
            changed |= self.joined.insert(group.to_string());
        }
        changed
    }

    /// Record that `actor` left `group`.
    ///
    /// Returns true if anything changed.
    pub fn remove_member(&mut self, group: &str, actor: &str, is_local: bool) -> bool {
        let mut changed =
            self.snapshot.get_mut(group).is_some_and(|members| members.remove(actor));
        if is_local {
            changed |= self.joined.remove(group);
        }
        changed
    }

    /// Append a line to a known group's log. Returns false for unknown
    /// groups and duplicate ids.
    pub fn append(&mut self, group: &str, line: LogLine) -> bool {
        if !self.snapshot.contains_key(group) {
            return false;
        }
        self.logs.entry(group.to_string()).or_default().append(line)
    }

    /// Whether `group` is in the snapshot.
    pub fn contains(&self, group: &str) -> bool {
        self.snapshot.contains_key(group)
    }

    /// Members of `group`.
    pub fn members(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.snapshot.get(group)
    }

    /// Whether the local identity joined `group`.
    pub fn is_joined(&self, group: &str) -> bool {
        self.joined.contains(group)
    }

    /// Groups the local identity joined.
    pub fn joined(&self) -> &BTreeSet<String> {
        &self.joined
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Display log for `group`; empty for known groups without lines.
    pub fn log(&self, group: &str) -> Option<&[LogLine]> {
        if !self.snapshot.contains_key(group) {
            return None;
        }
        Some(self.logs.get(group).map(ChatLog::lines).unwrap_or_default())
    }
}
