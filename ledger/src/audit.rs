//! Read-only audit views over a [`SignedLedger`].

use agora_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::entry::{EntryType, LedgerEntry};
use crate::ledger::SignedLedger;

/// Condensed view of one entry in a node's or task's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub entry_type: EntryType,
    pub timestamp: Timestamp,
    pub node_id: NodeId,
    pub verified: bool,
    pub witnesses: usize,
}

impl From<&LedgerEntry> for HistoryItem {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.clone(),
            entry_type: entry.entry_type,
            timestamp: entry.timestamp,
            node_id: entry.node_id.clone(),
            verified: entry.verified,
            witnesses: entry.witnesses.len(),
        }
    }
}

/// Filters for [`AuditLog::search`]. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Matches the author or the target.
    pub node_id: Option<NodeId>,
    pub task_id: Option<String>,
    pub entry_type: Option<EntryType>,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl SearchCriteria {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(node) = &self.node_id {
            if &entry.node_id != node && entry.target_node_id.as_ref() != Some(node) {
                return false;
            }
        }
        if let Some(task) = &self.task_id {
            if entry.task_id.as_ref() != Some(task) {
                return false;
            }
        }
        if self.entry_type.is_some_and(|t| t != entry.entry_type) {
            return false;
        }
        if self.start.is_some_and(|start| entry.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| entry.timestamp > end) {
            return false;
        }
        true
    }
}

pub struct AuditLog<'a> {
    ledger: &'a SignedLedger,
}

impl<'a> AuditLog<'a> {
    pub fn new(ledger: &'a SignedLedger) -> Self {
        Self { ledger }
    }

    pub fn node_history(&self, node_id: &NodeId) -> Vec<HistoryItem> {
        self.ledger
            .node_entries(node_id)
            .into_iter()
            .map(HistoryItem::from)
            .collect()
    }

    pub fn task_history(&self, task_id: &str) -> Vec<HistoryItem> {
        self.ledger
            .task_entries(task_id)
            .into_iter()
            .map(HistoryItem::from)
            .collect()
    }

    pub fn search(&self, criteria: &SearchCriteria) -> Vec<&'a LedgerEntry> {
        self.ledger
            .entries()
            .iter()
            .filter(|e| criteria.matches(e))
            .collect()
    }
}
