//! Committee membership and voting power.

use std::collections::BTreeMap;

use agora_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::CommitteeError;
use crate::selection::select_weighted;

/// Voting power floor (reputation at or below zero).
pub const MIN_VOTING_POWER: f64 = 0.5;
/// Extra power gained across reputation `[0, 1]`.
pub const VOTING_POWER_SPAN: f64 = 1.5;

/// Map reputation to voting power: `0.5 + 1.5 * rep` over `[0, 1]`,
/// floored at 0.5 below zero and capped at 2.0.
pub fn voting_power_for(reputation: f64) -> f64 {
    if reputation.is_nan() || reputation <= 0.0 {
        return MIN_VOTING_POWER;
    }
    MIN_VOTING_POWER + reputation.min(1.0) * VOTING_POWER_SPAN
}

/// A juror candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub node_id: NodeId,
    /// Opaque public key material supplied by the membership source.
    pub public_key: String,
    pub reputation: f64,
    /// Derived from `reputation`; recomputed whenever it changes.
    pub voting_power: f64,
    pub active: bool,
    pub joined_at: Timestamp,
}

/// Registry of committee members.
#[derive(Clone, Debug, Default)]
pub struct Committee {
    members: BTreeMap<NodeId, CommitteeMember>,
    min_members: usize,
}

impl Committee {
    pub fn new(min_members: usize) -> Self {
        Self {
            members: BTreeMap::new(),
            min_members,
        }
    }

    pub fn add_member(
        &mut self,
        node_id: NodeId,
        public_key: impl Into<String>,
        reputation: f64,
        now: Timestamp,
    ) -> Result<&CommitteeMember, CommitteeError> {
        if self.members.contains_key(&node_id) {
            return Err(CommitteeError::AlreadyMember(node_id.to_string()));
        }
        tracing::info!(member = %node_id, reputation, "committee member added");
        let member = CommitteeMember {
            node_id: node_id.clone(),
            public_key: public_key.into(),
            reputation,
            voting_power: voting_power_for(reputation),
            active: true,
            joined_at: now,
        };
        Ok(self.members.entry(node_id).or_insert(member))
    }

    pub fn remove_member(&mut self, node_id: &NodeId) -> Result<CommitteeMember, CommitteeError> {
        self.members
            .remove(node_id)
            .ok_or_else(|| CommitteeError::MemberNotFound(node_id.to_string()))
    }

    pub fn update_member_reputation(
        &mut self,
        node_id: &NodeId,
        reputation: f64,
    ) -> Result<f64, CommitteeError> {
        let member = self.member_mut(node_id)?;
        member.reputation = reputation;
        member.voting_power = voting_power_for(reputation);
        Ok(member.voting_power)
    }

    pub fn set_member_active(&mut self, node_id: &NodeId, active: bool) -> Result<(), CommitteeError> {
        self.member_mut(node_id)?.active = active;
        Ok(())
    }

    pub fn get_member(&self, node_id: &NodeId) -> Option<&CommitteeMember> {
        self.members.get(node_id)
    }

    pub fn is_member(&self, node_id: &NodeId) -> bool {
        self.members.contains_key(node_id)
    }

    pub fn active_members(&self) -> Vec<&CommitteeMember> {
        self.members.values().filter(|m| m.active).collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn min_members(&self) -> usize {
        self.min_members
    }

    /// Voting power of a member; non-members count at the floor.
    pub fn power_of(&self, node_id: &NodeId) -> f64 {
        self.members
            .get(node_id)
            .map_or(MIN_VOTING_POWER, |m| m.voting_power)
    }

    /// Pick up to `count` active members for `task_id` by weighted sampling.
    ///
    /// Fails unless at least `min_members` members are active.
    pub fn select_verifiers(&self, task_id: &str, count: usize) -> Result<Vec<NodeId>, CommitteeError> {
        let candidates: Vec<(NodeId, f64)> = self
            .members
            .values()
            .filter(|m| m.active)
            .map(|m| (m.node_id.clone(), m.voting_power))
            .collect();
        if candidates.len() < self.min_members {
            return Err(CommitteeError::InsufficientMembers {
                active: candidates.len(),
                required: self.min_members,
            });
        }
        let selected = select_weighted(task_id, &candidates, count);
        tracing::debug!(task = task_id, selected = selected.len(), "verifiers selected");
        Ok(selected)
    }

    pub(crate) fn members(&self) -> impl Iterator<Item = &CommitteeMember> {
        self.members.values()
    }

    pub(crate) fn replace_members(&mut self, members: Vec<CommitteeMember>) {
        self.members = members.into_iter().map(|m| (m.node_id.clone(), m)).collect();
    }

    fn member_mut(&mut self, node_id: &NodeId) -> Result<&mut CommitteeMember, CommitteeError> {
        self.members
            .get_mut(node_id)
            .ok_or_else(|| CommitteeError::MemberNotFound(node_id.to_string()))
    }
}
