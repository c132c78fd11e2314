//! Verification sessions: one voting round per task proof.

use std::collections::BTreeMap;

use agora_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::CommitteeError;

/// Proof of delivered work submitted for verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskProof {
    pub task_id: String,
    pub executor_id: NodeId,
    /// Hash of the deliverable.
    pub result_hash: String,
    /// Executor's signature over the deliverable hash (opaque).
    pub signature: String,
    pub submitted_at: Timestamp,
}

/// A verifier's judgement of a proof.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationVote {
    pub task_id: String,
    pub verifier_id: NodeId,
    pub valid: bool,
    pub reason: String,
    /// Verifier's signature over the vote (opaque).
    pub signature: String,
    pub timestamp: Timestamp,
}

/// How one verifier's vote compared with the final result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifierOutcome {
    pub verifier_id: NodeId,
    pub voted_correctly: bool,
}

/// Frozen outcome of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub task_id: String,
    pub valid: bool,
    pub valid_power: f64,
    pub invalid_power: f64,
    pub valid_ratio: f64,
    pub votes_cast: usize,
    pub verifiers: Vec<VerifierOutcome>,
    pub decided_at: Timestamp,
}

/// Votes required for `total` verifiers at `quorum`: `ceil(total * quorum)`.
pub fn votes_required(total: usize, quorum: f64) -> usize {
    // Tolerance keeps e.g. 5 * 0.6 from rounding up to 4.
    ((total as f64 * quorum) - 1e-9).ceil().max(0.0) as usize
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationSession {
    pub task_id: String,
    pub proof: TaskProof,
    pub verifiers: Vec<NodeId>,
    pub votes: BTreeMap<NodeId, VerificationVote>,
    pub started_at: Timestamp,
    pub deadline: Timestamp,
    pub final_result: Option<ConsensusResult>,
}

impl VerificationSession {
    pub fn new(
        proof: TaskProof,
        verifiers: Vec<NodeId>,
        started_at: Timestamp,
        deadline: Timestamp,
    ) -> Self {
        Self {
            task_id: proof.task_id.clone(),
            proof,
            verifiers,
            votes: BTreeMap::new(),
            started_at,
            deadline,
            final_result: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.final_result.is_some()
    }

    /// Still accepting votes at `now`.
    pub fn is_open(&self, now: Timestamp) -> bool {
        !self.is_finalized() && now <= self.deadline
    }

    /// Record a vote. Only selected verifiers may vote, once each, before the
    /// deadline and while no result is frozen.
    pub fn add_vote(&mut self, vote: VerificationVote, now: Timestamp) -> Result<(), CommitteeError> {
        if self.is_finalized() {
            return Err(CommitteeError::SessionFinalized(self.task_id.clone()));
        }
        if vote.task_id != self.task_id {
            return Err(CommitteeError::TaskMismatch {
                vote_task: vote.task_id,
                session_task: self.task_id.clone(),
            });
        }
        if now > self.deadline {
            return Err(CommitteeError::VotingClosed(self.task_id.clone()));
        }
        if !self.verifiers.contains(&vote.verifier_id) {
            return Err(CommitteeError::NotSelected(vote.verifier_id.to_string()));
        }
        if self.votes.contains_key(&vote.verifier_id) {
            return Err(CommitteeError::AlreadyVoted(vote.verifier_id.to_string()));
        }
        self.votes.insert(vote.verifier_id.clone(), vote);
        Ok(())
    }

    /// Tally votes by voting power.
    ///
    /// Returns `None` while fewer than `ceil(verifiers * quorum)` votes are in
    /// or when the weighted split is exactly even. Otherwise the result is
    /// valid iff the valid side holds more than half the cast power, and it
    /// is frozen: later calls return the same result.
    pub fn check_consensus(
        &mut self,
        quorum: f64,
        power_of: impl Fn(&NodeId) -> f64,
        now: Timestamp,
    ) -> Option<ConsensusResult> {
        if let Some(result) = &self.final_result {
            return Some(result.clone());
        }
        if self.votes.is_empty() || self.votes.len() < votes_required(self.verifiers.len(), quorum) {
            return None;
        }

        let (mut valid_power, mut invalid_power) = (0.0, 0.0);
        for vote in self.votes.values() {
            if vote.valid {
                valid_power += power_of(&vote.verifier_id);
            } else {
                invalid_power += power_of(&vote.verifier_id);
            }
        }
        let total = valid_power + invalid_power;
        if total <= 0.0 {
            return None;
        }
        let valid_ratio = valid_power / total;
        let valid = if valid_ratio > 0.5 {
            true
        } else if valid_ratio < 0.5 {
            false
        } else {
            return None;
        };

        let result = ConsensusResult {
            task_id: self.task_id.clone(),
            valid,
            valid_power,
            invalid_power,
            valid_ratio,
            votes_cast: self.votes.len(),
            verifiers: self
                .votes
                .values()
                .map(|v| VerifierOutcome {
                    verifier_id: v.verifier_id.clone(),
                    voted_correctly: v.valid == valid,
                })
                .collect(),
            decided_at: now,
        };
        tracing::info!(task = %self.task_id, valid, valid_ratio, "verification consensus reached");
        self.final_result = Some(result.clone());
        Some(result)
    }
}
