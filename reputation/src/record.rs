//! Reputation state and audit records.

use agora_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

/// A node's current standing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeReputation {
    pub node_id: NodeId,
    /// Always within `[-1.0, 1.0]`.
    pub score: f64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_expired: u64,
    pub verifications_correct: u64,
    pub verifications_total: u64,
    pub registered_at: Timestamp,
    pub last_active: Timestamp,
    pub banned: bool,
    pub ban_reason: Option<String>,
}

impl NodeReputation {
    pub fn new(node_id: NodeId, score: f64, now: Timestamp) -> Self {
        Self {
            node_id,
            score,
            tasks_completed: 0,
            tasks_failed: 0,
            tasks_expired: 0,
            verifications_correct: 0,
            verifications_total: 0,
            registered_at: now,
            last_active: now,
            banned: false,
            ban_reason: None,
        }
    }
}

/// What caused a score change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationEvent {
    NodeJoined,
    TaskCompleted,
    TaskFailed,
    TaskExpired,
    VerificationCorrect,
    VerificationIncorrect,
    SybilDetected,
    DailyDecay,
}

impl ReputationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            ReputationEvent::NodeJoined => "node_joined",
            ReputationEvent::TaskCompleted => "task_completed",
            ReputationEvent::TaskFailed => "task_failed",
            ReputationEvent::TaskExpired => "task_expired",
            ReputationEvent::VerificationCorrect => "verification_correct",
            ReputationEvent::VerificationIncorrect => "verification_incorrect",
            ReputationEvent::SybilDetected => "sybil_detected",
            ReputationEvent::DailyDecay => "daily_decay",
        }
    }
}

/// Immutable history entry. `new_score` always equals the node's score
/// immediately after the change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub node_id: NodeId,
    pub event: ReputationEvent,
    pub delta: f64,
    pub old_score: f64,
    pub new_score: f64,
    pub task_id: Option<String>,
    pub timestamp: Timestamp,
}

/// Full exportable state: node table plus the complete record log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationSnapshot {
    pub nodes: Vec<NodeReputation>,
    pub records: Vec<ReputationRecord>,
}
