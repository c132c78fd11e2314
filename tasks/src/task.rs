//! Task data model and the status transition table.

use std::fmt;

use agora_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Search,
    Transfer,
    Storage,
    Compute,
    Custom,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Search,
        TaskType::Transfer,
        TaskType::Storage,
        TaskType::Compute,
        TaskType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Search => "search",
            TaskType::Transfer => "transfer",
            TaskType::Storage => "storage",
            TaskType::Compute => "compute",
            TaskType::Custom => "custom",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    Published,
    Accepted,
    InProgress,
    Delivered,
    Verified,
    Settled,
    Completed,
    Disputed,
    Cancelled,
    Expired,
}

impl TaskStatus {
    /// Statuses reachable in one step from `self`.
    pub fn allowed_transitions(self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Draft => &[Published, Cancelled],
            Published => &[Accepted, Expired, Cancelled],
            Accepted => &[InProgress, Cancelled, Disputed],
            InProgress => &[Delivered, Cancelled, Disputed],
            Delivered => &[Verified, Disputed],
            Verified => &[Settled],
            Settled => &[Completed],
            Disputed => &[Verified, Cancelled, Settled],
            Completed | Cancelled | Expired => &[],
        }
    }

    pub fn can_transition(self, to: TaskStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        use TaskStatus::*;
        match self {
            Draft => "draft",
            Published => "published",
            Accepted => "accepted",
            InProgress => "in_progress",
            Delivered => "delivered",
            Verified => "verified",
            Settled => "settled",
            Completed => "completed",
            Disputed => "disputed",
            Cancelled => "cancelled",
            Expired => "expired",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Open to the whole market; opens a bidding window.
    #[default]
    Broadcast,
    /// Only `target_executor_id` may claim.
    Direct,
    /// Offered to agents whose registered capabilities cover `required_capabilities`.
    CapabilityMatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Blocked,
}

fn default_difficulty() -> u32 {
    5
}

/// A unit of delegated work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Generated on publish when empty.
    #[serde(default)]
    pub id: String,
    pub task_type: TaskType,
    pub title: String,
    #[serde(default)]
    pub description: String,

    pub requester_id: NodeId,
    #[serde(default)]
    pub executor_id: Option<NodeId>,

    pub reward: f64,
    /// Computed as `reward * deposit_multiplier` on publish when left at zero.
    #[serde(default)]
    pub requester_deposit: f64,
    #[serde(default)]
    pub executor_deposit: f64,

    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub deadline: Option<Timestamp>,
    /// Published tasks still unassigned past this point are swept to `Expired`.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,

    #[serde(default)]
    pub acceptance_criteria: String,
    #[serde(default)]
    pub deliverable_hash: Option<String>,

    #[serde(default)]
    pub publish_mode: PublishMode,
    /// Zero means no bidding: the task is claimed or assigned directly.
    #[serde(default)]
    pub bidding_period_secs: u64,
    #[serde(default)]
    pub bidding_ends_at: Option<Timestamp>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub min_reputation: f64,
    #[serde(default)]
    pub target_executor_id: Option<NodeId>,
    /// Scales the executor's reputation bonus on completion (5 is nominal).
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    pub status: TaskStatus,

    /// Requester's signature over the published task (opaque).
    #[serde(default)]
    pub requester_sig: String,
    /// Executor's signature over the deliverable (opaque).
    #[serde(default)]
    pub executor_sig: String,

    #[serde(default)]
    pub bids: Vec<TaskBid>,
}

impl Task {
    /// A draft broadcast task with everything else defaulted.
    pub fn new(
        requester_id: impl Into<NodeId>,
        task_type: TaskType,
        title: impl Into<String>,
        reward: f64,
    ) -> Self {
        Self {
            id: String::new(),
            task_type,
            title: title.into(),
            description: String::new(),
            requester_id: requester_id.into(),
            executor_id: None,
            reward,
            requester_deposit: 0.0,
            executor_deposit: 0.0,
            created_at: Timestamp::EPOCH,
            deadline: None,
            expires_at: None,
            acceptance_criteria: String::new(),
            deliverable_hash: None,
            publish_mode: PublishMode::Broadcast,
            bidding_period_secs: 0,
            bidding_ends_at: None,
            required_capabilities: Vec::new(),
            min_reputation: 0.0,
            target_executor_id: None,
            difficulty: default_difficulty(),
            status: TaskStatus::Draft,
            requester_sig: String::new(),
            executor_sig: String::new(),
            bids: Vec::new(),
        }
    }

    /// Structural validity; returns the first problem found.
    pub fn validate(&self, now: Timestamp) -> Result<(), String> {
        if self.requester_id.is_empty() {
            return Err("requester id is empty".into());
        }
        if self.title.trim().is_empty() {
            return Err("title is empty".into());
        }
        if self.reward.is_nan() || self.reward < 0.0 {
            return Err(format!("reward must be non-negative, got {}", self.reward));
        }
        if let Some(deadline) = self.deadline {
            if deadline < now {
                return Err(format!("deadline {deadline} is in the past"));
            }
        }
        if self.publish_mode == PublishMode::Direct && self.target_executor_id.is_none() {
            return Err("direct tasks need a target executor".into());
        }
        Ok(())
    }

    pub fn is_bidding_open(&self, now: Timestamp) -> bool {
        self.status == TaskStatus::Published
            && self.bidding_period_secs > 0
            && self.bidding_ends_at.is_some_and(|end| now < end)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        match (self.expires_at, self.deadline) {
            (Some(at), _) => now > at,
            (None, Some(deadline)) => now > deadline,
            (None, None) => false,
        }
    }

    pub fn is_participant(&self, node: &NodeId) -> bool {
        &self.requester_id == node || self.executor_id.as_ref() == Some(node)
    }

    /// Inherent risk of the task type.
    pub fn risk_level(&self) -> RiskLevel {
        match self.task_type {
            TaskType::Search => RiskLevel::Low,
            TaskType::Transfer | TaskType::Storage | TaskType::Custom => RiskLevel::Medium,
            TaskType::Compute => RiskLevel::High,
        }
    }
}

/// A bid submitted during a task's bidding window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskBid {
    pub task_id: String,
    pub bidder_id: NodeId,
    /// Payment the bidder will accept.
    pub amount: f64,
    pub estimated_secs: u64,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Bidder's reputation when the bid was placed.
    pub reputation: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub bid_time: Timestamp,
}

/// Self-selection of an executor on a non-bidding task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskClaim {
    pub task_id: String,
    pub claimer_id: NodeId,
    #[serde(default)]
    pub signature: String,
}

/// The requester's explicit choice of executor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: String,
    pub assigned_to: NodeId,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub signature: String,
}

/// Evidence of delivered work: the executor's claim plus the requester's
/// acknowledgement once confirmed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryProof {
    pub task_id: String,
    pub deliverable_hash: String,
    pub executor_id: NodeId,
    pub executor_sig: String,
    pub delivered_at: Timestamp,
    pub requester_sig: Option<String>,
    pub received_at: Option<Timestamp>,
    #[serde(default)]
    pub witness_sigs: Vec<String>,
}

impl DeliveryProof {
    pub fn is_confirmed(&self) -> bool {
        self.requester_sig.is_some()
    }
}

/// What an agent declares it can do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentCapability {
    pub agent_id: NodeId,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub max_concurrent: u32,
    #[serde(default)]
    pub updated_at: Timestamp,
}

/// Output of settlement, consumed by the external balance ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub task_id: String,
    pub requester_id: NodeId,
    pub executor_id: Option<NodeId>,
    pub reward_amount: f64,
    pub deposit_return: f64,
    pub settled_at: Timestamp,
}
