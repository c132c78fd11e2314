use agora_store::StoreError;
use agora_types::ErrorKind;
use thiserror::Error;

use crate::task::TaskStatus;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("task {0} already exists")]
    DuplicateTask(String),

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("insufficient reputation: need {required:.2}, have {actual:.2}")]
    InsufficientReputation { required: f64, actual: f64 },

    #[error("publish quota exceeded for {node}: {quota} per hour")]
    QuotaExceeded { node: String, quota: u32 },

    #[error("bidding is closed for task {0}")]
    BiddingClosed(String),

    #[error("task {0} is in bidding mode and cannot be claimed directly")]
    BiddingMode(String),

    #[error("{bidder} has already bid on task {task}")]
    DuplicateBid { task: String, bidder: String },

    #[error("task {0} already has an executor")]
    AlreadyAssigned(String),

    #[error("task {task} is targeted at another executor, not {node}")]
    NotTargeted { task: String, node: String },

    #[error("{node} is not the executor of task {task}")]
    NotExecutor { task: String, node: String },

    #[error("{node} is not the requester of task {task}")]
    NotRequester { task: String, node: String },

    #[error("{node} is not a participant of task {task}")]
    NotParticipant { task: String, node: String },

    #[error("no delivery proof for task {0}")]
    ProofNotFound(String),

    #[error("task blocked by content filter: {0}")]
    ContentBlocked(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::TaskNotFound(_) | TaskError::ProofNotFound(_) => ErrorKind::NotFound,
            TaskError::DuplicateTask(_) | TaskError::DuplicateBid { .. } => ErrorKind::Duplicate,
            TaskError::NotTargeted { .. }
            | TaskError::NotExecutor { .. }
            | TaskError::NotRequester { .. }
            | TaskError::NotParticipant { .. } => ErrorKind::Unauthorized,
            TaskError::Storage(e) => e.kind(),
            _ => ErrorKind::Precondition,
        }
    }
}
