use agora_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("reputation error: {0}")]
    Reputation(#[from] agora_reputation::ReputationError),

    #[error("committee error: {0}")]
    Committee(#[from] agora_committee::CommitteeError),

    #[error("task error: {0}")]
    Task(#[from] agora_tasks::TaskError),

    #[error("dispute error: {0}")]
    Dispute(#[from] agora_disputes::DisputeError),

    #[error("ledger error: {0}")]
    Ledger(#[from] agora_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] agora_store::StoreError),

    #[error("task {0} has no counterparty to dispute with")]
    NoCounterparty(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::Reputation(e) => e.kind(),
            NodeError::Committee(e) => e.kind(),
            NodeError::Task(e) => e.kind(),
            NodeError::Dispute(e) => e.kind(),
            NodeError::Ledger(e) => e.kind(),
            NodeError::Store(e) => e.kind(),
            NodeError::NoCounterparty(_) => ErrorKind::Precondition,
            NodeError::Config(_) | NodeError::Io(_) => ErrorKind::Storage,
        }
    }
}
