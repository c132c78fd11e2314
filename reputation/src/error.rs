use agora_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("node {0} is not registered")]
    NodeNotFound(String),

    #[error("node {0} is already registered")]
    AlreadyRegistered(String),

    #[error("node {0} is banned")]
    Banned(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl ReputationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReputationError::NodeNotFound(_) => ErrorKind::NotFound,
            ReputationError::AlreadyRegistered(_) => ErrorKind::Duplicate,
            ReputationError::Banned(_) => ErrorKind::Precondition,
            ReputationError::InvalidSnapshot(_) => ErrorKind::Storage,
        }
    }
}
