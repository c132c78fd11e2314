use agora_store::StoreError;
use agora_types::ErrorKind;
use thiserror::Error;

use crate::dispute::DisputeStatus;

#[derive(Debug, Error)]
pub enum DisputeError {
    #[error("dispute {0} not found")]
    DisputeNotFound(String),

    #[error("task {0} already has a dispute")]
    DuplicateDispute(String),

    #[error("invalid dispute: {0}")]
    InvalidDispute(String),

    #[error("dispute {0} is already closed")]
    AlreadyResolved(String),

    #[error("node {node} is not a party to dispute {dispute}")]
    NotParticipant { dispute: String, node: String },

    #[error("evidence {evidence} not found in dispute {dispute}")]
    EvidenceNotFound { dispute: String, evidence: String },

    #[error("cannot {operation}: dispute {dispute} is {status}")]
    InvalidStatus {
        dispute: String,
        status: DisputeStatus,
        operation: &'static str,
    },

    #[error("insufficient evidence: need {required}, have {actual}")]
    InsufficientEvidence { required: usize, actual: usize },

    #[error("insufficient arbitrators: need {required}, have {actual}")]
    InsufficientArbitrators { required: usize, actual: usize },

    #[error("insufficient votes: need {required}, have {actual}")]
    InsufficientVotes { required: usize, actual: usize },

    #[error("voting on dispute {0} is closed")]
    VotingClosed(String),

    #[error("arbitrator {0} is not in the arbitration pool")]
    NotArbitrator(String),

    #[error("arbitrator {0} has already voted")]
    AlreadyVoted(String),

    #[error("vote must name the complainant or the defendant, got {0}")]
    InvalidVoteTarget(String),

    #[error("arbitration of dispute {0} is tied")]
    NoMajority(String),

    #[error("auto-resolution is disabled")]
    AutoResolveDisabled,

    #[error("no rule matches dispute {0}")]
    NoMatchingRule(String),

    #[error("suggestion for dispute {0} cannot be executed automatically")]
    NotAutoExecutable(String),

    #[error("suggestion for dispute {0} no longer matches the dispute")]
    StaleSuggestion(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DisputeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DisputeError::DisputeNotFound(_) | DisputeError::EvidenceNotFound { .. } => {
                ErrorKind::NotFound
            }
            DisputeError::DuplicateDispute(_) | DisputeError::AlreadyVoted(_) => {
                ErrorKind::Duplicate
            }
            DisputeError::NotParticipant { .. } | DisputeError::NotArbitrator(_) => {
                ErrorKind::Unauthorized
            }
            DisputeError::Storage(_) => ErrorKind::Storage,
            DisputeError::InvalidDispute(_)
            | DisputeError::AlreadyResolved(_)
            | DisputeError::InvalidStatus { .. }
            | DisputeError::InsufficientEvidence { .. }
            | DisputeError::InsufficientArbitrators { .. }
            | DisputeError::InsufficientVotes { .. }
            | DisputeError::VotingClosed(_)
            | DisputeError::InvalidVoteTarget(_)
            | DisputeError::NoMajority(_)
            | DisputeError::AutoResolveDisabled
            | DisputeError::NoMatchingRule(_)
            | DisputeError::NotAutoExecutable(_)
            | DisputeError::StaleSuggestion(_) => ErrorKind::Precondition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_separate_causes() {
        assert_eq!(
            DisputeError::DisputeNotFound("d".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            DisputeError::AlreadyVoted("a".into()).kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            DisputeError::NotArbitrator("a".into()).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            DisputeError::VotingClosed("d".into()).kind(),
            ErrorKind::Precondition
        );
    }
}
