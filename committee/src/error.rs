use agora_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitteeError {
    #[error("node {0} is not a committee member")]
    MemberNotFound(String),

    #[error("node {0} is already a committee member")]
    AlreadyMember(String),

    #[error("not enough active members: have {active}, need {required}")]
    InsufficientMembers { active: usize, required: usize },

    #[error("no verification session for task {0}")]
    SessionNotFound(String),

    #[error("task {0} already has an open verification session")]
    SessionExists(String),

    #[error("verification session for task {0} is already finalized")]
    SessionFinalized(String),

    #[error("verifier {0} was not selected for this verification")]
    NotSelected(String),

    #[error("verifier {0} has already voted")]
    AlreadyVoted(String),

    #[error("voting for task {0} closed at its deadline")]
    VotingClosed(String),

    #[error("vote is for task {vote_task}, session is for {session_task}")]
    TaskMismatch {
        vote_task: String,
        session_task: String,
    },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl CommitteeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommitteeError::MemberNotFound(_) | CommitteeError::SessionNotFound(_) => {
                ErrorKind::NotFound
            }
            CommitteeError::AlreadyMember(_)
            | CommitteeError::SessionExists(_)
            | CommitteeError::AlreadyVoted(_) => ErrorKind::Duplicate,
            CommitteeError::NotSelected(_) => ErrorKind::Unauthorized,
            CommitteeError::InvalidSnapshot(_) => ErrorKind::Storage,
            CommitteeError::InsufficientMembers { .. }
            | CommitteeError::SessionFinalized(_)
            | CommitteeError::VotingClosed(_)
            | CommitteeError::TaskMismatch { .. } => ErrorKind::Precondition,
        }
    }
}
