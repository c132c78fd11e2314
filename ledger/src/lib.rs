//! Signed ledger.
//!
//! An append-only sequence of [`LedgerEntry`] values. Each entry's hash
//! covers its id, type, timestamp, author, serialized payload and the
//! previous entry's hash, so any edit breaks every later link. The author
//! signs the hash through the external [`agora_crypto::Signer`] contract.
//!
//! Witnesses and the `verified` flag are metadata: they are not hashed and
//! can be added without re-signing.

pub mod audit;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod payload;

pub use audit::{AuditLog, HistoryItem, SearchCriteria};
pub use entry::{ChainVerification, EntryType, LedgerEntry, GENESIS_HASH};
pub use error::LedgerError;
pub use ledger::{LedgerStats, SignedLedger};
pub use payload::{
    CommitteeDecisionData, DisputeResolutionData, LedgerPayload, NodeRegistrationData,
    ProofSubmissionData, RelatedIds, ReputationChangeData, SybilReportData, TaskSubmissionData,
    TokenRewardData, TokenTransferData, VerificationVoteData,
};
