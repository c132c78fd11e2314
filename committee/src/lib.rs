//! Verification committee.
//!
//! Three layers:
//! 1. **Membership**: juror candidates with a voting power derived from reputation.
//! 2. **Selection**: deterministic, weighted sampling of verifiers per task.
//! 3. **Sessions**: one voting round per task proof, tallied by voting power
//!    against a quorum and frozen once decided.
//!
//! [`CommitteeManager`] ties them together for the node.

pub mod config;
pub mod error;
pub mod manager;
pub mod member;
pub mod selection;
pub mod session;

pub use config::CommitteeConfig;
pub use error::CommitteeError;
pub use manager::{CommitteeManager, CommitteeSnapshot};
pub use member::{voting_power_for, Committee, CommitteeMember};
pub use selection::{selection_factor, selection_weight};
pub use session::{
    ConsensusResult, TaskProof, VerificationSession, VerificationVote, VerifierOutcome,
};
