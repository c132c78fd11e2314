//! Dispute manager.
//!
//! A dispute contests one task's outcome between a complainant and a
//! defendant. It moves `Pending → InReview` once enough evidence is in, and
//! from review is either resolved directly (an approved rule suggestion),
//! sent to committee arbitration, dismissed, or swept to `Expired`.
//!
//! Rule matching never resolves anything by itself: [`DisputeManager::try_auto_resolve`]
//! returns an [`AutoResolveSuggestion`] that a named approver must apply.

pub mod config;
pub mod dispute;
pub mod error;
pub mod manager;
pub mod rules;

pub use config::DisputeConfig;
pub use dispute::{
    ArbitrationVote, Dispute, DisputeStatus, DisputeType, Evidence, EvidenceKind, Resolution,
    ResolutionType,
};
pub use error::DisputeError;
pub use manager::{DisputeManager, DisputeSnapshot, DisputeStatistics, DISPUTES_KEY};
pub use rules::{default_rules, AutoResolveRule, AutoResolveSuggestion};
