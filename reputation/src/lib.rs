//! Reputation system.
//!
//! One bounded score per node in `[-1.0, 1.0]`, moved only by scoring events
//! (task outcomes, verification accuracy, Sybil reports, daily decay). Every
//! change is mirrored by an immutable [`ReputationRecord`] carrying the score
//! before and after, so the full history is auditable and the table can be
//! rebuilt from a snapshot.

pub mod error;
pub mod params;
pub mod record;
pub mod system;

pub use error::ReputationError;
pub use record::{NodeReputation, ReputationEvent, ReputationRecord, ReputationSnapshot};
pub use system::{clamp_score, ReputationSystem};
