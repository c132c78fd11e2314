use serde::{Deserialize, Serialize};

/// Committee sizing and voting parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitteeConfig {
    /// Active members required before any selection may happen.
    pub min_members: usize,
    /// Fraction of selected verifiers that must vote before a result is declared.
    pub quorum: f64,
    /// Verifiers drawn per verification request.
    pub verifier_count: usize,
    /// Seconds a session accepts votes.
    pub verification_deadline_secs: u64,
}

impl Default for CommitteeConfig {
    fn default() -> Self {
        Self {
            min_members: 3,
            quorum: 0.6,
            verifier_count: 5,
            verification_deadline_secs: 300,
        }
    }
}
