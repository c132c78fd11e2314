use serde::{Deserialize, Serialize};

const HOUR: u64 = 3_600;

/// Dispute timing and threshold parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisputeConfig {
    /// Whether `try_auto_resolve` consults the rule table at all.
    pub auto_resolve_enabled: bool,
    pub review_period_secs: u64,
    /// Length of the arbitration vote window.
    pub arbitration_period_secs: u64,
    /// Non-terminal disputes older than this are swept to `Expired`.
    pub expiration_period_secs: u64,
    pub min_evidence_count: usize,
    /// Both the minimum arbitrator pool and the minimum votes to finalize.
    pub min_votes_required: usize,
}

impl Default for DisputeConfig {
    fn default() -> Self {
        Self {
            auto_resolve_enabled: true,
            review_period_secs: 24 * HOUR,
            arbitration_period_secs: 72 * HOUR,
            expiration_period_secs: 7 * 24 * HOUR,
            min_evidence_count: 1,
            min_votes_required: 3,
        }
    }
}
