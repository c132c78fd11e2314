use serde::{Deserialize, Serialize};

/// Task manager tuning.
///
/// Reputation thresholds are on the reputation system's `[-1, 1]` scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskManagerConfig {
    /// Bidding window opened for broadcast tasks that do not set their own.
    pub default_bidding_secs: u64,
    /// Publishes allowed per hour before any reputation bonus.
    pub max_tasks_per_hour: u32,
    /// Extra hourly publishes per unit of (non-negative) reputation.
    pub reputation_bonus: f64,
    pub min_rep_to_publish: f64,
    /// Requester deposit as a multiple of the reward, when not set explicitly.
    pub deposit_multiplier: f64,
    /// How long a participant has to respond before a timeout dispute is reasonable.
    pub response_timeout_secs: u64,
    /// Reject tasks the content filter rates as blocked.
    pub enable_content_filter: bool,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            default_bidding_secs: 600,
            max_tasks_per_hour: 2,
            reputation_bonus: 4.0,
            min_rep_to_publish: 0.3,
            deposit_multiplier: 1.2,
            response_timeout_secs: 86_400,
            enable_content_filter: false,
        }
    }
}
