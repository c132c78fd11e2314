//! Scoring constants.

/// Score assigned on registration and the point daily decay pulls toward.
pub const INITIAL_SCORE: f64 = 0.5;
pub const MAX_SCORE: f64 = 1.0;
pub const MIN_SCORE: f64 = -1.0;

/// Fraction of the distance above the baseline kept after one day.
pub const DECAY_FACTOR: f64 = 0.95;

/// Bonus for a completed task of reference difficulty.
pub const TASK_COMPLETION_BONUS: f64 = 0.05;
/// Difficulty at which the completion bonus is paid in full.
pub const REFERENCE_DIFFICULTY: f64 = 5.0;
pub const TASK_FAILURE_PENALTY: f64 = 0.1;
pub const TASK_EXPIRY_PENALTY: f64 = TASK_FAILURE_PENALTY / 2.0;

pub const VERIFICATION_BONUS: f64 = 0.02;
pub const VERIFICATION_PENALTY: f64 = 0.05;

pub const SYBIL_PENALTY: f64 = 0.5;
/// A Sybil report that leaves the score strictly below this bans the node.
pub const BAN_THRESHOLD: f64 = -0.5;

// ── Trust score composition ────────────────────────────────────────────

pub const TRUST_WEIGHT_SCORE: f64 = 0.4;
pub const TRUST_WEIGHT_SUCCESS: f64 = 0.3;
pub const TRUST_WEIGHT_ACCURACY: f64 = 0.2;
pub const TRUST_WEIGHT_ACTIVITY: f64 = 0.1;

/// Success rate and accuracy assumed for nodes with no history.
pub const NEUTRAL_RATE: f64 = 0.5;
/// Inactivity tolerated before the activity signal starts to decay.
pub const ACTIVITY_GRACE_DAYS: f64 = 7.0;
/// Days of inactivity over which the activity signal falls linearly.
pub const ACTIVITY_DECAY_DAYS: f64 = 30.0;
pub const ACTIVITY_FLOOR: f64 = 0.5;

pub const SECS_PER_DAY: u64 = 86_400;
