//! Deterministic, reputation-weighted verifier selection.
//!
//! Each candidate scores `selection_weight(power) * selection_factor(task, id)`
//! and the top `count` scores win. The factor is a hash of public inputs, so
//! anyone can recompute a selection. It is also predictable by anyone who
//! knows the membership in advance; a VRF seed would close that gap.

use agora_crypto::blake2b_256_multi;
use agora_types::NodeId;

/// Lower bound applied to voting power when weighting selection.
pub const MIN_SELECTION_WEIGHT: f64 = 0.5;
/// Upper bound applied to voting power when weighting selection.
pub const MAX_SELECTION_WEIGHT: f64 = 5.0;

pub fn selection_weight(voting_power: f64) -> f64 {
    if voting_power.is_nan() {
        return MIN_SELECTION_WEIGHT;
    }
    voting_power.clamp(MIN_SELECTION_WEIGHT, MAX_SELECTION_WEIGHT)
}

/// Pseudo-random factor in `[0, 1]` from `Hash(task_id || member_id)`.
pub fn selection_factor(task_id: &str, member: &NodeId) -> f64 {
    let hash = blake2b_256_multi(&[task_id.as_bytes(), member.as_bytes()]);
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(head) as f64 / u64::MAX as f64
}

/// Rank `(candidate, voting_power)` pairs for `task_id` and keep the top `count`.
///
/// Equal scores are ordered by node id so the result never depends on input order.
pub fn select_weighted(task_id: &str, candidates: &[(NodeId, f64)], count: usize) -> Vec<NodeId> {
    if candidates.is_empty() || count == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&NodeId, f64)> = candidates
        .iter()
        .map(|(id, power)| (id, selection_weight(*power) * selection_factor(task_id, id)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.truncate(count);
    scored.into_iter().map(|(id, _)| id.clone()).collect()
}
