//! Hourly, reputation-scaled publish quota.

use std::collections::HashMap;

use agora_types::{NodeId, Timestamp};

/// Length of one quota window.
pub const QUOTA_WINDOW_SECS: u64 = 3_600;

#[derive(Clone, Debug)]
struct Window {
    count: u32,
    resets_at: Timestamp,
}

/// Per-node publish counter, reset one hour after the window opened.
#[derive(Clone, Debug)]
pub struct PublishQuota {
    base: u32,
    reputation_bonus: f64,
    windows: HashMap<NodeId, Window>,
}

impl PublishQuota {
    pub fn new(base: u32, reputation_bonus: f64) -> Self {
        Self {
            base,
            reputation_bonus,
            windows: HashMap::new(),
        }
    }

    /// `base + floor(max(reputation, 0) * bonus)`.
    pub fn quota_for(&self, reputation: f64) -> u32 {
        let bonus = (reputation.max(0.0) * self.reputation_bonus).floor();
        self.base.saturating_add(bonus as u32)
    }

    /// Consume one publish if the node is under quota. Returns the quota
    /// that was exceeded on failure.
    pub fn try_consume(&mut self, node: &NodeId, reputation: f64, now: Timestamp) -> Result<(), u32> {
        let quota = self.quota_for(reputation);
        self.windows.retain(|_, w| now < w.resets_at);
        let window = self.windows.entry(node.clone()).or_insert(Window {
            count: 0,
            resets_at: now.plus_secs(QUOTA_WINDOW_SECS),
        });
        if window.count >= quota {
            return Err(quota);
        }
        window.count += 1;
        Ok(())
    }

    /// Publishes left in the node's current window.
    pub fn remaining(&self, node: &NodeId, reputation: f64, now: Timestamp) -> u32 {
        let quota = self.quota_for(reputation);
        match self.windows.get(node) {
            Some(w) if now < w.resets_at => quota.saturating_sub(w.count),
            _ => quota,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_scales_with_reputation() {
        let q = PublishQuota::new(2, 4.0);
        assert_eq!(q.quota_for(-0.8), 2);
        assert_eq!(q.quota_for(0.0), 2);
        assert_eq!(q.quota_for(0.3), 3);
        assert_eq!(q.quota_for(0.5), 4);
        assert_eq!(q.quota_for(1.0), 6);
    }

    #[test]
    fn window_resets_after_an_hour() {
        let mut q = PublishQuota::new(2, 0.0);
        let n = NodeId::new("n");
        let t0 = Timestamp::new(1_000);
        assert!(q.try_consume(&n, 1.0, t0).is_ok());
        assert!(q.try_consume(&n, 1.0, t0).is_ok());
        assert_eq!(q.try_consume(&n, 1.0, t0), Err(2));
        assert_eq!(q.remaining(&n, 1.0, t0), 0);
        let later = t0.plus_secs(QUOTA_WINDOW_SECS);
        assert_eq!(q.remaining(&n, 1.0, later), 2);
        assert!(q.try_consume(&n, 1.0, later).is_ok());
    }

    #[test]
    fn elapsed_windows_are_dropped() {
        let mut q = PublishQuota::new(1, 0.0);
        let t0 = Timestamp::new(0);
        for id in ["a", "b", "c"] {
            assert!(q.try_consume(&NodeId::new(id), 0.0, t0).is_ok());
        }
        assert_eq!(q.windows.len(), 3);
        let later = t0.plus_secs(QUOTA_WINDOW_SECS);
        assert!(q.try_consume(&NodeId::new("d"), 0.0, later).is_ok());
        assert_eq!(q.windows.len(), 1);
        assert!(q.windows.contains_key(&NodeId::new("d")));
    }

    #[test]
    fn nodes_are_independent() {
        let mut q = PublishQuota::new(1, 0.0);
        let t = Timestamp::new(0);
        assert!(q.try_consume(&NodeId::new("a"), 0.0, t).is_ok());
        assert!(q.try_consume(&NodeId::new("b"), 0.0, t).is_ok());
        assert!(q.try_consume(&NodeId::new("a"), 0.0, t).is_err());
    }
}
