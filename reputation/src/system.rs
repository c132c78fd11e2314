//! The reputation registry and its scoring rules.

use std::collections::HashMap;
use std::sync::Arc;

use agora_types::{Clock, NodeId, Timestamp};

use crate::error::ReputationError;
use crate::params::*;
use crate::record::{NodeReputation, ReputationEvent, ReputationRecord, ReputationSnapshot};

/// Clamp a score into `[MIN_SCORE, MAX_SCORE]`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_SCORE;
    }
    score.clamp(MIN_SCORE, MAX_SCORE)
}

/// Scored registry of every known node.
pub struct ReputationSystem {
    nodes: HashMap<NodeId, NodeReputation>,
    records: Vec<ReputationRecord>,
    clock: Arc<dyn Clock>,
}

impl ReputationSystem {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: HashMap::new(),
            records: Vec::new(),
            clock,
        }
    }

    /// Register a node at the initial score. Fails if the id is already known.
    pub fn register_node(&mut self, node_id: &NodeId) -> Result<ReputationRecord, ReputationError> {
        if self.nodes.contains_key(node_id) {
            return Err(ReputationError::AlreadyRegistered(node_id.to_string()));
        }
        let now = self.clock.now();
        self.nodes.insert(
            node_id.clone(),
            NodeReputation::new(node_id.clone(), INITIAL_SCORE, now),
        );
        tracing::info!(node = %node_id, "node registered");
        Ok(self.push_record(
            node_id,
            ReputationEvent::NodeJoined,
            INITIAL_SCORE,
            INITIAL_SCORE,
            None,
            now,
        ))
    }

    /// Reward a completed task, scaled by difficulty (5 pays the full bonus).
    pub fn on_task_completed(
        &mut self,
        node_id: &NodeId,
        task_id: &str,
        difficulty: u32,
    ) -> Result<ReputationRecord, ReputationError> {
        if self.node(node_id)?.banned {
            return Err(ReputationError::Banned(node_id.to_string()));
        }
        let bonus = TASK_COMPLETION_BONUS * f64::from(difficulty) / REFERENCE_DIFFICULTY;
        self.adjust(
            node_id,
            ReputationEvent::TaskCompleted,
            bonus,
            Some(task_id),
            |rep| rep.tasks_completed += 1,
        )
    }

    pub fn on_task_failed(
        &mut self,
        node_id: &NodeId,
        task_id: &str,
    ) -> Result<ReputationRecord, ReputationError> {
        self.adjust(
            node_id,
            ReputationEvent::TaskFailed,
            -TASK_FAILURE_PENALTY,
            Some(task_id),
            |rep| rep.tasks_failed += 1,
        )
    }

    pub fn on_task_expired(
        &mut self,
        node_id: &NodeId,
        task_id: &str,
    ) -> Result<ReputationRecord, ReputationError> {
        self.adjust(
            node_id,
            ReputationEvent::TaskExpired,
            -TASK_EXPIRY_PENALTY,
            Some(task_id),
            |rep| rep.tasks_expired += 1,
        )
    }

    /// Score a verifier against the final committee outcome.
    pub fn on_verification_result(
        &mut self,
        node_id: &NodeId,
        task_id: &str,
        correct: bool,
    ) -> Result<ReputationRecord, ReputationError> {
        let (event, delta) = if correct {
            (ReputationEvent::VerificationCorrect, VERIFICATION_BONUS)
        } else {
            (ReputationEvent::VerificationIncorrect, -VERIFICATION_PENALTY)
        };
        self.adjust(node_id, event, delta, Some(task_id), |rep| {
            rep.verifications_total += 1;
            if correct {
                rep.verifications_correct += 1;
            }
        })
    }

    /// Apply the Sybil penalty; bans the node if the score ends below the
    /// ban threshold.
    pub fn on_sybil_detected(
        &mut self,
        node_id: &NodeId,
        reason: &str,
    ) -> Result<ReputationRecord, ReputationError> {
        let record = self.adjust(
            node_id,
            ReputationEvent::SybilDetected,
            -SYBIL_PENALTY,
            None,
            |_| {},
        )?;
        if record.new_score < BAN_THRESHOLD {
            if let Some(rep) = self.nodes.get_mut(node_id) {
                rep.banned = true;
                rep.ban_reason = Some(reason.to_string());
            }
            tracing::warn!(node = %node_id, score = record.new_score, reason, "node banned");
        }
        Ok(record)
    }

    /// Pull every non-banned score above the baseline toward it.
    /// Returns the number of nodes that decayed.
    pub fn apply_daily_decay(&mut self) -> usize {
        let now = self.clock.now();
        let mut decayed: Vec<(NodeId, f64, f64)> = Vec::new();
        for rep in self.nodes.values_mut() {
            if rep.banned || rep.score <= INITIAL_SCORE {
                continue;
            }
            let old = rep.score;
            rep.score = clamp_score(INITIAL_SCORE + (old - INITIAL_SCORE) * DECAY_FACTOR);
            decayed.push((rep.node_id.clone(), old, rep.score));
        }
        decayed.sort_by(|a, b| a.0.cmp(&b.0));
        for (node_id, old, new) in &decayed {
            self.push_record(node_id, ReputationEvent::DailyDecay, *old, *new, None, now);
        }
        tracing::debug!(count = decayed.len(), "daily reputation decay applied");
        decayed.len()
    }

    /// Composite trust: 40% score, 30% task success, 20% verification
    /// accuracy, 10% activity recency. Banned nodes score 0.
    pub fn calculate_trust_score(&self, node_id: &NodeId) -> Result<f64, ReputationError> {
        let rep = self.node(node_id)?;
        if rep.banned {
            return Ok(0.0);
        }

        let finished = rep.tasks_completed + rep.tasks_failed;
        let success = if finished > 0 {
            rep.tasks_completed as f64 / finished as f64
        } else {
            NEUTRAL_RATE
        };
        let accuracy = if rep.verifications_total > 0 {
            rep.verifications_correct as f64 / rep.verifications_total as f64
        } else {
            NEUTRAL_RATE
        };
        let idle_days =
            rep.last_active.elapsed_since(self.clock.now()) as f64 / SECS_PER_DAY as f64;
        let activity = if idle_days > ACTIVITY_GRACE_DAYS {
            (1.0 - idle_days / ACTIVITY_DECAY_DAYS).max(ACTIVITY_FLOOR)
        } else {
            1.0
        };

        Ok(clamp_score(
            rep.score * TRUST_WEIGHT_SCORE
                + success * TRUST_WEIGHT_SUCCESS
                + accuracy * TRUST_WEIGHT_ACCURACY
                + activity * TRUST_WEIGHT_ACTIVITY,
        ))
    }

    /// The `count` highest-scoring non-banned nodes, best first.
    pub fn get_top_nodes(&self, count: usize) -> Vec<NodeReputation> {
        let mut nodes: Vec<&NodeReputation> = self.nodes.values().filter(|r| !r.banned).collect();
        nodes.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        nodes.into_iter().take(count).cloned().collect()
    }

    /// Non-banned nodes whose score is at least `min_score`, sorted by id.
    pub fn get_qualified_verifiers(&self, min_score: f64) -> Vec<NodeReputation> {
        let mut nodes: Vec<NodeReputation> = self
            .nodes
            .values()
            .filter(|r| !r.banned && r.score >= min_score)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn get_reputation(&self, node_id: &NodeId) -> Option<&NodeReputation> {
        self.nodes.get(node_id)
    }

    pub fn get_score(&self, node_id: &NodeId) -> Result<f64, ReputationError> {
        Ok(self.node(node_id)?.score)
    }

    pub fn is_banned(&self, node_id: &NodeId) -> bool {
        self.nodes.get(node_id).is_some_and(|r| r.banned)
    }

    pub fn is_registered(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_node_records(&self, node_id: &NodeId) -> Vec<ReputationRecord> {
        self.records
            .iter()
            .filter(|r| &r.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn get_all_records(&self) -> &[ReputationRecord] {
        &self.records
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    pub fn export_state(&self) -> ReputationSnapshot {
        let mut nodes: Vec<NodeReputation> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        ReputationSnapshot {
            nodes,
            records: self.records.clone(),
        }
    }

    /// Replace all state with `snapshot`. Scores outside the valid range are
    /// rejected rather than silently clamped.
    pub fn import_state(&mut self, snapshot: ReputationSnapshot) -> Result<(), ReputationError> {
        if let Some(bad) = snapshot
            .nodes
            .iter()
            .find(|r| !(MIN_SCORE..=MAX_SCORE).contains(&r.score))
        {
            return Err(ReputationError::InvalidSnapshot(format!(
                "score {} out of range for {}",
                bad.score, bad.node_id
            )));
        }
        self.nodes = snapshot
            .nodes
            .into_iter()
            .map(|r| (r.node_id.clone(), r))
            .collect();
        self.records = snapshot.records;
        tracing::info!(nodes = self.nodes.len(), records = self.records.len(), "reputation state imported");
        Ok(())
    }

    pub fn export_json(&self) -> Result<Vec<u8>, ReputationError> {
        serde_json::to_vec(&self.export_state())
            .map_err(|e| ReputationError::InvalidSnapshot(e.to_string()))
    }

    pub fn import_json(&mut self, bytes: &[u8]) -> Result<(), ReputationError> {
        let snapshot: ReputationSnapshot = serde_json::from_slice(bytes)
            .map_err(|e| ReputationError::InvalidSnapshot(e.to_string()))?;
        self.import_state(snapshot)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn node(&self, node_id: &NodeId) -> Result<&NodeReputation, ReputationError> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| ReputationError::NodeNotFound(node_id.to_string()))
    }

    fn adjust(
        &mut self,
        node_id: &NodeId,
        event: ReputationEvent,
        delta: f64,
        task_id: Option<&str>,
        update: impl FnOnce(&mut NodeReputation),
    ) -> Result<ReputationRecord, ReputationError> {
        let now = self.clock.now();
        let rep = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ReputationError::NodeNotFound(node_id.to_string()))?;
        let old = rep.score;
        rep.score = clamp_score(old + delta);
        rep.last_active = now;
        update(rep);
        let new = rep.score;
        tracing::debug!(node = %node_id, ?event, old, new, "reputation updated");
        Ok(self.push_record(node_id, event, old, new, task_id, now))
    }

    fn push_record(
        &mut self,
        node_id: &NodeId,
        event: ReputationEvent,
        old_score: f64,
        new_score: f64,
        task_id: Option<&str>,
        timestamp: Timestamp,
    ) -> ReputationRecord {
        let record = ReputationRecord {
            node_id: node_id.clone(),
            event,
            delta: new_score - old_score,
            old_score,
            new_score,
            task_id: task_id.map(str::to_string),
            timestamp,
        };
        self.records.push(record.clone());
        record
    }
}
