//! The task manager: lifecycle operations, indices and persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use agora_crypto::generate_id;
use agora_store::{load_json, save_json, SnapshotStore};
use agora_types::{Clock, NodeId};
use serde::{Deserialize, Serialize};

use crate::config::TaskManagerConfig;
use crate::error::TaskError;
use crate::filter::TaskFilter;
use crate::quota::PublishQuota;
use crate::task::{
    AgentCapability, DeliveryProof, PublishMode, SettlementResult, Task, TaskAssignment,
    TaskBid, TaskClaim, TaskStatus, TaskType,
};

/// Snapshot key under which the task manager persists its state.
pub const TASKS_KEY: &str = "tasks";

/// Everything the task manager persists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub tasks: BTreeMap<String, Task>,
    pub capabilities: BTreeMap<NodeId, AgentCapability>,
    pub proofs: BTreeMap<String, DeliveryProof>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub by_type: BTreeMap<TaskType, usize>,
}

pub struct TaskManager {
    config: TaskManagerConfig,
    state: TaskSnapshot,
    by_requester: BTreeMap<NodeId, BTreeSet<String>>,
    by_executor: BTreeMap<NodeId, BTreeSet<String>>,
    quota: PublishQuota,
    filter: TaskFilter,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    dirty: bool,
}

impl TaskManager {
    /// Open the manager, restoring any state previously saved in `store`.
    pub fn open(
        config: TaskManagerConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, TaskError> {
        let state: TaskSnapshot = load_json(store.as_ref(), TASKS_KEY)?.unwrap_or_default();
        let mut manager = Self {
            quota: PublishQuota::new(config.max_tasks_per_hour, config.reputation_bonus),
            config,
            state,
            by_requester: BTreeMap::new(),
            by_executor: BTreeMap::new(),
            filter: TaskFilter::default(),
            clock,
            store,
            dirty: false,
        };
        manager.rebuild_indices();
        tracing::info!(
            tasks = manager.state.tasks.len(),
            capabilities = manager.state.capabilities.len(),
            "task manager opened"
        );
        Ok(manager)
    }

    pub fn config(&self) -> &TaskManagerConfig {
        &self.config
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
    }

    // ── Publishing ──────────────────────────────────────────────────────

    /// Publish a draft task on behalf of its requester.
    ///
    /// Checks, in order: the reputation gate, structure, the content filter
    /// (when enabled), then consumes one unit of the requester's hourly quota.
    pub fn publish_task(&mut self, mut task: Task, requester_rep: f64) -> Result<Task, TaskError> {
        let now = self.clock.now();
        if requester_rep < self.config.min_rep_to_publish {
            return Err(TaskError::InsufficientReputation {
                required: self.config.min_rep_to_publish,
                actual: requester_rep,
            });
        }
        task.validate(now).map_err(TaskError::InvalidTask)?;
        if task.status != TaskStatus::Draft {
            return Err(TaskError::InvalidTransition {
                from: task.status,
                to: TaskStatus::Published,
            });
        }
        if !task.id.is_empty() && self.state.tasks.contains_key(&task.id) {
            return Err(TaskError::DuplicateTask(task.id));
        }
        if self.config.enable_content_filter {
            self.filter.check(&task).map_err(TaskError::ContentBlocked)?;
        }
        self.quota
            .try_consume(&task.requester_id, requester_rep, now)
            .map_err(|quota| TaskError::QuotaExceeded {
                node: task.requester_id.to_string(),
                quota,
            })?;

        if task.id.is_empty() {
            task.id = generate_id("task");
        }
        task.created_at = now;
        task.status = TaskStatus::Published;
        task.executor_id = None;
        task.bids.clear();
        if task.bidding_period_secs == 0 && task.publish_mode == PublishMode::Broadcast {
            task.bidding_period_secs = self.config.default_bidding_secs;
        }
        task.bidding_ends_at =
            (task.bidding_period_secs > 0).then(|| now.plus_secs(task.bidding_period_secs));
        if task.requester_deposit == 0.0 {
            task.requester_deposit = task.reward * self.config.deposit_multiplier;
        }

        self.by_requester
            .entry(task.requester_id.clone())
            .or_default()
            .insert(task.id.clone());
        self.state.tasks.insert(task.id.clone(), task.clone());
        tracing::info!(task = %task.id, requester = %task.requester_id, reward = task.reward, "task published");
        self.persist();
        Ok(task)
    }

    // ── Executor selection ──────────────────────────────────────────────

    pub fn submit_bid(&mut self, mut bid: TaskBid) -> Result<(), TaskError> {
        let now = self.clock.now();
        let task = self.task_mut(&bid.task_id)?;
        if !task.is_bidding_open(now) {
            return Err(TaskError::BiddingClosed(bid.task_id));
        }
        if task.min_reputation > 0.0 && bid.reputation < task.min_reputation {
            return Err(TaskError::InsufficientReputation {
                required: task.min_reputation,
                actual: bid.reputation,
            });
        }
        if task.bids.iter().any(|b| b.bidder_id == bid.bidder_id) {
            return Err(TaskError::DuplicateBid {
                task: bid.task_id,
                bidder: bid.bidder_id.to_string(),
            });
        }
        bid.bid_time = now;
        tracing::debug!(task = %bid.task_id, bidder = %bid.bidder_id, amount = bid.amount, "bid accepted");
        task.bids.push(bid);
        self.persist();
        Ok(())
    }

    /// Self-select as executor of a non-bidding task.
    pub fn claim_task(&mut self, claim: TaskClaim, claimer_rep: f64) -> Result<(), TaskError> {
        let task = self.task_mut(&claim.task_id)?;
        if task.executor_id.is_some() {
            return Err(TaskError::AlreadyAssigned(claim.task_id));
        }
        ensure_transition(task, TaskStatus::Accepted)?;
        if task.bidding_period_secs > 0 {
            return Err(TaskError::BiddingMode(claim.task_id));
        }
        if let Some(target) = &task.target_executor_id {
            if task.publish_mode == PublishMode::Direct && target != &claim.claimer_id {
                return Err(TaskError::NotTargeted {
                    task: claim.task_id,
                    node: claim.claimer_id.to_string(),
                });
            }
        }
        if task.min_reputation > 0.0 && claimer_rep < task.min_reputation {
            return Err(TaskError::InsufficientReputation {
                required: task.min_reputation,
                actual: claimer_rep,
            });
        }
        task.executor_id = Some(claim.claimer_id.clone());
        task.status = TaskStatus::Accepted;
        tracing::info!(task = %claim.task_id, executor = %claim.claimer_id, "task claimed");
        self.by_executor
            .entry(claim.claimer_id)
            .or_default()
            .insert(claim.task_id);
        self.persist();
        Ok(())
    }

    /// The requester picks the executor (typically from the bids).
    pub fn assign_task(&mut self, assignment: TaskAssignment, requester_id: &NodeId) -> Result<(), TaskError> {
        let task = self.task_mut(&assignment.task_id)?;
        if &task.requester_id != requester_id {
            return Err(TaskError::NotRequester {
                task: assignment.task_id,
                node: requester_id.to_string(),
            });
        }
        if task.executor_id.is_some() {
            return Err(TaskError::AlreadyAssigned(assignment.task_id));
        }
        ensure_transition(task, TaskStatus::Accepted)?;
        task.executor_id = Some(assignment.assigned_to.clone());
        task.status = TaskStatus::Accepted;
        tracing::info!(task = %assignment.task_id, executor = %assignment.assigned_to, "task assigned");
        self.by_executor
            .entry(assignment.assigned_to)
            .or_default()
            .insert(assignment.task_id);
        self.persist();
        Ok(())
    }

    // ── Execution and delivery ──────────────────────────────────────────

    pub fn start_execution(&mut self, task_id: &str, executor_id: &NodeId) -> Result<(), TaskError> {
        let task = self.task_mut(task_id)?;
        ensure_executor(task, executor_id)?;
        ensure_transition(task, TaskStatus::InProgress)?;
        task.status = TaskStatus::InProgress;
        self.persist();
        Ok(())
    }

    pub fn submit_delivery(
        &mut self,
        task_id: &str,
        executor_id: &NodeId,
        deliverable_hash: &str,
        signature: &str,
    ) -> Result<DeliveryProof, TaskError> {
        let now = self.clock.now();
        let task = self.task_mut(task_id)?;
        ensure_executor(task, executor_id)?;
        ensure_transition(task, TaskStatus::Delivered)?;
        task.deliverable_hash = Some(deliverable_hash.to_string());
        task.executor_sig = signature.to_string();
        task.status = TaskStatus::Delivered;

        let proof = DeliveryProof {
            task_id: task_id.to_string(),
            deliverable_hash: deliverable_hash.to_string(),
            executor_id: executor_id.clone(),
            executor_sig: signature.to_string(),
            delivered_at: now,
            requester_sig: None,
            received_at: None,
            witness_sigs: Vec::new(),
        };
        self.state.proofs.insert(task_id.to_string(), proof.clone());
        tracing::info!(task = task_id, executor = %executor_id, "delivery submitted");
        self.persist();
        Ok(proof)
    }

    /// The requester acknowledges receipt; the task becomes `Verified`.
    pub fn confirm_delivery(
        &mut self,
        task_id: &str,
        requester_id: &NodeId,
        signature: &str,
    ) -> Result<DeliveryProof, TaskError> {
        let now = self.clock.now();
        let task = self
            .state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))?;
        if &task.requester_id != requester_id {
            return Err(TaskError::NotRequester {
                task: task_id.to_string(),
                node: requester_id.to_string(),
            });
        }
        ensure_transition(task, TaskStatus::Verified)?;
        let proof = self
            .state
            .proofs
            .get_mut(task_id)
            .ok_or_else(|| TaskError::ProofNotFound(task_id.to_string()))?;
        proof.requester_sig = Some(signature.to_string());
        proof.received_at = Some(now);
        task.status = TaskStatus::Verified;
        let proof = proof.clone();
        tracing::info!(task = task_id, "delivery confirmed");
        self.persist();
        Ok(proof)
    }

    /// Apply a committee verdict on a delivered (or disputed) task: a valid
    /// proof moves it to `Verified`, an invalid one to `Disputed`.
    pub fn apply_verification(&mut self, task_id: &str, valid: bool) -> Result<TaskStatus, TaskError> {
        let task = self.task_mut(task_id)?;
        let target = if valid {
            TaskStatus::Verified
        } else {
            TaskStatus::Disputed
        };
        if task.status == target {
            return Ok(target);
        }
        ensure_transition(task, target)?;
        task.status = target;
        tracing::info!(task = task_id, valid, "verification verdict applied");
        self.persist();
        Ok(target)
    }

    // ── Settlement ──────────────────────────────────────────────────────

    pub fn settle_task(&mut self, task_id: &str) -> Result<SettlementResult, TaskError> {
        let now = self.clock.now();
        let task = self.task_mut(task_id)?;
        ensure_transition(task, TaskStatus::Settled)?;
        task.status = TaskStatus::Settled;
        let result = SettlementResult {
            task_id: task_id.to_string(),
            requester_id: task.requester_id.clone(),
            executor_id: task.executor_id.clone(),
            reward_amount: task.reward,
            deposit_return: task.requester_deposit,
            settled_at: now,
        };
        tracing::info!(task = task_id, reward = result.reward_amount, "task settled");
        self.persist();
        Ok(result)
    }

    pub fn complete_task(&mut self, task_id: &str) -> Result<(), TaskError> {
        let task = self.task_mut(task_id)?;
        ensure_transition(task, TaskStatus::Completed)?;
        task.status = TaskStatus::Completed;
        self.persist();
        Ok(())
    }

    // ── Disputes and cancellation ───────────────────────────────────────

    pub fn dispute_task(&mut self, task_id: &str, disputer_id: &NodeId, reason: &str) -> Result<(), TaskError> {
        let task = self.task_mut(task_id)?;
        if !task.is_participant(disputer_id) {
            return Err(TaskError::NotParticipant {
                task: task_id.to_string(),
                node: disputer_id.to_string(),
            });
        }
        ensure_transition(task, TaskStatus::Disputed)?;
        task.status = TaskStatus::Disputed;
        tracing::warn!(task = task_id, by = %disputer_id, reason, "task disputed");
        self.persist();
        Ok(())
    }

    pub fn cancel_task(&mut self, task_id: &str, requester_id: &NodeId) -> Result<(), TaskError> {
        let task = self.task_mut(task_id)?;
        if &task.requester_id != requester_id {
            return Err(TaskError::NotRequester {
                task: task_id.to_string(),
                node: requester_id.to_string(),
            });
        }
        ensure_transition(task, TaskStatus::Cancelled)?;
        task.status = TaskStatus::Cancelled;
        tracing::info!(task = task_id, "task cancelled");
        self.persist();
        Ok(())
    }

    /// Move every published task past its expiry to `Expired`.
    /// Returns the ids that expired.
    pub fn check_expired_tasks(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let expired: Vec<String> = self
            .state
            .tasks
            .values_mut()
            .filter(|t| t.status == TaskStatus::Published && t.is_expired(now))
            .map(|t| {
                t.status = TaskStatus::Expired;
                t.id.clone()
            })
            .collect();
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "tasks expired");
            self.persist();
        }
        expired
    }

    // ── Capabilities ────────────────────────────────────────────────────

    /// Register (or replace) an agent's declared capabilities.
    pub fn register_capability(&mut self, mut capability: AgentCapability) {
        capability.updated_at = self.clock.now();
        capability.capabilities.sort();
        capability.capabilities.dedup();
        self.state
            .capabilities
            .insert(capability.agent_id.clone(), capability);
        self.persist();
    }

    /// Agents whose capabilities include every requested one, sorted by id.
    pub fn find_agents_by_capability(&self, required: &[String]) -> Vec<NodeId> {
        if required.is_empty() {
            return Vec::new();
        }
        self.state
            .capabilities
            .values()
            .filter(|c| required.iter().all(|r| c.capabilities.contains(r)))
            .map(|c| c.agent_id.clone())
            .collect()
    }

    pub fn capability(&self, agent_id: &NodeId) -> Option<&AgentCapability> {
        self.state.capabilities.get(agent_id)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn get_task(&self, task_id: &str) -> Result<&Task, TaskError> {
        self.state
            .tasks
            .get(task_id)
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))
    }

    pub fn tasks_by_requester(&self, requester_id: &NodeId) -> Vec<&Task> {
        self.lookup(self.by_requester.get(requester_id))
    }

    pub fn tasks_by_executor(&self, executor_id: &NodeId) -> Vec<&Task> {
        self.lookup(self.by_executor.get(executor_id))
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.state
            .tasks
            .values()
            .filter(|t| t.status == status)
            .collect()
    }

    pub fn open_tasks(&self) -> Vec<&Task> {
        self.tasks_by_status(TaskStatus::Published)
    }

    pub fn delivery_proof(&self, task_id: &str) -> Result<&DeliveryProof, TaskError> {
        self.state
            .proofs
            .get(task_id)
            .ok_or_else(|| TaskError::ProofNotFound(task_id.to_string()))
    }

    /// Publishes the node may still make in its current hourly window.
    pub fn remaining_quota(&self, node: &NodeId, reputation: f64) -> u32 {
        self.quota.remaining(node, reputation, self.clock.now())
    }

    pub fn statistics(&self) -> TaskStatistics {
        let mut stats = TaskStatistics {
            total: self.state.tasks.len(),
            ..TaskStatistics::default()
        };
        for task in self.state.tasks.values() {
            *stats.by_status.entry(task.status).or_default() += 1;
            *stats.by_type.entry(task.task_type).or_default() += 1;
        }
        stats
    }

    pub fn export_state(&self) -> TaskSnapshot {
        self.state.clone()
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Whether the last write to storage failed and memory is ahead of disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the full state now, surfacing any storage error.
    pub fn flush(&mut self) -> Result<(), TaskError> {
        save_json(self.store.as_ref(), TASKS_KEY, &self.state)?;
        self.dirty = false;
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(e) = self.flush() {
            self.dirty = true;
            tracing::warn!(error = %e, "failed to persist task state; memory remains authoritative");
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn task_mut(&mut self, task_id: &str) -> Result<&mut Task, TaskError> {
        self.state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))
    }

    fn lookup(&self, ids: Option<&BTreeSet<String>>) -> Vec<&Task> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.state.tasks.get(id))
            .collect()
    }

    fn rebuild_indices(&mut self) {
        self.by_requester.clear();
        self.by_executor.clear();
        for task in self.state.tasks.values() {
            self.by_requester
                .entry(task.requester_id.clone())
                .or_default()
                .insert(task.id.clone());
            if let Some(executor) = &task.executor_id {
                self.by_executor
                    .entry(executor.clone())
                    .or_default()
                    .insert(task.id.clone());
            }
        }
    }
}

fn ensure_transition(task: &Task, to: TaskStatus) -> Result<(), TaskError> {
    if task.status.can_transition(to) {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition {
            from: task.status,
            to,
        })
    }
}

fn ensure_executor(task: &Task, node: &NodeId) -> Result<(), TaskError> {
    if task.executor_id.as_ref() == Some(node) {
        Ok(())
    } else {
        Err(TaskError::NotExecutor {
            task: task.id.clone(),
            node: node.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_nullables::{NullClock, NullStore};
    use agora_types::Timestamp;

    const START: u64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<NullClock>,
        store: Arc<NullStore>,
        manager: TaskManager,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(NullClock::new(START));
        let store = Arc::new(NullStore::new());
        let manager =
            TaskManager::open(TaskManagerConfig::default(), clock.clone(), store.clone()).unwrap();
        Fixture {
            clock,
            store,
            manager,
        }
    }

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    /// A claimable (non-bidding) task.
    fn direct_claim_task(requester: &str) -> Task {
        let mut task = Task::new(requester, TaskType::Compute, "render frames", 10.0);
        task.publish_mode = PublishMode::CapabilityMatch;
        task
    }

    fn claimed(f: &mut Fixture, executor: &str) -> String {
        let task = f
            .manager
            .publish_task(direct_claim_task("alice"), 0.5)
            .unwrap();
        f.manager
            .claim_task(
                TaskClaim {
                    task_id: task.id.clone(),
                    claimer_id: node(executor),
                    signature: String::new(),
                },
                0.5,
            )
            .unwrap();
        task.id
    }

    #[test]
    fn publish_sets_deposit_and_bidding_window() {
        let mut f = fixture();
        let task = f
            .manager
            .publish_task(Task::new("alice", TaskType::Search, "find papers", 10.0), 0.5)
            .unwrap();
        assert!(task.id.starts_with("task_"));
        assert_eq!(task.status, TaskStatus::Published);
        assert!((task.requester_deposit - 12.0).abs() < 1e-9);
        assert_eq!(task.created_at, Timestamp::new(START));
        assert_eq!(task.bidding_ends_at, Some(Timestamp::new(START + 600)));
        assert!(f.store.contains(TASKS_KEY));
    }

    #[test]
    fn publish_rejects_low_reputation() {
        let mut f = fixture();
        let err = f
            .manager
            .publish_task(direct_claim_task("alice"), 0.2)
            .unwrap_err();
        assert!(matches!(err, TaskError::InsufficientReputation { .. }));
        assert_eq!(f.manager.statistics().total, 0);
    }

    #[test]
    fn publish_rejects_invalid_structure() {
        let mut f = fixture();
        let err = f
            .manager
            .publish_task(Task::new("alice", TaskType::Search, "  ", 1.0), 0.5)
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidTask(_)));

        let mut direct = Task::new("alice", TaskType::Search, "x", 1.0);
        direct.publish_mode = PublishMode::Direct;
        assert!(matches!(
            f.manager.publish_task(direct, 0.5),
            Err(TaskError::InvalidTask(_))
        ));
    }

    #[test]
    fn quota_exhausts_and_resets() {
        let mut f = fixture();
        // reputation 0.3 → quota 2 + floor(1.2) = 3
        for _ in 0..3 {
            f.manager
                .publish_task(direct_claim_task("alice"), 0.3)
                .unwrap();
        }
        let err = f
            .manager
            .publish_task(direct_claim_task("alice"), 0.3)
            .unwrap_err();
        assert!(matches!(err, TaskError::QuotaExceeded { quota: 3, .. }));

        f.clock.advance(3_600);
        assert!(f
            .manager
            .publish_task(direct_claim_task("alice"), 0.3)
            .is_ok());
    }

    #[test]
    fn content_filter_applies_when_enabled() {
        let clock = Arc::new(NullClock::new(START));
        let config = TaskManagerConfig {
            enable_content_filter: true,
            ..TaskManagerConfig::default()
        };
        let mut manager = TaskManager::open(config, clock, Arc::new(NullStore::new())).unwrap();
        let mut filter = TaskFilter::default();
        filter.add_keyword("malware");
        manager.set_filter(filter);

        let task = Task::new("alice", TaskType::Compute, "build MALWARE sample", 1.0);
        assert!(matches!(
            manager.publish_task(task, 0.5),
            Err(TaskError::ContentBlocked(_))
        ));
    }

    #[test]
    fn bids_respect_window_and_duplicates() {
        let mut f = fixture();
        let task = f
            .manager
            .publish_task(Task::new("alice", TaskType::Search, "find", 5.0), 0.5)
            .unwrap();
        let bid = TaskBid {
            task_id: task.id.clone(),
            bidder_id: node("bob"),
            amount: 4.0,
            estimated_secs: 60,
            capabilities: vec![],
            reputation: 0.5,
            message: String::new(),
            signature: String::new(),
            bid_time: Timestamp::EPOCH,
        };
        f.manager.submit_bid(bid.clone()).unwrap();
        assert!(matches!(
            f.manager.submit_bid(bid.clone()),
            Err(TaskError::DuplicateBid { .. })
        ));

        f.clock.advance(601);
        let late = TaskBid {
            bidder_id: node("carol"),
            ..bid
        };
        assert!(matches!(
            f.manager.submit_bid(late),
            Err(TaskError::BiddingClosed(_))
        ));
        let stored = f.manager.get_task(&task.id).unwrap();
        assert_eq!(stored.bids.len(), 1);
        assert_eq!(stored.bids[0].bid_time, Timestamp::new(START));
    }

    #[test]
    fn claim_rules() {
        let mut f = fixture();
        let bidding = f
            .manager
            .publish_task(Task::new("alice", TaskType::Search, "find", 5.0), 0.5)
            .unwrap();
        let claim = |task_id: &str, who: &str| TaskClaim {
            task_id: task_id.to_string(),
            claimer_id: node(who),
            signature: String::new(),
        };
        assert!(matches!(
            f.manager.claim_task(claim(&bidding.id, "bob"), 0.5),
            Err(TaskError::BiddingMode(_))
        ));

        let mut direct = Task::new("alice", TaskType::Search, "find", 5.0);
        direct.publish_mode = PublishMode::Direct;
        direct.target_executor_id = Some(node("bob"));
        let direct = f.manager.publish_task(direct, 0.5).unwrap();
        assert!(matches!(
            f.manager.claim_task(claim(&direct.id, "carol"), 0.5),
            Err(TaskError::NotTargeted { .. })
        ));
        f.manager.claim_task(claim(&direct.id, "bob"), 0.5).unwrap();
        assert!(matches!(
            f.manager.claim_task(claim(&direct.id, "bob"), 0.5),
            Err(TaskError::AlreadyAssigned(_))
        ));
        assert_eq!(f.manager.tasks_by_executor(&node("bob")).len(), 1);
    }

    #[test]
    fn assignment_requires_requester() {
        let mut f = fixture();
        let task = f
            .manager
            .publish_task(Task::new("alice", TaskType::Search, "find", 5.0), 0.5)
            .unwrap();
        let assignment = TaskAssignment {
            task_id: task.id.clone(),
            assigned_to: node("bob"),
            reason: "lowest bid".into(),
            signature: String::new(),
        };
        assert!(matches!(
            f.manager.assign_task(assignment.clone(), &node("mallory")),
            Err(TaskError::NotRequester { .. })
        ));
        f.manager.assign_task(assignment, &node("alice")).unwrap();
        let stored = f.manager.get_task(&task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Accepted);
        assert_eq!(stored.executor_id, Some(node("bob")));
    }

    #[test]
    fn full_lifecycle_to_completion() {
        let mut f = fixture();
        let id = claimed(&mut f, "bob");

        assert!(matches!(
            f.manager.start_execution(&id, &node("carol")),
            Err(TaskError::NotExecutor { .. })
        ));
        f.manager.start_execution(&id, &node("bob")).unwrap();
        f.clock.advance(30);
        let proof = f
            .manager
            .submit_delivery(&id, &node("bob"), "hash-1", "sig-bob")
            .unwrap();
        assert_eq!(proof.delivered_at, Timestamp::new(START + 30));
        assert!(!proof.is_confirmed());

        let confirmed = f
            .manager
            .confirm_delivery(&id, &node("alice"), "sig-alice")
            .unwrap();
        assert!(confirmed.is_confirmed());
        assert_eq!(confirmed.received_at, Some(Timestamp::new(START + 30)));

        let settlement = f.manager.settle_task(&id).unwrap();
        assert_eq!(settlement.executor_id, Some(node("bob")));
        assert!((settlement.reward_amount - 10.0).abs() < 1e-9);
        assert!((settlement.deposit_return - 12.0).abs() < 1e-9);

        f.manager.complete_task(&id).unwrap();
        assert_eq!(f.manager.get_task(&id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut f = fixture();
        let id = claimed(&mut f, "bob");
        assert!(matches!(
            f.manager.submit_delivery(&id, &node("bob"), "h", "s"),
            Err(TaskError::InvalidTransition {
                from: TaskStatus::Accepted,
                to: TaskStatus::Delivered
            })
        ));
        assert!(matches!(
            f.manager.settle_task(&id),
            Err(TaskError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn verification_verdicts() {
        let mut f = fixture();
        let id = claimed(&mut f, "bob");
        f.manager.start_execution(&id, &node("bob")).unwrap();
        f.manager
            .submit_delivery(&id, &node("bob"), "h", "s")
            .unwrap();

        assert_eq!(
            f.manager.apply_verification(&id, false).unwrap(),
            TaskStatus::Disputed
        );
        assert_eq!(
            f.manager.apply_verification(&id, true).unwrap(),
            TaskStatus::Verified
        );
        assert!(f.manager.settle_task(&id).is_ok());
    }

    #[test]
    fn dispute_and_cancel_guards() {
        let mut f = fixture();
        let id = claimed(&mut f, "bob");
        assert!(matches!(
            f.manager.dispute_task(&id, &node("mallory"), "spite"),
            Err(TaskError::NotParticipant { .. })
        ));
        f.manager
            .dispute_task(&id, &node("bob"), "requester unresponsive")
            .unwrap();
        assert!(matches!(
            f.manager.cancel_task(&id, &node("bob")),
            Err(TaskError::NotRequester { .. })
        ));
        f.manager.cancel_task(&id, &node("alice")).unwrap();
        assert!(f.manager.get_task(&id).unwrap().status.is_terminal());
    }

    #[test]
    fn expiry_sweep_only_touches_published() {
        let mut f = fixture();
        let mut open = direct_claim_task("alice");
        open.expires_at = Some(Timestamp::new(START + 100));
        let open = f.manager.publish_task(open, 0.5).unwrap();

        let mut taken = direct_claim_task("alice");
        taken.expires_at = Some(Timestamp::new(START + 100));
        let taken = f.manager.publish_task(taken, 0.5).unwrap();
        f.manager
            .claim_task(
                TaskClaim {
                    task_id: taken.id.clone(),
                    claimer_id: node("bob"),
                    signature: String::new(),
                },
                0.5,
            )
            .unwrap();

        assert!(f.manager.check_expired_tasks().is_empty());
        f.clock.advance(101);
        assert_eq!(f.manager.check_expired_tasks(), vec![open.id.clone()]);
        assert_eq!(f.manager.get_task(&open.id).unwrap().status, TaskStatus::Expired);
        assert_eq!(f.manager.get_task(&taken.id).unwrap().status, TaskStatus::Accepted);
    }

    #[test]
    fn expiry_sweep_falls_back_to_deadline() {
        let mut f = fixture();
        let mut task = direct_claim_task("alice");
        task.deadline = Some(Timestamp::new(START + 50));
        let task = f.manager.publish_task(task, 0.5).unwrap();
        assert!(task.expires_at.is_none());

        f.clock.advance(50);
        assert!(f.manager.check_expired_tasks().is_empty());
        f.clock.advance(1);
        assert_eq!(f.manager.check_expired_tasks(), vec![task.id.clone()]);
        assert_eq!(f.manager.get_task(&task.id).unwrap().status, TaskStatus::Expired);
    }

    #[test]
    fn capability_matching_requires_all() {
        let mut f = fixture();
        let cap = |id: &str, caps: &[&str]| AgentCapability {
            agent_id: node(id),
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            languages: vec![],
            max_concurrent: 1,
            updated_at: Timestamp::EPOCH,
        };
        f.manager.register_capability(cap("bob", &["gpu", "python"]));
        f.manager.register_capability(cap("carol", &["python"]));

        let want = |caps: &[&str]| caps.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        assert_eq!(
            f.manager.find_agents_by_capability(&want(&["python"])),
            vec![node("bob"), node("carol")]
        );
        assert_eq!(
            f.manager.find_agents_by_capability(&want(&["gpu", "python"])),
            vec![node("bob")]
        );
        assert!(f.manager.find_agents_by_capability(&[]).is_empty());
        assert_eq!(
            f.manager.capability(&node("bob")).unwrap().updated_at,
            Timestamp::new(START)
        );
    }

    #[test]
    fn state_survives_reopen() {
        let mut f = fixture();
        let id = claimed(&mut f, "bob");
        let reopened =
            TaskManager::open(TaskManagerConfig::default(), f.clock.clone(), f.store.clone())
                .unwrap();
        assert_eq!(reopened.get_task(&id).unwrap().status, TaskStatus::Accepted);
        assert_eq!(reopened.tasks_by_requester(&node("alice")).len(), 1);
        assert_eq!(reopened.tasks_by_executor(&node("bob")).len(), 1);
    }

    #[test]
    fn failed_write_marks_dirty_and_flush_recovers() {
        let mut f = fixture();
        f.store.set_fail_writes(true);
        let task = f
            .manager
            .publish_task(direct_claim_task("alice"), 0.5)
            .unwrap();
        assert!(f.manager.is_dirty());
        assert!(f.manager.get_task(&task.id).is_ok());
        assert!(f.manager.flush().is_err());

        f.store.set_fail_writes(false);
        f.manager.flush().unwrap();
        assert!(!f.manager.is_dirty());
    }

    #[test]
    fn statistics_count_by_status_and_type() {
        let mut f = fixture();
        claimed(&mut f, "bob");
        f.manager
            .publish_task(Task::new("alice", TaskType::Search, "s", 1.0), 0.5)
            .unwrap();
        let stats = f.manager.statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.get(&TaskStatus::Accepted), Some(&1));
        assert_eq!(stats.by_status.get(&TaskStatus::Published), Some(&1));
        assert_eq!(stats.by_type.get(&TaskType::Compute), Some(&1));
        assert_eq!(f.manager.open_tasks().len(), 1);
    }
}
