//! The marketplace node: owns every engine and runs the flows that cross
//! engine boundaries.
//!
//! Each engine sits behind its own `tokio::sync::RwLock`. A flow finishes
//! its critical section in one engine before locking the next, so no two
//! engine locks are ever held together. Every ledger entry is authored and
//! signed by the local node; the node an entry is about goes in the entry's
//! target.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use agora_committee::{CommitteeManager, CommitteeSnapshot, ConsensusResult, TaskProof, VerificationVote};
use agora_crypto::{blake2b_256_hex, PublicKeyRegistry, SignatureVerifier, Signer};
use agora_disputes::{AutoResolveSuggestion, Dispute, DisputeManager, DisputeType, Resolution};
use agora_ledger::{
    ChainVerification, CommitteeDecisionData, DisputeResolutionData, LedgerEntry, LedgerError,
    LedgerPayload, NodeRegistrationData, ProofSubmissionData, ReputationChangeData,
    SignedLedger, SybilReportData, TaskSubmissionData, TokenRewardData, VerificationVoteData,
};
use agora_reputation::{ReputationError, ReputationRecord, ReputationSnapshot, ReputationSystem};
use agora_store::{load_json, save_json, JsonFileStore, SnapshotStore};
use agora_tasks::{
    DeliveryProof, SettlementResult, Task, TaskAssignment, TaskBid, TaskClaim, TaskError,
    TaskManager, TaskStatus,
};
use agora_types::{Clock, NodeId, SystemClock};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::shutdown::ShutdownController;

pub const REPUTATION_KEY: &str = "reputation";
pub const COMMITTEE_KEY: &str = "committee";
pub const LEDGER_KEY: &str = "ledger";

/// Maximum time `stop` waits for the sweeps to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running Agora node.
pub struct MarketNode {
    pub config: NodeConfig,
    pub reputation: Arc<RwLock<ReputationSystem>>,
    pub committee: Arc<RwLock<CommitteeManager>>,
    pub tasks: Arc<RwLock<TaskManager>>,
    pub disputes: Arc<RwLock<DisputeManager>>,
    pub ledger: Arc<RwLock<SignedLedger>>,
    pub store: Arc<dyn SnapshotStore>,
    node_id: NodeId,
    shutdown: ShutdownController,
    task_handles: Vec<JoinHandle<()>>,
}

impl MarketNode {
    /// Open a node on the file store under `config.data_dir` with the
    /// system clock and Ed25519 signature checks.
    pub fn open(config: NodeConfig, signer: Arc<dyn Signer>) -> Result<Self, NodeError> {
        let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::open(&config.data_dir)?);
        Self::with_parts(
            config,
            Arc::new(SystemClock),
            store,
            signer,
            Arc::new(PublicKeyRegistry::new()),
        )
    }

    /// Build a node from explicit parts, restoring every snapshot found in
    /// `store`. A restored ledger whose chain does not verify is rejected.
    pub fn with_parts(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
        signer: Arc<dyn Signer>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Result<Self, NodeError> {
        let node_id = signer.node_id();
        if let Some(expected) = &config.node_id {
            if expected != node_id.as_str() {
                return Err(NodeError::Config(format!(
                    "configured node id {expected} does not match signer {node_id}"
                )));
            }
        }

        let mut reputation = ReputationSystem::new(Arc::clone(&clock));
        if let Some(snapshot) = load_json::<ReputationSnapshot>(store.as_ref(), REPUTATION_KEY)? {
            reputation.import_state(snapshot)?;
        }

        let mut committee = CommitteeManager::new(config.committee.clone(), Arc::clone(&clock));
        if let Some(snapshot) = load_json::<CommitteeSnapshot>(store.as_ref(), COMMITTEE_KEY)? {
            committee.import_state(snapshot);
        }

        let mut ledger = SignedLedger::new(Arc::clone(&clock))
            .with_signer(signer)
            .with_verifier(verifier);
        if let Some(entries) = load_json::<Vec<LedgerEntry>>(store.as_ref(), LEDGER_KEY)? {
            ledger.import_state(entries)?;
            if let ChainVerification::Broken { index, reason } = ledger.verify_chain() {
                return Err(LedgerError::InvalidSnapshot(format!("entry {index}: {reason}")).into());
            }
        }

        let tasks = TaskManager::open(config.tasks.clone(), Arc::clone(&clock), Arc::clone(&store))?;
        let disputes =
            DisputeManager::open(config.disputes.clone(), Arc::clone(&clock), Arc::clone(&store))?;

        tracing::info!(
            node = %node_id,
            nodes = reputation.node_count(),
            entries = ledger.len(),
            "node state restored"
        );

        Ok(Self {
            config,
            reputation: Arc::new(RwLock::new(reputation)),
            committee: Arc::new(RwLock::new(committee)),
            tasks: Arc::new(RwLock::new(tasks)),
            disputes: Arc::new(RwLock::new(disputes)),
            ledger: Arc::new(RwLock::new(ledger)),
            store,
            node_id,
            shutdown: ShutdownController::new(),
            task_handles: Vec::new(),
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    pub fn is_running(&self) -> bool {
        !self.task_handles.is_empty()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Spawn the background sweeps. Sweeps with a zero period are not started.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.is_running() {
            tracing::warn!("node already started");
            return Ok(());
        }
        tracing::info!(
            node = %self.node_id,
            data_dir = %self.config.data_dir.display(),
            "Agora node starting"
        );
        let sweeps = self.config.sweeps.clone();

        // ── Reputation decay ─────────────────────────────────────────────
        if sweeps.reputation_decay_secs > 0 {
            let reputation = Arc::clone(&self.reputation);
            let committee = Arc::clone(&self.committee);
            let mut shutdown_rx = self.shutdown.subscribe();
            let period = Duration::from_secs(sweeps.reputation_decay_secs);
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::info!("reputation decay sweep shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            let decayed = decay_and_resync(&reputation, &committee).await;
                            if decayed > 0 {
                                tracing::info!(decayed, "reputation decay applied");
                            }
                        }
                    }
                }
            });
            self.task_handles.push(handle);
        }

        // ── Task expiry ──────────────────────────────────────────────────
        if sweeps.task_expiry_secs > 0 {
            let tasks = Arc::clone(&self.tasks);
            let mut shutdown_rx = self.shutdown.subscribe();
            let period = Duration::from_secs(sweeps.task_expiry_secs);
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::info!("task expiry sweep shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            let expired = tasks.write().await.check_expired_tasks();
                            if !expired.is_empty() {
                                tracing::info!(count = expired.len(), "tasks expired");
                            }
                        }
                    }
                }
            });
            self.task_handles.push(handle);
        }

        // ── Dispute expiry ───────────────────────────────────────────────
        if sweeps.dispute_expiry_secs > 0 {
            let disputes = Arc::clone(&self.disputes);
            let mut shutdown_rx = self.shutdown.subscribe();
            let period = Duration::from_secs(sweeps.dispute_expiry_secs);
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::info!("dispute expiry sweep shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            let expired = disputes.write().await.check_expired_disputes();
                            if !expired.is_empty() {
                                tracing::info!(count = expired.len(), "disputes expired");
                            }
                        }
                    }
                }
            });
            self.task_handles.push(handle);
        }

        // ── Snapshots ────────────────────────────────────────────────────
        if sweeps.snapshot_secs > 0 {
            let targets = self.snapshot_targets();
            let mut shutdown_rx = self.shutdown.subscribe();
            let period = Duration::from_secs(sweeps.snapshot_secs);
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::info!("snapshot sweep shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            if let Err(e) = targets.write().await {
                                tracing::warn!(error = %e, "periodic snapshot failed");
                            }
                        }
                    }
                }
            });
            self.task_handles.push(handle);
        }

        tracing::info!(sweeps = self.task_handles.len(), "Agora node started");
        Ok(())
    }

    /// Signal the sweeps, wait for them, then write final snapshots.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("Agora node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), some sweeps may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        if let Err(e) = self.snapshot().await {
            tracing::error!(error = %e, "failed to write final snapshots");
            return Err(e);
        }
        tracing::info!("Agora node stopped");
        Ok(())
    }

    /// Write every engine's state to the store now.
    pub async fn snapshot(&self) -> Result<(), NodeError> {
        self.snapshot_targets().write().await
    }

    /// Run one reputation decay pass. Returns the number of nodes decayed.
    pub async fn run_decay_sweep(&self) -> usize {
        decay_and_resync(&self.reputation, &self.committee).await
    }

    /// Run one task and dispute expiry pass. Returns the expired ids.
    pub async fn run_expiry_sweep(&self) -> (Vec<String>, Vec<String>) {
        let tasks = self.tasks.write().await.check_expired_tasks();
        let disputes = self.disputes.write().await.check_expired_disputes();
        (tasks, disputes)
    }

    fn snapshot_targets(&self) -> SnapshotTargets {
        SnapshotTargets {
            store: Arc::clone(&self.store),
            reputation: Arc::clone(&self.reputation),
            committee: Arc::clone(&self.committee),
            tasks: Arc::clone(&self.tasks),
            disputes: Arc::clone(&self.disputes),
            ledger: Arc::clone(&self.ledger),
        }
    }

    // ── Membership ──────────────────────────────────────────────────────

    /// Register a node at the initial score and record it on the ledger.
    pub async fn register_node(
        &self,
        node_id: &NodeId,
        public_key: &str,
    ) -> Result<ReputationRecord, NodeError> {
        let record = self.reputation.write().await.register_node(node_id)?;
        self.record(LedgerPayload::NodeRegistration(NodeRegistrationData {
            node_id: node_id.clone(),
            public_key: public_key.to_string(),
            endpoint: String::new(),
        }))
        .await?;
        Ok(record)
    }

    /// Seat a registered, unbanned node on the verification committee with
    /// its current score. Returns its voting power.
    pub async fn join_committee(&self, node_id: &NodeId, public_key: &str) -> Result<f64, NodeError> {
        let score = self.active_score(node_id).await?;
        let mut committee = self.committee.write().await;
        committee.add_member(node_id.clone(), public_key, score)?;
        Ok(committee.committee().power_of(node_id))
    }

    /// Penalise a node for Sybil behaviour. A banned node leaves the
    /// active committee; otherwise its voting power follows the new score.
    pub async fn report_sybil(&self, node_id: &NodeId, reason: &str) -> Result<ReputationRecord, NodeError> {
        let (record, banned) = {
            let mut reputation = self.reputation.write().await;
            let record = reputation.on_sybil_detected(node_id, reason)?;
            (record, reputation.is_banned(node_id))
        };
        {
            let mut committee = self.committee.write().await;
            if committee.committee().is_member(node_id) {
                let members = committee.committee_mut();
                let result = if banned {
                    members.set_member_active(node_id, false)
                } else {
                    members.update_member_reputation(node_id, record.new_score).map(|_| ())
                };
                if let Err(e) = result {
                    tracing::warn!(node = %node_id, error = %e, "committee update after sybil report failed");
                }
            }
        }
        self.record(LedgerPayload::SybilReport(SybilReportData {
            node_id: node_id.clone(),
            reason: reason.to_string(),
            new_score: record.new_score,
            banned,
        }))
        .await?;
        Ok(record)
    }

    // ── Task lifecycle ──────────────────────────────────────────────────

    /// Publish a draft task with its requester's current score.
    pub async fn publish_task(&self, task: Task) -> Result<Task, NodeError> {
        let score = self.active_score(&task.requester_id).await?;
        let task = self.tasks.write().await.publish_task(task, score)?;
        self.record(LedgerPayload::TaskSubmission(TaskSubmissionData {
            task_id: task.id.clone(),
            task_type: task.task_type.as_str().to_string(),
            difficulty: task.difficulty,
            submitter_id: task.requester_id.clone(),
            worker_id: None,
        }))
        .await?;
        Ok(task)
    }

    /// Place a bid; the bid carries the bidder's score as known here.
    pub async fn submit_bid(&self, mut bid: TaskBid) -> Result<(), NodeError> {
        bid.reputation = self.active_score(&bid.bidder_id).await?;
        self.tasks.write().await.submit_bid(bid)?;
        Ok(())
    }

    pub async fn claim_task(&self, claim: TaskClaim) -> Result<(), NodeError> {
        let score = self.active_score(&claim.claimer_id).await?;
        let task_id = claim.task_id.clone();
        self.tasks.write().await.claim_task(claim, score)?;
        self.record_executor_binding(&task_id).await
    }

    pub async fn assign_task(&self, assignment: TaskAssignment, requester_id: &NodeId) -> Result<(), NodeError> {
        self.active_score(&assignment.assigned_to).await?;
        let task_id = assignment.task_id.clone();
        self.tasks.write().await.assign_task(assignment, requester_id)?;
        self.record_executor_binding(&task_id).await
    }

    pub async fn start_execution(&self, task_id: &str, executor_id: &NodeId) -> Result<(), NodeError> {
        self.tasks.write().await.start_execution(task_id, executor_id)?;
        Ok(())
    }

    pub async fn submit_delivery(
        &self,
        task_id: &str,
        executor_id: &NodeId,
        deliverable_hash: &str,
        signature: &str,
    ) -> Result<DeliveryProof, NodeError> {
        let proof = self
            .tasks
            .write()
            .await
            .submit_delivery(task_id, executor_id, deliverable_hash, signature)?;
        self.record(LedgerPayload::ProofSubmission(ProofSubmissionData {
            task_id: task_id.to_string(),
            worker_id: executor_id.clone(),
            proof_hash: blake2b_256_hex(
                format!("{task_id}:{deliverable_hash}:{signature}").as_bytes(),
            ),
            result_hash: deliverable_hash.to_string(),
        }))
        .await?;
        Ok(proof)
    }

    /// Open a committee verification session for a delivered task.
    /// Returns the selected verifiers.
    pub async fn request_verification(&self, task_id: &str) -> Result<Vec<NodeId>, NodeError> {
        let proof = {
            let tasks = self.tasks.read().await;
            let delivery = tasks.delivery_proof(task_id)?;
            TaskProof {
                task_id: task_id.to_string(),
                executor_id: delivery.executor_id.clone(),
                result_hash: delivery.deliverable_hash.clone(),
                signature: delivery.executor_sig.clone(),
                submitted_at: delivery.delivered_at,
            }
        };
        let mut committee = self.committee.write().await;
        let session = committee.initiate_verification(proof, None, None)?;
        Ok(session.verifiers.clone())
    }

    /// Record a verifier's vote. When it settles the session, the verdict
    /// is applied to the task, verifiers and executor are scored, and the
    /// committee decision is written to the ledger.
    pub async fn submit_verification_vote(
        &self,
        vote: VerificationVote,
    ) -> Result<Option<ConsensusResult>, NodeError> {
        let (outcome, weight) = {
            let mut committee = self.committee.write().await;
            let weight = committee.committee().power_of(&vote.verifier_id);
            (committee.submit_verification(vote.clone())?, weight)
        };
        self.record(LedgerPayload::VerificationVote(VerificationVoteData {
            task_id: vote.task_id.clone(),
            verifier_id: vote.verifier_id.clone(),
            approved: vote.valid,
            weight,
            comment: vote.reason.clone(),
        }))
        .await?;
        if let Some(result) = &outcome {
            self.apply_consensus(result).await?;
        }
        Ok(outcome)
    }

    /// Requester acknowledges delivery directly, moving the task to `Verified`.
    pub async fn confirm_delivery(
        &self,
        task_id: &str,
        requester_id: &NodeId,
        signature: &str,
    ) -> Result<DeliveryProof, NodeError> {
        let proof = self
            .tasks
            .write()
            .await
            .confirm_delivery(task_id, requester_id, signature)?;
        Ok(proof)
    }

    /// Settle a verified task, reward its executor on the ledger and close it.
    pub async fn settle_task(&self, task_id: &str) -> Result<SettlementResult, NodeError> {
        let settlement = {
            let mut tasks = self.tasks.write().await;
            let settlement = tasks.settle_task(task_id)?;
            tasks.complete_task(task_id)?;
            settlement
        };
        if let Some(executor) = &settlement.executor_id {
            self.record(LedgerPayload::TokenReward(TokenRewardData {
                node_id: executor.clone(),
                amount: settlement.reward_amount,
                task_id: Some(task_id.to_string()),
                reward_type: "task_reward".to_string(),
            }))
            .await?;
        }
        Ok(settlement)
    }

    // ── Disputes ────────────────────────────────────────────────────────

    /// Open a dispute over a task on behalf of one of its participants.
    /// The other participant is the defendant and the task reward is the
    /// amount at stake; the task moves to `Disputed`.
    pub async fn open_dispute(
        &self,
        task_id: &str,
        complainant_id: &NodeId,
        dispute_type: DisputeType,
        description: &str,
    ) -> Result<Dispute, NodeError> {
        let (defendant, amount) = {
            let tasks = self.tasks.read().await;
            let task = tasks.get_task(task_id)?;
            if !task.is_participant(complainant_id) {
                return Err(TaskError::NotParticipant {
                    task: task_id.to_string(),
                    node: complainant_id.to_string(),
                }
                .into());
            }
            if !task.status.can_transition(TaskStatus::Disputed) {
                return Err(TaskError::InvalidTransition {
                    from: task.status,
                    to: TaskStatus::Disputed,
                }
                .into());
            }
            let defendant = if &task.requester_id == complainant_id {
                task.executor_id
                    .clone()
                    .ok_or_else(|| NodeError::NoCounterparty(task_id.to_string()))?
            } else {
                task.requester_id.clone()
            };
            (defendant, task.reward)
        };
        let dispute = self.disputes.write().await.create_dispute(
            task_id,
            complainant_id,
            &defendant,
            dispute_type,
            description,
            amount,
        )?;
        let moved = self
            .tasks
            .write()
            .await
            .dispute_task(task_id, complainant_id, description);
        if let Err(e) = moved {
            // The task changed between the check and the move.
            if let Err(dismiss) = self
                .disputes
                .write()
                .await
                .dismiss_dispute(&dispute.id, "task could not be disputed")
            {
                tracing::warn!(dispute = %dispute.id, error = %dismiss, "orphaned dispute not dismissed");
            }
            return Err(e.into());
        }
        Ok(dispute)
    }

    pub async fn try_auto_resolve(&self, dispute_id: &str) -> Result<AutoResolveSuggestion, NodeError> {
        Ok(self.disputes.read().await.try_auto_resolve(dispute_id)?)
    }

    /// Execute an auto-resolution suggestion and carry out its outcome.
    pub async fn apply_auto_resolution(
        &self,
        suggestion: &AutoResolveSuggestion,
        approver_id: &NodeId,
    ) -> Result<Resolution, NodeError> {
        let (resolution, dispute) = {
            let mut disputes = self.disputes.write().await;
            let resolution = disputes.apply_auto_resolution(suggestion, approver_id)?;
            let dispute = disputes.get_dispute(&suggestion.dispute_id)?.clone();
            (resolution, dispute)
        };
        self.conclude_dispute(&dispute, &resolution).await?;
        Ok(resolution)
    }

    /// Move a dispute to arbitration with the active, unbanned committee
    /// members as the arbitrator pool. Returns the seated arbitrators.
    pub async fn start_arbitration(&self, dispute_id: &str) -> Result<Vec<NodeId>, NodeError> {
        let members: Vec<NodeId> = self
            .committee
            .read()
            .await
            .committee()
            .active_members()
            .into_iter()
            .map(|m| m.node_id.clone())
            .collect();
        let pool: Vec<NodeId> = {
            let reputation = self.reputation.read().await;
            members.into_iter().filter(|id| !reputation.is_banned(id)).collect()
        };
        let mut disputes = self.disputes.write().await;
        disputes.start_arbitration(dispute_id, &pool)?;
        Ok(disputes.get_dispute(dispute_id)?.arbitrators.clone())
    }

    pub async fn submit_arbitration_vote(
        &self,
        dispute_id: &str,
        arbitrator_id: &NodeId,
        vote_for: &NodeId,
        reason: &str,
        signature: &str,
    ) -> Result<(), NodeError> {
        self.disputes
            .write()
            .await
            .submit_vote(dispute_id, arbitrator_id, vote_for, reason, signature)?;
        Ok(())
    }

    /// Tally the arbitration vote and carry out the outcome.
    pub async fn finalize_arbitration(&self, dispute_id: &str) -> Result<Resolution, NodeError> {
        let (resolution, dispute) = {
            let mut disputes = self.disputes.write().await;
            let resolution = disputes.finalize_arbitration(dispute_id)?;
            let dispute = disputes.get_dispute(dispute_id)?.clone();
            (resolution, dispute)
        };
        self.conclude_dispute(&dispute, &resolution).await?;
        Ok(resolution)
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn record(&self, payload: LedgerPayload) -> Result<LedgerEntry, NodeError> {
        Ok(self.ledger.write().await.add_entry(&self.node_id, &payload)?)
    }

    /// Score of a registered node that is not banned.
    async fn active_score(&self, node_id: &NodeId) -> Result<f64, NodeError> {
        let reputation = self.reputation.read().await;
        if reputation.is_banned(node_id) {
            return Err(ReputationError::Banned(node_id.to_string()).into());
        }
        Ok(reputation.get_score(node_id)?)
    }

    async fn record_executor_binding(&self, task_id: &str) -> Result<(), NodeError> {
        let data = {
            let tasks = self.tasks.read().await;
            let task = tasks.get_task(task_id)?;
            TaskSubmissionData {
                task_id: task.id.clone(),
                task_type: task.task_type.as_str().to_string(),
                difficulty: task.difficulty,
                submitter_id: task.requester_id.clone(),
                worker_id: task.executor_id.clone(),
            }
        };
        self.record(LedgerPayload::TaskSubmission(data)).await?;
        Ok(())
    }

    async fn apply_consensus(&self, result: &ConsensusResult) -> Result<(), NodeError> {
        let task_id = result.task_id.as_str();
        let (votes, executor) = {
            let committee = self.committee.read().await;
            let session = committee.session(task_id)?;
            let votes: Vec<VerificationVoteData> = session
                .votes
                .values()
                .map(|v| VerificationVoteData {
                    task_id: v.task_id.clone(),
                    verifier_id: v.verifier_id.clone(),
                    approved: v.valid,
                    weight: committee.committee().power_of(&v.verifier_id),
                    comment: v.reason.clone(),
                })
                .collect();
            (votes, session.proof.executor_id.clone())
        };
        // The verdict is final; the task may already be past `Delivered`.
        let difficulty = {
            let mut tasks = self.tasks.write().await;
            if let Err(e) = tasks.apply_verification(task_id, result.valid) {
                tracing::warn!(task = task_id, valid = result.valid, error = %e, "committee verdict not applied to task");
            }
            tasks.get_task(task_id)?.difficulty
        };

        let mut records = Vec::new();
        {
            let mut reputation = self.reputation.write().await;
            for outcome in &result.verifiers {
                match reputation.on_verification_result(&outcome.verifier_id, task_id, outcome.voted_correctly) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(verifier = %outcome.verifier_id, error = %e, "verifier not scored"),
                }
            }
            let executor_update = if result.valid {
                reputation.on_task_completed(&executor, task_id, difficulty)
            } else {
                reputation.on_task_failed(&executor, task_id)
            };
            match executor_update {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(executor = %executor, error = %e, "executor not scored"),
            }
        }
        self.resync_voting_power(&records).await;

        for record in &records {
            self.record(LedgerPayload::ReputationChange(reputation_change(record))).await?;
        }
        self.record(LedgerPayload::CommitteeDecision(CommitteeDecisionData {
            task_id: task_id.to_string(),
            decision: if result.valid { "approved" } else { "rejected" }.to_string(),
            approval_rate: result.valid_ratio,
            total_weight: result.valid_power + result.invalid_power,
            votes,
        }))
        .await?;
        tracing::info!(task = task_id, valid = result.valid, scored = records.len(), "committee verdict applied");
        Ok(())
    }

    /// Bring committee voting power in line with freshly changed scores.
    async fn resync_voting_power(&self, records: &[ReputationRecord]) {
        let mut committee = self.committee.write().await;
        for record in records {
            if !committee.committee().is_member(&record.node_id) {
                continue;
            }
            if let Err(e) = committee
                .committee_mut()
                .update_member_reputation(&record.node_id, record.new_score)
            {
                tracing::warn!(node = %record.node_id, error = %e, "voting power not updated");
            }
        }
    }

    /// Record a dispute's resolution, then move its task and score the
    /// losing executor. Follow-up failures are logged, never undone.
    async fn conclude_dispute(&self, dispute: &Dispute, resolution: &Resolution) -> Result<(), NodeError> {
        self.record(LedgerPayload::DisputeResolution(DisputeResolutionData {
            dispute_id: dispute.id.clone(),
            task_id: dispute.task_id.clone(),
            winner: resolution.winner.clone(),
            loser: resolution.loser.clone(),
            amount_to_winner: resolution.amount_to_winner,
            penalty: resolution.penalty,
            resolved_by: resolution.resolved_by.clone(),
        }))
        .await?;
        tracing::info!(
            dispute = %dispute.id,
            task = %dispute.task_id,
            winner = ?resolution.winner,
            penalty = resolution.penalty,
            "dispute concluded"
        );
        if let Err(e) = self.apply_dispute_outcome(dispute, resolution).await {
            tracing::warn!(dispute = %dispute.id, error = %e, "dispute outcome not applied to task");
        }
        Ok(())
    }

    async fn apply_dispute_outcome(&self, dispute: &Dispute, resolution: &Resolution) -> Result<(), NodeError> {
        let Some(winner) = &resolution.winner else {
            return Ok(());
        };
        let task_id = dispute.task_id.as_str();
        let task = self.tasks.read().await.get_task(task_id)?.clone();

        if task.executor_id.as_ref() == Some(winner) {
            {
                let mut tasks = self.tasks.write().await;
                tasks.settle_task(task_id)?;
                tasks.complete_task(task_id)?;
            }
            self.record(LedgerPayload::TokenReward(TokenRewardData {
                node_id: winner.clone(),
                amount: resolution.amount_to_winner,
                task_id: Some(task_id.to_string()),
                reward_type: "dispute_award".to_string(),
            }))
            .await?;
        } else if &task.requester_id == winner {
            self.tasks.write().await.cancel_task(task_id, &task.requester_id)?;
            if let Some(executor) = &task.executor_id {
                let record = self.reputation.write().await.on_task_failed(executor, task_id)?;
                self.resync_voting_power(std::slice::from_ref(&record)).await;
                self.record(LedgerPayload::ReputationChange(reputation_change(&record))).await?;
            }
        }
        Ok(())
    }
}

fn reputation_change(record: &ReputationRecord) -> ReputationChangeData {
    ReputationChangeData {
        node_id: record.node_id.clone(),
        old_score: record.old_score,
        new_score: record.new_score,
        reason: record.event.as_str().to_string(),
    }
}

/// Decay every score and resync the committee's voting power with it.
async fn decay_and_resync(
    reputation: &RwLock<ReputationSystem>,
    committee: &RwLock<CommitteeManager>,
) -> usize {
    let members: Vec<NodeId> = committee
        .read()
        .await
        .committee()
        .active_members()
        .into_iter()
        .map(|m| m.node_id.clone())
        .collect();
    let (decayed, scores) = {
        let mut reputation = reputation.write().await;
        let decayed = reputation.apply_daily_decay();
        let scores: Vec<(NodeId, f64)> = members
            .into_iter()
            .filter_map(|id| reputation.get_score(&id).ok().map(|score| (id, score)))
            .collect();
        (decayed, scores)
    };
    if decayed == 0 {
        return 0;
    }
    let mut committee = committee.write().await;
    for (id, score) in scores {
        if let Err(e) = committee.committee_mut().update_member_reputation(&id, score) {
            tracing::warn!(node = %id, error = %e, "voting power not updated after decay");
        }
    }
    decayed
}

/// Handles needed to snapshot the node from a background task.
struct SnapshotTargets {
    store: Arc<dyn SnapshotStore>,
    reputation: Arc<RwLock<ReputationSystem>>,
    committee: Arc<RwLock<CommitteeManager>>,
    tasks: Arc<RwLock<TaskManager>>,
    disputes: Arc<RwLock<DisputeManager>>,
    ledger: Arc<RwLock<SignedLedger>>,
}

impl SnapshotTargets {
    async fn write(&self) -> Result<(), NodeError> {
        let store = self.store.as_ref();
        save_json(store, REPUTATION_KEY, &self.reputation.read().await.export_state())?;
        save_json(store, COMMITTEE_KEY, &self.committee.read().await.export_state())?;
        save_json(store, LEDGER_KEY, &self.ledger.read().await.export_state())?;
        {
            let mut tasks = self.tasks.write().await;
            if tasks.is_dirty() {
                tasks.flush()?;
            }
        }
        {
            let mut disputes = self.disputes.write().await;
            if disputes.is_dirty() {
                disputes.flush()?;
            }
        }
        tracing::debug!("snapshots written");
        Ok(())
    }
}
