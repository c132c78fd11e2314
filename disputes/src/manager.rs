use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use agora_crypto::generate_id;
use agora_store::{load_json, save_json, SnapshotStore};
use agora_types::{Clock, NodeId};
use serde::{Deserialize, Serialize};

use crate::config::DisputeConfig;
use crate::dispute::{
    ArbitrationVote, Dispute, DisputeStatus, DisputeType, Evidence, EvidenceKind, Resolution,
    ResolutionType,
};
use crate::error::DisputeError;
use crate::rules::{default_rules, suggest, AutoResolveRule, AutoResolveSuggestion};

/// Snapshot key under which disputes are persisted.
pub const DISPUTES_KEY: &str = "disputes";

/// Committee arbitration charges the loser this share of the amount.
const ARBITRATION_PENALTY: f64 = 0.10;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisputeSnapshot {
    pub disputes: BTreeMap<String, Dispute>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisputeStatistics {
    pub total: usize,
    pub by_status: BTreeMap<DisputeStatus, usize>,
    pub by_type: BTreeMap<DisputeType, usize>,
    pub complainant_wins: usize,
    pub defendant_wins: usize,
}

pub struct DisputeManager {
    config: DisputeConfig,
    disputes: BTreeMap<String, Dispute>,
    by_task: BTreeMap<String, String>,
    by_node: BTreeMap<NodeId, BTreeSet<String>>,
    rules: Vec<AutoResolveRule>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    dirty: bool,
}

impl DisputeManager {
    /// Open the manager with the built-in rules, restoring saved disputes.
    pub fn open(
        config: DisputeConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, DisputeError> {
        let snapshot: DisputeSnapshot =
            load_json(store.as_ref(), DISPUTES_KEY)?.unwrap_or_default();
        let mut manager = Self {
            config,
            disputes: snapshot.disputes,
            by_task: BTreeMap::new(),
            by_node: BTreeMap::new(),
            rules: default_rules(),
            clock,
            store,
            dirty: false,
        };
        manager.rebuild_indices();
        tracing::info!(disputes = manager.disputes.len(), "dispute manager opened");
        Ok(manager)
    }

    pub fn config(&self) -> &DisputeConfig {
        &self.config
    }

    /// Append a rule; it is consulted after every rule already registered.
    pub fn register_rule(&mut self, rule: AutoResolveRule) {
        tracing::debug!(rule = %rule.description, "auto-resolve rule registered");
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    // ── Creation and evidence ───────────────────────────────────────────

    /// Open the single dispute allowed for `task_id`.
    pub fn create_dispute(
        &mut self,
        task_id: &str,
        complainant_id: &NodeId,
        defendant_id: &NodeId,
        dispute_type: DisputeType,
        description: &str,
        amount: f64,
    ) -> Result<Dispute, DisputeError> {
        if self.by_task.contains_key(task_id) {
            return Err(DisputeError::DuplicateDispute(task_id.to_string()));
        }
        if complainant_id == defendant_id {
            return Err(DisputeError::InvalidDispute(
                "complainant and defendant must differ".into(),
            ));
        }
        if amount.is_nan() || amount < 0.0 {
            return Err(DisputeError::InvalidDispute(format!(
                "amount must be non-negative, got {amount}"
            )));
        }

        let now = self.clock.now();
        let dispute = Dispute {
            id: generate_id("dispute"),
            task_id: task_id.to_string(),
            complainant_id: complainant_id.clone(),
            defendant_id: defendant_id.clone(),
            dispute_type,
            description: description.to_string(),
            amount,
            evidence: Vec::new(),
            status: DisputeStatus::Pending,
            resolution: None,
            resolution_type: None,
            arbitrators: Vec::new(),
            votes: Vec::new(),
            vote_deadline: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            expires_at: now.plus_secs(self.config.expiration_period_secs),
        };
        self.index(&dispute);
        self.disputes.insert(dispute.id.clone(), dispute.clone());
        tracing::info!(
            dispute = %dispute.id,
            task = task_id,
            complainant = %complainant_id,
            defendant = %defendant_id,
            kind = %dispute_type,
            "dispute created"
        );
        self.persist();
        Ok(dispute)
    }

    /// File evidence from one of the two parties. Returns the evidence id.
    pub fn submit_evidence(
        &mut self,
        dispute_id: &str,
        submitter_id: &NodeId,
        kind: EvidenceKind,
        content: &str,
        hash: &str,
    ) -> Result<String, DisputeError> {
        let now = self.clock.now();
        let dispute = self.dispute_mut(dispute_id)?;
        if dispute.status.is_terminal() {
            return Err(DisputeError::AlreadyResolved(dispute_id.to_string()));
        }
        if !dispute.is_participant(submitter_id) {
            return Err(DisputeError::NotParticipant {
                dispute: dispute_id.to_string(),
                node: submitter_id.to_string(),
            });
        }
        let evidence = Evidence {
            id: generate_id("evidence"),
            submitter_id: submitter_id.clone(),
            kind,
            content: content.to_string(),
            hash: hash.to_string(),
            submitted_at: now,
            verified: false,
            verified_by: None,
        };
        let id = evidence.id.clone();
        dispute.evidence.push(evidence);
        dispute.updated_at = now;
        tracing::debug!(dispute = dispute_id, evidence = %id, ?kind, "evidence submitted");
        self.persist();
        Ok(id)
    }

    /// Mark one evidence item as checked by `verifier_id`.
    pub fn verify_evidence(
        &mut self,
        dispute_id: &str,
        evidence_id: &str,
        verifier_id: &NodeId,
    ) -> Result<(), DisputeError> {
        let now = self.clock.now();
        let dispute = self.dispute_mut(dispute_id)?;
        if dispute.status.is_terminal() {
            return Err(DisputeError::AlreadyResolved(dispute_id.to_string()));
        }
        let evidence = dispute
            .evidence
            .iter_mut()
            .find(|e| e.id == evidence_id)
            .ok_or_else(|| DisputeError::EvidenceNotFound {
                dispute: dispute_id.to_string(),
                evidence: evidence_id.to_string(),
            })?;
        evidence.verified = true;
        evidence.verified_by = Some(verifier_id.clone());
        dispute.updated_at = now;
        tracing::debug!(dispute = dispute_id, evidence = evidence_id, by = %verifier_id, "evidence verified");
        self.persist();
        Ok(())
    }

    pub fn start_review(&mut self, dispute_id: &str) -> Result<(), DisputeError> {
        let now = self.clock.now();
        let min_evidence = self.config.min_evidence_count;
        let dispute = self.dispute_mut(dispute_id)?;
        require_status(dispute, DisputeStatus::Pending, "start review")?;
        if dispute.evidence.len() < min_evidence {
            return Err(DisputeError::InsufficientEvidence {
                required: min_evidence,
                actual: dispute.evidence.len(),
            });
        }
        dispute.status = DisputeStatus::InReview;
        dispute.updated_at = now;
        tracing::info!(dispute = dispute_id, "dispute under review");
        self.persist();
        Ok(())
    }

    // ── Rule-based suggestions ──────────────────────────────────────────

    /// Match the dispute against the rule table. Never changes the dispute.
    pub fn try_auto_resolve(&self, dispute_id: &str) -> Result<AutoResolveSuggestion, DisputeError> {
        if !self.config.auto_resolve_enabled {
            return Err(DisputeError::AutoResolveDisabled);
        }
        let dispute = self.get_dispute(dispute_id)?;
        require_status(dispute, DisputeStatus::InReview, "auto-resolve")?;
        suggest(&self.rules, dispute).ok_or_else(|| DisputeError::NoMatchingRule(dispute_id.to_string()))
    }

    /// Apply an approved suggestion and resolve the dispute.
    ///
    /// The suggestion is re-derived from the dispute's current state and must
    /// still name the same winner and still be auto-executable.
    pub fn apply_auto_resolution(
        &mut self,
        suggestion: &AutoResolveSuggestion,
        approver_id: &NodeId,
    ) -> Result<Resolution, DisputeError> {
        let dispute_id = suggestion.dispute_id.as_str();
        if !suggestion.can_auto_execute {
            return Err(DisputeError::NotAutoExecutable(dispute_id.to_string()));
        }
        let current = self.try_auto_resolve(dispute_id)?;
        if !current.can_auto_execute {
            return Err(DisputeError::NotAutoExecutable(dispute_id.to_string()));
        }
        if current.suggestion.winner != suggestion.suggestion.winner {
            return Err(DisputeError::StaleSuggestion(dispute_id.to_string()));
        }

        let mut resolution = current.suggestion;
        resolution.resolved_by = format!("system_approved_by_{approver_id}");
        let now = self.clock.now();
        let dispute = self.dispute_mut(dispute_id)?;
        dispute.resolution = Some(resolution.clone());
        dispute.resolution_type = Some(ResolutionType::Automatic);
        dispute.status = DisputeStatus::Resolved;
        dispute.resolved_at = Some(now);
        dispute.updated_at = now;
        tracing::info!(
            dispute = dispute_id,
            approver = %approver_id,
            winner = ?resolution.winner,
            "auto-resolution applied"
        );
        self.persist();
        Ok(resolution)
    }

    // ── Arbitration ─────────────────────────────────────────────────────

    /// Open the vote window for a pool of arbitrators. Parties to the
    /// dispute are dropped from the pool.
    pub fn start_arbitration(
        &mut self,
        dispute_id: &str,
        arbitrators: &[NodeId],
    ) -> Result<(), DisputeError> {
        let now = self.clock.now();
        let min_pool = self.config.min_votes_required;
        let window = self.config.arbitration_period_secs;
        let dispute = self.dispute_mut(dispute_id)?;
        require_status(dispute, DisputeStatus::InReview, "start arbitration")?;

        let mut pool: Vec<NodeId> = Vec::with_capacity(arbitrators.len());
        for arbitrator in arbitrators {
            if !dispute.is_participant(arbitrator) && !pool.contains(arbitrator) {
                pool.push(arbitrator.clone());
            }
        }
        if pool.len() < min_pool {
            return Err(DisputeError::InsufficientArbitrators {
                required: min_pool,
                actual: pool.len(),
            });
        }

        dispute.status = DisputeStatus::Arbitration;
        dispute.arbitrators = pool;
        dispute.votes.clear();
        dispute.vote_deadline = Some(now.plus_secs(window));
        dispute.updated_at = now;
        tracing::info!(
            dispute = dispute_id,
            arbitrators = dispute.arbitrators.len(),
            "arbitration started"
        );
        self.persist();
        Ok(())
    }

    pub fn submit_vote(
        &mut self,
        dispute_id: &str,
        arbitrator_id: &NodeId,
        vote_for: &NodeId,
        reason: &str,
        signature: &str,
    ) -> Result<(), DisputeError> {
        let now = self.clock.now();
        let dispute = self.dispute_mut(dispute_id)?;
        if dispute.status != DisputeStatus::Arbitration
            || dispute.vote_deadline.is_some_and(|deadline| now > deadline)
        {
            return Err(DisputeError::VotingClosed(dispute_id.to_string()));
        }
        if !dispute.arbitrators.contains(arbitrator_id) {
            return Err(DisputeError::NotArbitrator(arbitrator_id.to_string()));
        }
        if dispute.votes.iter().any(|v| &v.arbitrator_id == arbitrator_id) {
            return Err(DisputeError::AlreadyVoted(arbitrator_id.to_string()));
        }
        if !dispute.is_participant(vote_for) {
            return Err(DisputeError::InvalidVoteTarget(vote_for.to_string()));
        }
        dispute.votes.push(ArbitrationVote {
            arbitrator_id: arbitrator_id.clone(),
            vote_for: vote_for.clone(),
            reason: reason.to_string(),
            voted_at: now,
            signature: signature.to_string(),
        });
        dispute.updated_at = now;
        tracing::debug!(dispute = dispute_id, arbitrator = %arbitrator_id, "arbitration vote recorded");
        self.persist();
        Ok(())
    }

    /// Tally the votes by count and resolve for the party with strictly more.
    pub fn finalize_arbitration(&mut self, dispute_id: &str) -> Result<Resolution, DisputeError> {
        let now = self.clock.now();
        let min_votes = self.config.min_votes_required;
        let dispute = self.dispute_mut(dispute_id)?;
        require_status(dispute, DisputeStatus::Arbitration, "finalize arbitration")?;
        if dispute.votes.len() < min_votes {
            return Err(DisputeError::InsufficientVotes {
                required: min_votes,
                actual: dispute.votes.len(),
            });
        }

        let (for_complainant, for_defendant) = dispute.tally();
        let (winner, loser, winning_votes) = match for_complainant.cmp(&for_defendant) {
            std::cmp::Ordering::Greater => {
                (&dispute.complainant_id, &dispute.defendant_id, for_complainant)
            }
            std::cmp::Ordering::Less => {
                (&dispute.defendant_id, &dispute.complainant_id, for_defendant)
            }
            std::cmp::Ordering::Equal => {
                return Err(DisputeError::NoMajority(dispute_id.to_string()))
            }
        };
        let mut resolution = Resolution::award(
            winner,
            loser,
            dispute.amount,
            ARBITRATION_PENALTY,
            format!("committee arbitration: {winning_votes} of {} votes", dispute.votes.len()),
        );
        resolution.resolved_by = "committee".into();

        dispute.resolution = Some(resolution.clone());
        dispute.resolution_type = Some(ResolutionType::Committee);
        dispute.status = DisputeStatus::Resolved;
        dispute.resolved_at = Some(now);
        dispute.updated_at = now;
        tracing::info!(
            dispute = dispute_id,
            winner = ?resolution.winner,
            for_complainant,
            for_defendant,
            "arbitration finalized"
        );
        self.persist();
        Ok(resolution)
    }

    // ── Closing ─────────────────────────────────────────────────────────

    /// Close without a winner or penalty.
    pub fn dismiss_dispute(&mut self, dispute_id: &str, reason: &str) -> Result<(), DisputeError> {
        let now = self.clock.now();
        let dispute = self.dispute_mut(dispute_id)?;
        if matches!(
            dispute.status,
            DisputeStatus::Resolved | DisputeStatus::Dismissed
        ) {
            return Err(DisputeError::AlreadyResolved(dispute_id.to_string()));
        }
        dispute.status = DisputeStatus::Dismissed;
        dispute.resolution = Some(Resolution {
            winner: None,
            loser: None,
            amount_to_winner: 0.0,
            penalty: 0.0,
            reason: reason.to_string(),
            resolved_by: "system".into(),
        });
        dispute.resolved_at = Some(now);
        dispute.updated_at = now;
        tracing::info!(dispute = dispute_id, reason, "dispute dismissed");
        self.persist();
        Ok(())
    }

    /// Move every non-terminal dispute past its expiry to `Expired`.
    pub fn check_expired_disputes(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let expired: Vec<String> = self
            .disputes
            .values_mut()
            .filter(|d| !d.status.is_terminal() && now > d.expires_at)
            .map(|d| {
                d.status = DisputeStatus::Expired;
                d.updated_at = now;
                d.id.clone()
            })
            .collect();
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "disputes expired");
            self.persist();
        }
        expired
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn get_dispute(&self, dispute_id: &str) -> Result<&Dispute, DisputeError> {
        self.disputes
            .get(dispute_id)
            .ok_or_else(|| DisputeError::DisputeNotFound(dispute_id.to_string()))
    }

    pub fn dispute_by_task(&self, task_id: &str) -> Result<&Dispute, DisputeError> {
        self.by_task
            .get(task_id)
            .and_then(|id| self.disputes.get(id))
            .ok_or_else(|| DisputeError::DisputeNotFound(task_id.to_string()))
    }

    pub fn disputes_by_node(&self, node_id: &NodeId) -> Vec<&Dispute> {
        self.by_node
            .get(node_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.disputes.get(id))
            .collect()
    }

    pub fn disputes_by_status(&self, status: DisputeStatus) -> Vec<&Dispute> {
        self.disputes
            .values()
            .filter(|d| d.status == status)
            .collect()
    }

    pub fn statistics(&self) -> DisputeStatistics {
        let mut stats = DisputeStatistics {
            total: self.disputes.len(),
            ..DisputeStatistics::default()
        };
        for dispute in self.disputes.values() {
            *stats.by_status.entry(dispute.status).or_default() += 1;
            *stats.by_type.entry(dispute.dispute_type).or_default() += 1;
            if dispute.status != DisputeStatus::Resolved {
                continue;
            }
            match dispute.resolution.as_ref().and_then(|r| r.winner.as_ref()) {
                Some(w) if w == &dispute.complainant_id => stats.complainant_wins += 1,
                Some(_) => stats.defendant_wins += 1,
                None => {}
            }
        }
        stats
    }

    pub fn export_state(&self) -> DisputeSnapshot {
        DisputeSnapshot {
            disputes: self.disputes.clone(),
        }
    }

    // ── Persistence ─────────────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn flush(&mut self) -> Result<(), DisputeError> {
        let snapshot = DisputeSnapshot {
            disputes: self.disputes.clone(),
        };
        save_json(self.store.as_ref(), DISPUTES_KEY, &snapshot)?;
        self.dirty = false;
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(e) = self.flush() {
            self.dirty = true;
            tracing::warn!(error = %e, "failed to persist disputes; memory remains authoritative");
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn dispute_mut(&mut self, dispute_id: &str) -> Result<&mut Dispute, DisputeError> {
        self.disputes
            .get_mut(dispute_id)
            .ok_or_else(|| DisputeError::DisputeNotFound(dispute_id.to_string()))
    }

    fn index(&mut self, dispute: &Dispute) {
        self.by_task
            .insert(dispute.task_id.clone(), dispute.id.clone());
        for node in [&dispute.complainant_id, &dispute.defendant_id] {
            self.by_node
                .entry(node.clone())
                .or_default()
                .insert(dispute.id.clone());
        }
    }

    fn rebuild_indices(&mut self) {
        self.by_task.clear();
        self.by_node.clear();
        let disputes: Vec<Dispute> = self.disputes.values().cloned().collect();
        for dispute in &disputes {
            self.index(dispute);
        }
    }
}

fn require_status(
    dispute: &Dispute,
    expected: DisputeStatus,
    operation: &'static str,
) -> Result<(), DisputeError> {
    if dispute.status == expected {
        Ok(())
    } else {
        Err(DisputeError::InvalidStatus {
            dispute: dispute.id.clone(),
            status: dispute.status,
            operation,
        })
    }
}
