//! Committee manager: membership plus the verification sessions it runs.

use std::collections::HashMap;
use std::sync::Arc;

use agora_types::{Clock, NodeId};
use serde::{Deserialize, Serialize};

use crate::config::CommitteeConfig;
use crate::error::CommitteeError;
use crate::member::{Committee, CommitteeMember};
use crate::session::{ConsensusResult, TaskProof, VerificationSession, VerificationVote};

/// Exportable committee state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitteeSnapshot {
    pub members: Vec<CommitteeMember>,
    pub sessions: Vec<VerificationSession>,
}

pub struct CommitteeManager {
    committee: Committee,
    sessions: HashMap<String, VerificationSession>,
    config: CommitteeConfig,
    clock: Arc<dyn Clock>,
}

impl CommitteeManager {
    pub fn new(config: CommitteeConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            committee: Committee::new(config.min_members),
            sessions: HashMap::new(),
            config,
            clock,
        }
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn committee_mut(&mut self) -> &mut Committee {
        &mut self.committee
    }

    pub fn config(&self) -> &CommitteeConfig {
        &self.config
    }

    pub fn add_member(
        &mut self,
        node_id: NodeId,
        public_key: impl Into<String>,
        reputation: f64,
    ) -> Result<(), CommitteeError> {
        let now = self.clock.now();
        self.committee
            .add_member(node_id, public_key, reputation, now)
            .map(|_| ())
    }

    pub fn select_verifiers(&self, task_id: &str, count: usize) -> Result<Vec<NodeId>, CommitteeError> {
        self.committee.select_verifiers(task_id, count)
    }

    /// Select verifiers for `proof` and open a session for its task.
    ///
    /// `count` and `deadline_secs` default to the configured values. A task
    /// may be re-verified only once its previous session is finalized or past
    /// its deadline.
    pub fn initiate_verification(
        &mut self,
        proof: TaskProof,
        count: Option<usize>,
        deadline_secs: Option<u64>,
    ) -> Result<&VerificationSession, CommitteeError> {
        let now = self.clock.now();
        if let Some(existing) = self.sessions.get(&proof.task_id) {
            if existing.is_open(now) {
                return Err(CommitteeError::SessionExists(proof.task_id.clone()));
            }
        }
        let verifiers = self
            .committee
            .select_verifiers(&proof.task_id, count.unwrap_or(self.config.verifier_count))?;
        let deadline =
            now.plus_secs(deadline_secs.unwrap_or(self.config.verification_deadline_secs));
        let task_id = proof.task_id.clone();
        tracing::info!(task = %task_id, verifiers = verifiers.len(), %deadline, "verification initiated");
        let session = VerificationSession::new(proof, verifiers, now, deadline);
        self.sessions.insert(task_id.clone(), session);
        self.sessions
            .get(&task_id)
            .ok_or(CommitteeError::SessionNotFound(task_id))
    }

    /// Record a vote and re-check consensus at the configured quorum.
    /// Returns the result once one is reached.
    pub fn submit_verification(
        &mut self,
        vote: VerificationVote,
    ) -> Result<Option<ConsensusResult>, CommitteeError> {
        let now = self.clock.now();
        let quorum = self.config.quorum;
        let committee = &self.committee;
        let session = self
            .sessions
            .get_mut(&vote.task_id)
            .ok_or_else(|| CommitteeError::SessionNotFound(vote.task_id.clone()))?;
        session.add_vote(vote, now)?;
        Ok(session.check_consensus(quorum, |id| committee.power_of(id), now))
    }

    /// Frozen result for a task, if consensus has been reached.
    pub fn verification_result(&self, task_id: &str) -> Result<Option<ConsensusResult>, CommitteeError> {
        self.session(task_id).map(|s| s.final_result.clone())
    }

    pub fn session(&self, task_id: &str) -> Result<&VerificationSession, CommitteeError> {
        self.sessions
            .get(task_id)
            .ok_or_else(|| CommitteeError::SessionNotFound(task_id.to_string()))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    pub fn export_state(&self) -> CommitteeSnapshot {
        let mut sessions: Vec<VerificationSession> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        CommitteeSnapshot {
            members: self.committee.members().cloned().collect(),
            sessions,
        }
    }

    pub fn import_state(&mut self, snapshot: CommitteeSnapshot) {
        self.committee.replace_members(snapshot.members);
        self.sessions = snapshot
            .sessions
            .into_iter()
            .map(|s| (s.task_id.clone(), s))
            .collect();
        tracing::info!(
            members = self.committee.member_count(),
            sessions = self.sessions.len(),
            "committee state imported"
        );
    }

    pub fn export_json(&self) -> Result<Vec<u8>, CommitteeError> {
        serde_json::to_vec(&self.export_state())
            .map_err(|e| CommitteeError::InvalidSnapshot(e.to_string()))
    }

    pub fn import_json(&mut self, bytes: &[u8]) -> Result<(), CommitteeError> {
        let snapshot = serde_json::from_slice(bytes)
            .map_err(|e| CommitteeError::InvalidSnapshot(e.to_string()))?;
        self.import_state(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_nullables::NullClock;
    use agora_types::Timestamp;

    fn manager(members: usize) -> (Arc<NullClock>, CommitteeManager) {
        let clock = Arc::new(NullClock::new(1_000));
        let mut m = CommitteeManager::new(CommitteeConfig::default(), clock.clone());
        for i in 0..members {
            m.add_member(NodeId::new(format!("m{i}")), format!("pk{i}"), 0.5)
                .unwrap();
        }
        (clock, m)
    }

    fn proof(task: &str) -> TaskProof {
        TaskProof {
            task_id: task.into(),
            executor_id: NodeId::new("exec"),
            result_hash: "h".into(),
            signature: String::new(),
            submitted_at: Timestamp::new(1_000),
        }
    }

    fn vote(task: &str, verifier: &NodeId, valid: bool) -> VerificationVote {
        VerificationVote {
            task_id: task.into(),
            verifier_id: verifier.clone(),
            valid,
            reason: "checked".into(),
            signature: String::new(),
            timestamp: Timestamp::new(1_001),
        }
    }

    #[test]
    fn full_round_reaches_consensus_at_quorum() {
        let (_, mut m) = manager(7);
        let verifiers = m
            .initiate_verification(proof("t1"), None, None)
            .unwrap()
            .verifiers
            .clone();
        assert_eq!(verifiers.len(), 5);

        assert!(m.submit_verification(vote("t1", &verifiers[0], true)).unwrap().is_none());
        assert!(m.submit_verification(vote("t1", &verifiers[1], true)).unwrap().is_none());
        let result = m
            .submit_verification(vote("t1", &verifiers[2], true))
            .unwrap()
            .unwrap();
        assert!(result.valid);
        assert_eq!(m.verification_result("t1").unwrap(), Some(result));

        let late = m.submit_verification(vote("t1", &verifiers[3], false));
        assert!(matches!(late, Err(CommitteeError::SessionFinalized(_))));
    }

    #[test]
    fn initiate_requires_min_members() {
        let (_, mut m) = manager(2);
        assert!(matches!(
            m.initiate_verification(proof("t1"), None, None),
            Err(CommitteeError::InsufficientMembers { .. })
        ));
    }

    #[test]
    fn open_session_blocks_reinitiation_until_deadline() {
        let (clock, mut m) = manager(5);
        m.initiate_verification(proof("t1"), Some(3), Some(60)).unwrap();
        assert!(matches!(
            m.initiate_verification(proof("t1"), Some(3), Some(60)),
            Err(CommitteeError::SessionExists(_))
        ));
        clock.advance(61);
        assert!(m.initiate_verification(proof("t1"), Some(3), Some(60)).is_ok());
    }

    #[test]
    fn vote_for_unknown_task() {
        let (_, mut m) = manager(3);
        let err = m
            .submit_verification(vote("nope", &NodeId::new("m0"), true))
            .unwrap_err();
        assert_eq!(err.kind(), agora_types::ErrorKind::NotFound);
    }

    #[test]
    fn snapshot_round_trip() {
        let (clock, mut m) = manager(4);
        m.initiate_verification(proof("t1"), Some(3), None).unwrap();
        let bytes = m.export_json().unwrap();

        let mut restored = CommitteeManager::new(CommitteeConfig::default(), clock);
        restored.import_json(&bytes).unwrap();
        assert_eq!(restored.export_state(), m.export_state());
        assert_eq!(restored.committee().member_count(), 4);
    }
}
