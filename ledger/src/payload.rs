//! Typed payloads for each entry type.
//!
//! The entry stores the payload's JSON text; the variant determines the
//! entry type and the task and target ids indexed alongside it.

use agora_types::NodeId;
use serde::{Deserialize, Serialize};

use crate::entry::EntryType;
use crate::error::LedgerError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRegistrationData {
    pub node_id: NodeId,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmissionData {
    pub task_id: String,
    pub task_type: String,
    pub difficulty: u32,
    pub submitter_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofSubmissionData {
    pub task_id: String,
    pub worker_id: NodeId,
    pub proof_hash: String,
    pub result_hash: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationVoteData {
    pub task_id: String,
    pub verifier_id: NodeId,
    pub approved: bool,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationChangeData {
    pub node_id: NodeId,
    pub old_score: f64,
    pub new_score: f64,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenTransferData {
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRewardData {
    pub node_id: NodeId,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub reward_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitteeDecisionData {
    pub task_id: String,
    /// `approved` or `rejected`.
    pub decision: String,
    pub approval_rate: f64,
    pub total_weight: f64,
    pub votes: Vec<VerificationVoteData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SybilReportData {
    pub node_id: NodeId,
    pub reason: String,
    pub new_score: f64,
    pub banned: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisputeResolutionData {
    pub dispute_id: String,
    pub task_id: String,
    pub winner: Option<NodeId>,
    pub loser: Option<NodeId>,
    pub amount_to_winner: f64,
    pub penalty: f64,
    pub resolved_by: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LedgerPayload {
    NodeRegistration(NodeRegistrationData),
    TaskSubmission(TaskSubmissionData),
    ProofSubmission(ProofSubmissionData),
    VerificationVote(VerificationVoteData),
    ReputationChange(ReputationChangeData),
    TokenTransfer(TokenTransferData),
    TokenReward(TokenRewardData),
    CommitteeDecision(CommitteeDecisionData),
    SybilReport(SybilReportData),
    DisputeResolution(DisputeResolutionData),
}

/// Ids an entry is indexed under besides its author.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelatedIds {
    pub task_id: Option<String>,
    pub target_node_id: Option<NodeId>,
}

impl LedgerPayload {
    pub fn entry_type(&self) -> EntryType {
        match self {
            LedgerPayload::NodeRegistration(_) => EntryType::NodeRegistration,
            LedgerPayload::TaskSubmission(_) => EntryType::TaskSubmission,
            LedgerPayload::ProofSubmission(_) => EntryType::ProofSubmission,
            LedgerPayload::VerificationVote(_) => EntryType::VerificationVote,
            LedgerPayload::ReputationChange(_) => EntryType::ReputationChange,
            LedgerPayload::TokenTransfer(_) => EntryType::TokenTransfer,
            LedgerPayload::TokenReward(_) => EntryType::TokenReward,
            LedgerPayload::CommitteeDecision(_) => EntryType::CommitteeDecision,
            LedgerPayload::SybilReport(_) => EntryType::SybilReport,
            LedgerPayload::DisputeResolution(_) => EntryType::DisputeResolution,
        }
    }

    pub fn related_ids(&self) -> RelatedIds {
        let (task_id, target_node_id) = match self {
            LedgerPayload::NodeRegistration(d) => (None, Some(d.node_id.clone())),
            LedgerPayload::TaskSubmission(d) => (Some(d.task_id.clone()), d.worker_id.clone()),
            LedgerPayload::ProofSubmission(d) => {
                (Some(d.task_id.clone()), Some(d.worker_id.clone()))
            }
            LedgerPayload::VerificationVote(d) => {
                (Some(d.task_id.clone()), Some(d.verifier_id.clone()))
            }
            LedgerPayload::ReputationChange(d) => (None, Some(d.node_id.clone())),
            LedgerPayload::TokenTransfer(d) => (None, Some(d.to_node_id.clone())),
            LedgerPayload::TokenReward(d) => (d.task_id.clone(), Some(d.node_id.clone())),
            LedgerPayload::CommitteeDecision(d) => (Some(d.task_id.clone()), None),
            LedgerPayload::SybilReport(d) => (None, Some(d.node_id.clone())),
            LedgerPayload::DisputeResolution(d) => (Some(d.task_id.clone()), d.loser.clone()),
        };
        RelatedIds {
            task_id,
            target_node_id,
        }
    }

    /// The payload's JSON text as stored (and hashed) in the entry.
    pub fn to_json(&self) -> Result<String, LedgerError> {
        let json = match self {
            LedgerPayload::NodeRegistration(d) => serde_json::to_string(d),
            LedgerPayload::TaskSubmission(d) => serde_json::to_string(d),
            LedgerPayload::ProofSubmission(d) => serde_json::to_string(d),
            LedgerPayload::VerificationVote(d) => serde_json::to_string(d),
            LedgerPayload::ReputationChange(d) => serde_json::to_string(d),
            LedgerPayload::TokenTransfer(d) => serde_json::to_string(d),
            LedgerPayload::TokenReward(d) => serde_json::to_string(d),
            LedgerPayload::CommitteeDecision(d) => serde_json::to_string(d),
            LedgerPayload::SybilReport(d) => serde_json::to_string(d),
            LedgerPayload::DisputeResolution(d) => serde_json::to_string(d),
        }?;
        Ok(json)
    }

    /// Parse stored JSON back into the payload for `entry_type`.
    pub fn decode(entry_type: EntryType, data: &str) -> Result<Self, LedgerError> {
        let payload = match entry_type {
            EntryType::NodeRegistration => LedgerPayload::NodeRegistration(serde_json::from_str(data)?),
            EntryType::TaskSubmission => LedgerPayload::TaskSubmission(serde_json::from_str(data)?),
            EntryType::ProofSubmission => LedgerPayload::ProofSubmission(serde_json::from_str(data)?),
            EntryType::VerificationVote => LedgerPayload::VerificationVote(serde_json::from_str(data)?),
            EntryType::ReputationChange => LedgerPayload::ReputationChange(serde_json::from_str(data)?),
            EntryType::TokenTransfer => LedgerPayload::TokenTransfer(serde_json::from_str(data)?),
            EntryType::TokenReward => LedgerPayload::TokenReward(serde_json::from_str(data)?),
            EntryType::CommitteeDecision => LedgerPayload::CommitteeDecision(serde_json::from_str(data)?),
            EntryType::SybilReport => LedgerPayload::SybilReport(serde_json::from_str(data)?),
            EntryType::DisputeResolution => LedgerPayload::DisputeResolution(serde_json::from_str(data)?),
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_submission_targets_worker() {
        let payload = LedgerPayload::ProofSubmission(ProofSubmissionData {
            task_id: "task_1".into(),
            worker_id: "bob".into(),
            proof_hash: "p".into(),
            result_hash: "r".into(),
        });
        let ids = payload.related_ids();
        assert_eq!(ids.task_id.as_deref(), Some("task_1"));
        assert_eq!(ids.target_node_id, Some(NodeId::from("bob")));
        assert_eq!(payload.entry_type(), EntryType::ProofSubmission);
    }

    #[test]
    fn decode_matches_encoded_variant() {
        let payload = LedgerPayload::TokenTransfer(TokenTransferData {
            from_node_id: "a".into(),
            to_node_id: "b".into(),
            amount: 3.5,
            reason: String::new(),
        });
        let json = payload.to_json().unwrap();
        assert!(!json.contains("reason"));
        assert_eq!(LedgerPayload::decode(EntryType::TokenTransfer, &json).unwrap(), payload);
        assert!(LedgerPayload::decode(EntryType::SybilReport, &json).is_err());
    }
}
