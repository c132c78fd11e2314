//! Dispute records and their parts.

use std::fmt;

use agora_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Pending,
    InReview,
    Arbitration,
    Resolved,
    Dismissed,
    Expired,
}

impl DisputeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DisputeStatus::Resolved | DisputeStatus::Dismissed | DisputeStatus::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisputeStatus::Pending => "pending",
            DisputeStatus::InReview => "in_review",
            DisputeStatus::Arbitration => "arbitration",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Dismissed => "dismissed",
            DisputeStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    NonDelivery,
    QualityIssue,
    NonPayment,
    FalseDelivery,
    Timeout,
    Other,
}

impl DisputeType {
    pub fn as_str(self) -> &'static str {
        match self {
            DisputeType::NonDelivery => "non_delivery",
            DisputeType::QualityIssue => "quality_issue",
            DisputeType::NonPayment => "non_payment",
            DisputeType::FalseDelivery => "false_delivery",
            DisputeType::Timeout => "timeout",
            DisputeType::Other => "other",
        }
    }
}

impl fmt::Display for DisputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a resolved dispute was decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    /// An approved rule suggestion.
    Automatic,
    Committee,
    Mutual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Text,
    Hash,
    Signature,
    Screenshot,
    DeliveryProof,
    CompletionProof,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub submitter_id: NodeId,
    pub kind: EvidenceKind,
    pub content: String,
    #[serde(default)]
    pub hash: String,
    pub submitted_at: Timestamp,
    /// Set by an authority via `verify_evidence`; required for auto-execution.
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub verified_by: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationVote {
    pub arbitrator_id: NodeId,
    pub vote_for: NodeId,
    #[serde(default)]
    pub reason: String,
    pub voted_at: Timestamp,
    #[serde(default)]
    pub signature: String,
}

/// Outcome of a dispute. Dismissals carry no winner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub winner: Option<NodeId>,
    pub loser: Option<NodeId>,
    pub amount_to_winner: f64,
    /// Charged to the loser.
    pub penalty: f64,
    pub reason: String,
    pub resolved_by: String,
}

impl Resolution {
    /// `winner` takes `amount`; `loser` pays `penalty_rate × amount`.
    pub fn award(
        winner: &NodeId,
        loser: &NodeId,
        amount: f64,
        penalty_rate: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            winner: Some(winner.clone()),
            loser: Some(loser.clone()),
            amount_to_winner: amount,
            penalty: amount * penalty_rate,
            reason: reason.into(),
            resolved_by: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub task_id: String,
    pub complainant_id: NodeId,
    pub defendant_id: NodeId,
    pub dispute_type: DisputeType,
    #[serde(default)]
    pub description: String,
    /// Value in contention.
    pub amount: f64,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    pub status: DisputeStatus,
    pub resolution: Option<Resolution>,
    pub resolution_type: Option<ResolutionType>,
    /// Pool fixed when arbitration starts; only these nodes may vote.
    #[serde(default)]
    pub arbitrators: Vec<NodeId>,
    #[serde(default)]
    pub votes: Vec<ArbitrationVote>,
    pub vote_deadline: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub expires_at: Timestamp,
}

impl Dispute {
    pub fn is_participant(&self, node: &NodeId) -> bool {
        &self.complainant_id == node || &self.defendant_id == node
    }

    /// The other party, if `node` is a participant.
    pub fn counterparty(&self, node: &NodeId) -> Option<&NodeId> {
        if node == &self.complainant_id {
            Some(&self.defendant_id)
        } else if node == &self.defendant_id {
            Some(&self.complainant_id)
        } else {
            None
        }
    }

    /// Whether `submitter` has filed evidence of `kind`.
    pub fn has_evidence(&self, submitter: &NodeId, kind: EvidenceKind) -> bool {
        self.evidence
            .iter()
            .any(|e| e.kind == kind && &e.submitter_id == submitter)
    }

    pub fn verified_evidence_count(&self) -> usize {
        self.evidence.iter().filter(|e| e.verified).count()
    }

    /// Votes cast for each party, `(complainant, defendant)`.
    pub fn tally(&self) -> (usize, usize) {
        self.votes.iter().fold((0, 0), |(c, d), vote| {
            if vote.vote_for == self.complainant_id {
                (c + 1, d)
            } else {
                (c, d + 1)
            }
        })
    }
}
