use std::fmt;

use agora_crypto::blake2b_256_hex;
use agora_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "genesis";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    NodeRegistration,
    TaskSubmission,
    ProofSubmission,
    VerificationVote,
    ReputationChange,
    TokenTransfer,
    TokenReward,
    CommitteeDecision,
    SybilReport,
    DisputeResolution,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::NodeRegistration => "node_registration",
            EntryType::TaskSubmission => "task_submission",
            EntryType::ProofSubmission => "proof_submission",
            EntryType::VerificationVote => "verification_vote",
            EntryType::ReputationChange => "reputation_change",
            EntryType::TokenTransfer => "token_transfer",
            EntryType::TokenReward => "token_reward",
            EntryType::CommitteeDecision => "committee_decision",
            EntryType::SybilReport => "sybil_report",
            EntryType::DisputeResolution => "dispute_resolution",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub entry_type: EntryType,
    pub timestamp: Timestamp,
    /// Author; the signature is checked against this id.
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Payload JSON, hashed verbatim.
    pub data: String,
    pub prev_hash: String,
    pub hash: String,
    /// Hex signature over `hash`; empty when the ledger has no signer.
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub witnesses: Vec<NodeId>,
}

/// The hashed subset of an entry, serialized in field order.
#[derive(Serialize)]
struct HashInput<'a> {
    id: &'a str,
    entry_type: &'a str,
    timestamp: u64,
    node_id: &'a str,
    data: &'a str,
    prev_hash: &'a str,
}

impl LedgerEntry {
    /// Blake2b-256 (hex) of the entry's hashed fields.
    pub fn compute_hash(&self) -> String {
        let input = HashInput {
            id: &self.id,
            entry_type: self.entry_type.as_str(),
            timestamp: self.timestamp.as_secs(),
            node_id: self.node_id.as_str(),
            data: &self.data,
            prev_hash: &self.prev_hash,
        };
        // A struct of strings and integers always serializes.
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        blake2b_256_hex(&bytes)
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

/// Result of walking the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainVerification {
    Valid { entries: usize },
    /// Entry `index` and everything after it cannot be trusted.
    Broken { index: usize, reason: String },
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChainVerification::Valid { .. })
    }

    /// Index of the first bad entry, if any.
    pub fn first_invalid(&self) -> Option<usize> {
        match self {
            ChainVerification::Valid { .. } => None,
            ChainVerification::Broken { index, .. } => Some(*index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LedgerEntry {
        LedgerEntry {
            id: "entry_1".into(),
            entry_type: EntryType::SybilReport,
            timestamp: Timestamp::new(5),
            node_id: "n1".into(),
            target_node_id: None,
            task_id: None,
            data: "{}".into(),
            prev_hash: GENESIS_HASH.into(),
            hash: String::new(),
            signature: String::new(),
            verified: false,
            witnesses: Vec::new(),
        }
    }

    #[test]
    fn hash_covers_payload_and_link() {
        let base = entry().compute_hash();
        assert_eq!(base.len(), 64);

        let mut changed = entry();
        changed.data = "{\"x\":1}".into();
        assert_ne!(changed.compute_hash(), base);

        let mut relinked = entry();
        relinked.prev_hash = "abc".into();
        assert_ne!(relinked.compute_hash(), base);
    }

    #[test]
    fn metadata_is_not_hashed() {
        let base = entry().compute_hash();
        let mut witnessed = entry();
        witnessed.witnesses.push("w1".into());
        witnessed.verified = true;
        assert_eq!(witnessed.compute_hash(), base);
    }

    #[test]
    fn entry_type_names() {
        assert_eq!(EntryType::DisputeResolution.to_string(), "dispute_resolution");
        assert_eq!(
            serde_json::to_string(&EntryType::NodeRegistration).unwrap(),
            "\"node_registration\""
        );
    }
}
