//! Rule table for auto-resolution suggestions.
//!
//! A rule is a dispute type, a predicate over the dispute and a builder for
//! the resolution it proposes. Rules are tried in registration order and the
//! first match wins.

use serde::{Deserialize, Serialize};

use crate::dispute::{Dispute, DisputeType, EvidenceKind, Resolution};

pub type Predicate = Box<dyn Fn(&Dispute) -> bool + Send + Sync>;
pub type ResolutionBuilder = Box<dyn Fn(&Dispute) -> Resolution + Send + Sync>;

pub struct AutoResolveRule {
    pub dispute_type: DisputeType,
    pub description: String,
    pub condition: Predicate,
    pub resolve: ResolutionBuilder,
}

impl AutoResolveRule {
    pub fn new(
        dispute_type: DisputeType,
        description: impl Into<String>,
        condition: impl Fn(&Dispute) -> bool + Send + Sync + 'static,
        resolve: impl Fn(&Dispute) -> Resolution + Send + Sync + 'static,
    ) -> Self {
        Self {
            dispute_type,
            description: description.into(),
            condition: Box::new(condition),
            resolve: Box::new(resolve),
        }
    }

    pub fn matches(&self, dispute: &Dispute) -> bool {
        self.dispute_type == dispute.dispute_type && (self.condition)(dispute)
    }
}

impl std::fmt::Debug for AutoResolveRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoResolveRule")
            .field("dispute_type", &self.dispute_type)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// A non-binding, rule-matched outcome awaiting approval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutoResolveSuggestion {
    pub dispute_id: String,
    pub matched_rule: String,
    pub suggestion: Resolution,
    /// 0.5 plus up to 0.5 for the verified share of the evidence.
    pub confidence: f64,
    pub missing_evidence: Vec<String>,
    pub warnings: Vec<String>,
    /// True only with at least one verified evidence item and no warnings.
    pub can_auto_execute: bool,
}

pub const TIMEOUT_PENALTY: f64 = 0.10;
pub const NON_DELIVERY_PENALTY: f64 = 0.20;
pub const NON_PAYMENT_PENALTY: f64 = 0.15;

/// The built-in rules.
pub fn default_rules() -> Vec<AutoResolveRule> {
    vec![
        AutoResolveRule::new(
            DisputeType::Timeout,
            "timeout with delivery proof: complainant wins",
            |d| d.has_evidence(&d.complainant_id, EvidenceKind::DeliveryProof),
            |d| {
                Resolution::award(
                    &d.complainant_id,
                    &d.defendant_id,
                    d.amount,
                    TIMEOUT_PENALTY,
                    "timeout with valid delivery proof",
                )
            },
        ),
        AutoResolveRule::new(
            DisputeType::NonDelivery,
            "non-delivery without proof: complainant wins",
            |d| !d.has_evidence(&d.defendant_id, EvidenceKind::DeliveryProof),
            |d| {
                Resolution::award(
                    &d.complainant_id,
                    &d.defendant_id,
                    d.amount,
                    NON_DELIVERY_PENALTY,
                    "non-delivery without delivery proof",
                )
            },
        ),
        AutoResolveRule::new(
            DisputeType::NonPayment,
            "non-payment with completion proof: defendant wins",
            |d| d.has_evidence(&d.defendant_id, EvidenceKind::CompletionProof),
            |d| {
                Resolution::award(
                    &d.defendant_id,
                    &d.complainant_id,
                    d.amount,
                    NON_PAYMENT_PENALTY,
                    "non-payment despite completion proof",
                )
            },
        ),
    ]
}

/// Run `rules` against `dispute` and build the suggestion for the first match.
pub(crate) fn suggest(rules: &[AutoResolveRule], dispute: &Dispute) -> Option<AutoResolveSuggestion> {
    let rule = rules.iter().find(|r| r.matches(dispute))?;

    let mut resolution = (rule.resolve)(dispute);
    resolution.resolved_by = "system_suggestion".into();

    let warnings: Vec<String> = dispute
        .evidence
        .iter()
        .filter(|e| !e.verified)
        .map(|e| format!("evidence {} ({:?}) is not verified", e.id, e.kind))
        .collect();
    let verified = dispute.verified_evidence_count();
    let mut missing_evidence = Vec::new();
    if verified == 0 {
        missing_evidence.push("at least one verified evidence item".to_string());
    }
    let confidence = if dispute.evidence.is_empty() {
        0.5
    } else {
        0.5 + 0.5 * verified as f64 / dispute.evidence.len() as f64
    };

    Some(AutoResolveSuggestion {
        dispute_id: dispute.id.clone(),
        matched_rule: rule.description.clone(),
        suggestion: resolution,
        confidence,
        can_auto_execute: verified > 0 && warnings.is_empty(),
        missing_evidence,
        warnings,
    })
}
