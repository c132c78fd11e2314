use std::sync::Arc;

use agora_ledger::{
    ChainVerification, LedgerPayload, ReputationChangeData, SignedLedger, GENESIS_HASH,
};
use agora_nullables::{NullClock, NullSigner, NullVerifier};
use agora_types::NodeId;
use proptest::prelude::*;

fn build(scores: &[f64]) -> SignedLedger {
    let clock = Arc::new(NullClock::new(1_000));
    let mut ledger = SignedLedger::new(clock.clone())
        .with_signer(Arc::new(NullSigner::new("local")))
        .with_verifier(Arc::new(NullVerifier));
    let local = NodeId::from("local");
    for (i, score) in scores.iter().enumerate() {
        ledger
            .add_entry(
                &local,
                &LedgerPayload::ReputationChange(ReputationChangeData {
                    node_id: NodeId::from(format!("node{i}")),
                    old_score: 0.5,
                    new_score: *score,
                    reason: "test".into(),
                }),
            )
            .unwrap();
        clock.advance(1);
    }
    ledger
}

proptest! {
    #[test]
    fn untouched_chains_verify(scores in prop::collection::vec(-1.0f64..=1.0, 0..20)) {
        let ledger = build(&scores);
        prop_assert_eq!(ledger.verify_chain(), ChainVerification::Valid { entries: scores.len() });
        if let Some(first) = ledger.entries().first() {
            prop_assert_eq!(first.prev_hash.as_str(), GENESIS_HASH);
        }
    }

    /// Editing any entry's payload breaks verification exactly at that entry.
    #[test]
    fn tampering_is_located(
        scores in prop::collection::vec(-1.0f64..=1.0, 1..20),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut ledger = build(&scores);
        let target = pick.index(scores.len());
        let mut entries = ledger.export_state();
        entries[target].data = entries[target].data.replace("\"test\"", "\"forged\"");
        ledger.import_state(entries).unwrap();
        prop_assert_eq!(ledger.verify_chain().first_invalid(), Some(target));
    }
}
