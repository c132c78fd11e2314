use std::sync::Arc;

use agora_disputes::{DisputeConfig, DisputeError, DisputeManager, DisputeType, EvidenceKind};
use agora_nullables::{NullClock, NullStore};
use agora_types::NodeId;
use proptest::prelude::*;

fn manager() -> DisputeManager {
    DisputeManager::open(
        DisputeConfig::default(),
        Arc::new(NullClock::new(1_000)),
        Arc::new(NullStore::new()),
    )
    .unwrap()
}

proptest! {
    /// The party with strictly more votes always wins; ties stay open.
    #[test]
    fn arbitration_follows_majority(for_complainant in 0usize..6, for_defendant in 0usize..6) {
        prop_assume!(for_complainant + for_defendant >= 3);
        let comp = NodeId::from("comp");
        let def = NodeId::from("def");
        let mut m = manager();
        let id = m
            .create_dispute("task", &comp, &def, DisputeType::QualityIssue, "", 50.0)
            .unwrap()
            .id;
        m.submit_evidence(&id, &comp, EvidenceKind::Text, "poor", "").unwrap();
        m.start_review(&id).unwrap();

        let total = for_complainant + for_defendant;
        let pool: Vec<NodeId> = (0..total).map(|i| NodeId::from(format!("arb{i}"))).collect();
        m.start_arbitration(&id, &pool).unwrap();
        for (i, arbitrator) in pool.iter().enumerate() {
            let target = if i < for_complainant { &comp } else { &def };
            m.submit_vote(&id, arbitrator, target, "", "").unwrap();
        }

        match m.finalize_arbitration(&id) {
            Ok(resolution) => {
                let expected = if for_complainant > for_defendant { &comp } else { &def };
                prop_assert_ne!(for_complainant, for_defendant);
                prop_assert_eq!(resolution.winner.as_ref(), Some(expected));
                prop_assert!((resolution.penalty - 5.0).abs() < 1e-9);
            }
            Err(e) => {
                prop_assert_eq!(for_complainant, for_defendant);
                prop_assert!(matches!(e, DisputeError::NoMajority(_)), "unexpected error: {e}");
            }
        }
    }

    /// Confidence grows with the verified share of the evidence.
    #[test]
    fn confidence_tracks_verified_share(total in 1usize..8, verified in 0usize..8) {
        let verified = verified.min(total);
        let comp = NodeId::from("comp");
        let mut m = manager();
        let id = m
            .create_dispute("task", &comp, &NodeId::from("def"), DisputeType::NonDelivery, "", 10.0)
            .unwrap()
            .id;
        let ids: Vec<String> = (0..total)
            .map(|i| m.submit_evidence(&id, &comp, EvidenceKind::Text, &format!("item {i}"), "").unwrap())
            .collect();
        for evidence in ids.iter().take(verified) {
            m.verify_evidence(&id, evidence, &NodeId::from("auditor")).unwrap();
        }
        m.start_review(&id).unwrap();
        let s = m.try_auto_resolve(&id).unwrap();
        let expected = 0.5 + 0.5 * verified as f64 / total as f64;
        prop_assert!((s.confidence - expected).abs() < 1e-9);
        prop_assert_eq!(s.can_auto_execute, verified == total);
    }
}
