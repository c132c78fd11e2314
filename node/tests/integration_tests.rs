//! End-to-end flows through `MarketNode`: publishing, delivery, committee
//! verification, disputes and arbitration, with every step checked against
//! the signed ledger.

use std::sync::Arc;

use agora_crypto::{keypair_from_seed, KeyPairSigner};
use agora_disputes::{DisputeStatus, DisputeType, EvidenceKind, ResolutionType};
use agora_ledger::{ChainVerification, EntryType};
use agora_node::{MarketNode, NodeConfig, NodeError};
use agora_nullables::{NullClock, NullSigner, NullStore, NullVerifier};
use agora_tasks::{PublishMode, Task, TaskClaim, TaskStatus, TaskType};
use agora_types::{ErrorKind, NodeId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn node_id(s: &str) -> NodeId {
    NodeId::new(s)
}

fn test_node() -> (MarketNode, Arc<NullClock>) {
    let clock = Arc::new(NullClock::new(1_700_000_000));
    let node = MarketNode::with_parts(
        NodeConfig::default(),
        clock.clone(),
        Arc::new(NullStore::new()),
        Arc::new(NullSigner::new("local")),
        Arc::new(NullVerifier),
    )
    .expect("node opens");
    (node, clock)
}

async fn register_all(node: &MarketNode, names: &[&str]) {
    for name in names {
        node.register_node(&node_id(name), &format!("pk-{name}"))
            .await
            .expect("register");
    }
}

/// A claimable task from `requester`, claimed by `executor` and in progress.
async fn task_in_progress(node: &MarketNode, requester: &str, executor: &str, reward: f64) -> String {
    let mut task = Task::new(requester, TaskType::Storage, "archive logs", reward);
    task.publish_mode = PublishMode::CapabilityMatch;
    let task = node.publish_task(task).await.expect("publish");
    node.claim_task(TaskClaim {
        task_id: task.id.clone(),
        claimer_id: node_id(executor),
        signature: String::new(),
    })
    .await
    .expect("claim");
    node.start_execution(&task.id, &node_id(executor))
        .await
        .expect("start");
    task.id
}

async fn assert_chain_valid(node: &MarketNode) {
    let ledger = node.ledger.read().await;
    assert!(
        matches!(ledger.verify_chain(), ChainVerification::Valid { .. }),
        "ledger chain should verify"
    );
}

// ---------------------------------------------------------------------------
// Scenario A: completion bonus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_task_at_reference_difficulty_adds_five_hundredths() {
    let (node, _) = test_node();
    let record = node.register_node(&node_id("n1"), "pk").await.unwrap();
    assert_eq!(record.new_score, 0.5);

    let record = node
        .reputation
        .write()
        .await
        .on_task_completed(&node_id("n1"), "t1", 5)
        .unwrap();
    assert!((record.delta - 0.05).abs() < 1e-12);
    assert!((record.new_score - 0.55).abs() < 1e-12);
    assert_eq!(
        node.reputation.read().await.get_score(&node_id("n1")).unwrap(),
        record.new_score
    );
}

// ---------------------------------------------------------------------------
// Scenario B: auto-resolved non-delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_delivery_with_verified_evidence_auto_resolves_for_complainant() {
    let (node, _) = test_node();
    {
        let mut disputes = node.disputes.write().await;
        let dispute = disputes
            .create_dispute(
                "task1",
                &node_id("comp1"),
                &node_id("def1"),
                DisputeType::NonDelivery,
                "nothing was delivered",
                100.0,
            )
            .unwrap();
        let evidence = disputes
            .submit_evidence(&dispute.id, &node_id("comp1"), EvidenceKind::Text, "no files", "")
            .unwrap();
        disputes
            .verify_evidence(&dispute.id, &evidence, &node_id("auditor"))
            .unwrap();
        disputes.start_review(&dispute.id).unwrap();
    }

    let dispute_id = node.disputes.read().await.dispute_by_task("task1").unwrap().id.clone();
    let suggestion = node.try_auto_resolve(&dispute_id).await.unwrap();
    assert!(suggestion.can_auto_execute);
    assert_eq!(suggestion.suggestion.winner, Some(node_id("comp1")));
}

#[tokio::test]
async fn auto_resolution_through_the_node_cancels_the_task() {
    let (node, _) = test_node();
    register_all(&node, &["req", "exec"]).await;
    let task_id = task_in_progress(&node, "req", "exec", 50.0).await;

    let dispute = node
        .open_dispute(&task_id, &node_id("req"), DisputeType::NonDelivery, "deadline passed")
        .await
        .unwrap();
    assert_eq!(dispute.defendant_id, node_id("exec"));
    assert_eq!(dispute.amount, 50.0);
    assert_eq!(
        node.tasks.read().await.get_task(&task_id).unwrap().status,
        TaskStatus::Disputed
    );

    {
        let mut disputes = node.disputes.write().await;
        let evidence = disputes
            .submit_evidence(&dispute.id, &node_id("req"), EvidenceKind::Text, "no output", "")
            .unwrap();
        disputes
            .verify_evidence(&dispute.id, &evidence, &node_id("local"))
            .unwrap();
        disputes.start_review(&dispute.id).unwrap();
    }
    let suggestion = node.try_auto_resolve(&dispute.id).await.unwrap();
    let resolution = node
        .apply_auto_resolution(&suggestion, &node_id("local"))
        .await
        .unwrap();
    assert_eq!(resolution.winner, Some(node_id("req")));
    assert!((resolution.penalty - 10.0).abs() < 1e-9);

    let disputes = node.disputes.read().await;
    let stored = disputes.get_dispute(&dispute.id).unwrap();
    assert_eq!(stored.status, DisputeStatus::Resolved);
    assert_eq!(stored.resolution_type, Some(ResolutionType::Automatic));
    drop(disputes);

    assert_eq!(
        node.tasks.read().await.get_task(&task_id).unwrap().status,
        TaskStatus::Cancelled
    );
    let exec_score = node.reputation.read().await.get_score(&node_id("exec")).unwrap();
    assert!((exec_score - 0.4).abs() < 1e-9);

    let ledger = node.ledger.read().await;
    assert_eq!(ledger.entries_by_type(EntryType::DisputeResolution).len(), 1);
    assert_eq!(ledger.task_entries(&task_id).len(), 3);
    drop(ledger);
    assert_chain_valid(&node).await;
}

// ---------------------------------------------------------------------------
// Scenario C: requester deposit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn published_task_holds_reward_times_deposit_multiplier() {
    let (node, _) = test_node();
    register_all(&node, &["req"]).await;
    let task = node
        .publish_task(Task::new("req", TaskType::Compute, "train", 10.0))
        .await
        .unwrap();
    assert_eq!(task.requester_deposit, 12.0);
    assert_eq!(task.status, TaskStatus::Published);

    let ledger = node.ledger.read().await;
    let entries = ledger.task_entries(&task.id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, EntryType::TaskSubmission);
}

#[tokio::test]
async fn publish_quota_is_enforced_per_requester() {
    let (node, clock) = test_node();
    register_all(&node, &["req"]).await;
    // 2 + floor(0.5 * 4) = 4 publishes per hour at the initial score.
    for i in 0..4 {
        node.publish_task(Task::new("req", TaskType::Search, format!("q{i}"), 1.0))
            .await
            .unwrap();
    }
    let err = node
        .publish_task(Task::new("req", TaskType::Search, "one too many", 1.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    clock.advance(3_601);
    node.publish_task(Task::new("req", TaskType::Search, "next hour", 1.0))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Scenario D: arbitration majority
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_two_arbitration_split_awards_complainant_with_ten_percent_penalty() {
    let (node, _) = test_node();
    let arbitrators = ["a1", "a2", "a3", "a4", "a5"];
    register_all(&node, &["req", "exec"]).await;
    register_all(&node, &arbitrators).await;
    for a in arbitrators {
        node.join_committee(&node_id(a), "pk").await.unwrap();
    }

    let task_id = task_in_progress(&node, "req", "exec", 40.0).await;
    let dispute = node
        .open_dispute(&task_id, &node_id("req"), DisputeType::QualityIssue, "wrong format")
        .await
        .unwrap();
    {
        let mut disputes = node.disputes.write().await;
        disputes
            .submit_evidence(&dispute.id, &node_id("req"), EvidenceKind::Hash, "diff", "abc")
            .unwrap();
        disputes.start_review(&dispute.id).unwrap();
    }

    let seated = node.start_arbitration(&dispute.id).await.unwrap();
    assert_eq!(seated.len(), 5);

    let votes = [
        ("a1", "req"),
        ("a2", "req"),
        ("a3", "req"),
        ("a4", "exec"),
        ("a5", "exec"),
    ];
    for (arbitrator, vote_for) in votes {
        node.submit_arbitration_vote(
            &dispute.id,
            &node_id(arbitrator),
            &node_id(vote_for),
            "reviewed",
            "sig",
        )
        .await
        .unwrap();
    }

    let resolution = node.finalize_arbitration(&dispute.id).await.unwrap();
    assert_eq!(resolution.winner, Some(node_id("req")));
    assert_eq!(resolution.loser, Some(node_id("exec")));
    assert!((resolution.penalty - 40.0 * 0.1).abs() < 1e-9);

    assert_eq!(
        node.tasks.read().await.get_task(&task_id).unwrap().status,
        TaskStatus::Cancelled
    );
    let ledger = node.ledger.read().await;
    let resolutions = ledger.entries_by_type(EntryType::DisputeResolution);
    assert_eq!(resolutions.len(), 1);
    assert_eq!(resolutions[0].target_node_id, Some(node_id("exec")));
    drop(ledger);
    assert_chain_valid(&node).await;
}

#[tokio::test]
async fn arbitration_needs_enough_committee_members() {
    let (node, _) = test_node();
    register_all(&node, &["req", "exec", "a1", "a2"]).await;
    for a in ["a1", "a2"] {
        node.join_committee(&node_id(a), "pk").await.unwrap();
    }
    let task_id = task_in_progress(&node, "req", "exec", 5.0).await;
    let dispute = node
        .open_dispute(&task_id, &node_id("exec"), DisputeType::NonPayment, "unpaid")
        .await
        .unwrap();
    assert_eq!(dispute.defendant_id, node_id("req"));
    {
        let mut disputes = node.disputes.write().await;
        disputes
            .submit_evidence(&dispute.id, &node_id("exec"), EvidenceKind::Text, "invoice", "")
            .unwrap();
        disputes.start_review(&dispute.id).unwrap();
    }
    let err = node.start_arbitration(&dispute.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

// ---------------------------------------------------------------------------
// Verification and settlement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_delivery_moves_task_to_disputed_and_penalises_executor() {
    let (node, _) = test_node();
    register_all(&node, &["req", "exec", "v1", "v2", "v3"]).await;
    for v in ["v1", "v2", "v3"] {
        node.join_committee(&node_id(v), "pk").await.unwrap();
    }
    let task_id = task_in_progress(&node, "req", "exec", 8.0).await;
    node.submit_delivery(&task_id, &node_id("exec"), "deadbeef", "esig")
        .await
        .unwrap();

    let verifiers = node.request_verification(&task_id).await.unwrap();
    let mut result = None;
    for verifier in verifiers {
        let vote = agora_committee::VerificationVote {
            task_id: task_id.clone(),
            verifier_id: verifier,
            valid: false,
            reason: "hash mismatch".into(),
            signature: String::new(),
            timestamp: agora_types::Timestamp::EPOCH,
        };
        if let Some(r) = node.submit_verification_vote(vote).await.unwrap() {
            result = Some(r);
            break;
        }
    }
    let result = result.expect("committee reaches a verdict");
    assert!(!result.valid);
    assert_eq!(
        node.tasks.read().await.get_task(&task_id).unwrap().status,
        TaskStatus::Disputed
    );
    let exec_score = node.reputation.read().await.get_score(&node_id("exec")).unwrap();
    assert!((exec_score - 0.4).abs() < 1e-9);
    assert_chain_valid(&node).await;
}

#[tokio::test]
async fn late_vote_after_verdict_is_rejected() {
    let (node, _) = test_node();
    register_all(&node, &["req", "exec", "v1", "v2", "v3"]).await;
    for v in ["v1", "v2", "v3"] {
        node.join_committee(&node_id(v), "pk").await.unwrap();
    }
    let task_id = task_in_progress(&node, "req", "exec", 8.0).await;
    node.submit_delivery(&task_id, &node_id("exec"), "h", "s").await.unwrap();
    let verifiers = node.request_verification(&task_id).await.unwrap();

    let mut remaining = Vec::new();
    let mut decided = false;
    for verifier in verifiers {
        if decided {
            remaining.push(verifier);
            continue;
        }
        let vote = agora_committee::VerificationVote {
            task_id: task_id.clone(),
            verifier_id: verifier,
            valid: true,
            reason: String::new(),
            signature: String::new(),
            timestamp: agora_types::Timestamp::EPOCH,
        };
        decided = node.submit_verification_vote(vote).await.unwrap().is_some();
    }
    assert!(decided);
    let late = remaining.pop().expect("one verifier left over");
    let err = node
        .submit_verification_vote(agora_committee::VerificationVote {
            task_id: task_id.clone(),
            verifier_id: late,
            valid: false,
            reason: String::new(),
            signature: String::new(),
            timestamp: agora_types::Timestamp::EPOCH,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Committee(_)));
}

// ---------------------------------------------------------------------------
// Durability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_backed_node_restores_state_after_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = NodeConfig {
        data_dir: dir.path().to_path_buf(),
        ..NodeConfig::default()
    };
    let signer = Arc::new(KeyPairSigner::new(keypair_from_seed(&[7u8; 32])));

    let task_id = {
        let mut node = MarketNode::open(config.clone(), signer.clone()).unwrap();
        node.start().await.unwrap();
        register_all(&node, &["req", "exec"]).await;
        let task_id = task_in_progress(&node, "req", "exec", 3.0).await;
        node.stop().await.unwrap();
        task_id
    };

    let node = MarketNode::open(config, signer).unwrap();
    assert_eq!(node.reputation.read().await.node_count(), 2);
    assert_eq!(
        node.tasks.read().await.get_task(&task_id).unwrap().status,
        TaskStatus::InProgress
    );
    let ledger = node.ledger.read().await;
    assert_eq!(ledger.len(), 4);
    assert!(ledger.entries().iter().all(|e| e.is_signed()));
    drop(ledger);
    assert_chain_valid(&node).await;
}
