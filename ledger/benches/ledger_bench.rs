use std::sync::Arc;

use agora_ledger::{LedgerPayload, SignedLedger, TaskSubmissionData};
use agora_nullables::{NullClock, NullSigner, NullVerifier};
use agora_types::NodeId;
use criterion::{criterion_group, criterion_main, Criterion};

fn filled_ledger(n: usize) -> SignedLedger {
    let mut ledger = SignedLedger::new(Arc::new(NullClock::new(0)))
        .with_signer(Arc::new(NullSigner::new("local")))
        .with_verifier(Arc::new(NullVerifier));
    let local = NodeId::from("local");
    for i in 0..n {
        let payload = LedgerPayload::TaskSubmission(TaskSubmissionData {
            task_id: format!("task_{i}"),
            task_type: "compute".into(),
            difficulty: 5,
            submitter_id: local.clone(),
            worker_id: None,
        });
        ledger.add_entry(&local, &payload).unwrap();
    }
    ledger
}

fn bench_append(c: &mut Criterion) {
    c.bench_function("ledger_append_1000", |b| b.iter(|| filled_ledger(1_000)));
}

fn bench_verify_chain(c: &mut Criterion) {
    let ledger = filled_ledger(1_000);
    c.bench_function("ledger_verify_chain_1000", |b| b.iter(|| ledger.verify_chain()));
}

criterion_group!(benches, bench_append, bench_verify_chain);
criterion_main!(benches);
