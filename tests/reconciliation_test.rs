//! End-to-end reconciliation scenarios over the record service

mod common;

use common::{new_record, ScriptedLedger, TestHarness};
use ledger_audit::fingerprint::Digest;
use ledger_audit::ledger::Ledger;
use ledger_audit::reconcile::{AnchorSource, Verdict};

#[tokio::test]
async fn test_alice_verified_then_tampered() {
    let harness = TestHarness::new(ScriptedLedger::new()).await;
    let alice = harness
        .create_anchored(new_record(1, "Alice", "Eng", "70000"))
        .await;

    let report = harness.service.verify_record(1).await.unwrap();
    assert_eq!(report.verdict, Verdict::Verified);
    assert_eq!(report.stored_digest, report.computed_digest.to_hex());
    assert_eq!(report.computed_digest, report.anchor_digest);

    harness.service.update_field(1, "salary", "99999").await.unwrap();

    let report = harness.service.verify_record(1).await.unwrap();
    assert_eq!(report.verdict, Verdict::Tampered);
    assert_eq!(report.stored_digest, alice.stored_digest);
    assert_eq!(report.stored_digest, report.anchor_digest.to_hex());
    assert_ne!(report.computed_digest, report.anchor_digest);
    assert_eq!(report.salary, "99999");

    let alerts = harness.delivered_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].record_id, 1);
    assert_eq!(alerts[0].record_name, "Alice");
    assert_eq!(alerts[0].verdict, Verdict::Tampered);
}

#[tokio::test]
async fn test_ledger_timeout_is_pending_without_alert() {
    let harness = TestHarness::new(ScriptedLedger::new()).await;
    harness
        .create_anchored(new_record(2, "Bob", "Ops", "50000"))
        .await;
    // Even an edited record must not be reported as tampered on a failed read
    harness.service.update_field(2, "role", "Admin").await.unwrap();
    harness.ledger.fail_reads_for(2);

    let report = harness.service.verify_record(2).await.unwrap();
    assert_eq!(report.verdict, Verdict::PendingAnchor);
    assert_eq!(report.anchor_source, AnchorSource::Unavailable);
    assert!(report.anchor_digest.is_sentinel());

    // The failure was not cached; once the ledger answers the edit shows up
    harness.ledger.heal_reads_for(2);
    let report = harness.service.verify_record(2).await.unwrap();
    assert_eq!(report.verdict, Verdict::Tampered);

    let alerts = harness.delivered_alerts().await;
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn test_pending_until_anchor_confirms() {
    let harness = TestHarness::new(ScriptedLedger::gated()).await;
    let created = harness
        .service
        .create_record(new_record(3, "Carol", "Eng", "80000"))
        .await
        .unwrap();

    let report = harness.service.verify_record(3).await.unwrap();
    assert_eq!(report.verdict, Verdict::PendingAnchor);
    assert_eq!(report.anchor_source, AnchorSource::Ledger);

    harness.ledger.release(1);
    created.anchor_task.await.unwrap().unwrap();

    // The confirmed anchor evicts the cached sentinel
    let report = harness.service.verify_record(3).await.unwrap();
    assert_eq!(report.verdict, Verdict::Verified);

    assert!(harness.delivered_alerts().await.is_empty());
}

#[tokio::test]
async fn test_repeated_anchor_is_idempotent() {
    let harness = TestHarness::new(ScriptedLedger::new()).await;
    let record = harness
        .create_anchored(new_record(4, "Dan", "Eng", "60000"))
        .await;

    let first = harness.ledger.fetch(4).await.unwrap();
    harness.service.anchor_record(4).await.unwrap();
    harness.service.anchor_record(4).await.unwrap();

    assert_eq!(harness.ledger.fetch(4).await.unwrap(), first);
    assert_eq!(first.to_hex(), record.stored_digest);
    let history = harness.service.recent_transactions(10).await;
    assert_eq!(history.total_transactions, 3);
    assert!(history.transactions.iter().all(|t| t.record_name == "Dan"));
    assert_eq!(
        harness.service.verify_record(4).await.unwrap().verdict,
        Verdict::Verified
    );
}

#[tokio::test]
async fn test_overwritten_anchor_is_inconsistent() {
    let harness = TestHarness::new(ScriptedLedger::new()).await;
    harness
        .create_anchored(new_record(5, "Eve", "Eng", "90000"))
        .await;

    // Someone anchors a different digest under the same id
    harness
        .ledger
        .anchor(5, Digest::from_bytes([0x42; 32]))
        .await
        .unwrap();
    harness.service.clear_cache().await;

    let report = harness.service.verify_record(5).await.unwrap();
    assert_eq!(report.verdict, Verdict::Inconsistent);

    let alerts = harness.delivered_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].verdict, Verdict::Inconsistent);
    assert_eq!(alerts[0].anchor_digest, Digest::from_bytes([0x42; 32]));
}

#[tokio::test]
async fn test_duplicate_id_rejected() {
    let harness = TestHarness::new(ScriptedLedger::new()).await;
    harness
        .create_anchored(new_record(6, "Frank", "Eng", "1"))
        .await;

    let err = harness
        .service
        .create_record(new_record(6, "Grace", "Ops", "2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ledger_audit::AuditError::DuplicateId(6)));

    let stored = harness.service.get_record(6).await.unwrap();
    assert_eq!(stored.name, "Frank");
}
