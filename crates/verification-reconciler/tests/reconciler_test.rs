//! Integration tests for the verification reconciler

use chrono::{Duration, Utc};
use kyc_common::{VerificationKind, VerificationRequest, VerificationStatus};
use verification_reconciler::provider::{BankLookupStatus, IdentityLookupStatus};
use verification_reconciler::{
    MemoryStore, MockProvider, Reconciler, VerificationStore, PENDING_BATCH_LIMIT,
};

fn pending_request(id: &str, kind: VerificationKind) -> VerificationRequest {
    VerificationRequest::new(
        id.to_string(),
        format!("merchant-{}", id),
        kind,
        format!("token-{}", id),
    )
}

#[tokio::test]
async fn test_terminal_records_are_never_polled() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    let mut completed = pending_request("done", VerificationKind::IdentityDocument);
    completed.mark_completed(serde_json::json!({"documents": []}));
    store.insert_request(&completed).await.unwrap();

    let mut failed = pending_request("rejected", VerificationKind::BankAccount);
    failed.mark_failed(None);
    store.insert_request(&failed).await.unwrap();

    let mut reconciler = Reconciler::new(store, provider.clone());
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.polled, 0);
    assert_eq!(provider.total_lookups(), 0);
}

#[tokio::test]
async fn test_completed_identity_check_persists_payload() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    let request = pending_request("id-1", VerificationKind::IdentityDocument);
    store.insert_request(&request).await.unwrap();

    provider.set_identity_status("token-id-1", IdentityLookupStatus::Completed);
    provider.set_identity_documents(
        "token-id-1",
        serde_json::json!({"documents": [{"type": "aadhaar", "uri": "dl://123"}]}),
    );

    let mut reconciler = Reconciler::new(store.clone(), provider.clone());
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.polled, 1);
    assert_eq!(report.completed, 1);

    let stored = store.get_request("id-1").await.unwrap().unwrap();
    assert_eq!(stored.status, VerificationStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.result.unwrap()["documents"][0]["type"], "aadhaar");

    // The record is terminal now; a second sweep must not poll it again
    let report = reconciler.reconcile_pending().await.unwrap();
    assert_eq!(report.polled, 0);
    assert_eq!(provider.lookup_count("token-id-1"), 1);
}

#[tokio::test]
async fn test_failed_identity_check_skips_document_fetch() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    let request = pending_request("id-2", VerificationKind::IdentityDocument);
    store.insert_request(&request).await.unwrap();

    provider.set_identity_status("token-id-2", IdentityLookupStatus::Failed);

    let mut reconciler = Reconciler::new(store.clone(), provider.clone());
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.failed, 1);

    let stored = store.get_request("id-2").await.unwrap().unwrap();
    assert_eq!(stored.status, VerificationStatus::Failed);
    assert!(stored.result.is_none());
    assert_eq!(provider.document_fetch_count("token-id-2"), 0);
}

#[tokio::test]
async fn test_provider_expired_identity_check_is_marked_expired() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    let request = pending_request("id-3", VerificationKind::IdentityDocument);
    store.insert_request(&request).await.unwrap();

    provider.set_identity_status("token-id-3", IdentityLookupStatus::Expired);

    let mut reconciler = Reconciler::new(store.clone(), provider);
    reconciler.reconcile_pending().await.unwrap();

    let stored = store.get_request("id-3").await.unwrap().unwrap();
    assert_eq!(stored.status, VerificationStatus::Expired);
}

#[tokio::test]
async fn test_successful_bank_check_flips_merchant_flag() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    let request = pending_request("bank-1", VerificationKind::BankAccount);
    store.insert_request(&request).await.unwrap();

    provider.set_bank_lookup(
        "token-bank-1",
        BankLookupStatus::Success,
        serde_json::json!({"status": "success", "beneficiary_name": "Acme Traders"}),
    );

    let mut reconciler = Reconciler::new(store.clone(), provider);
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.completed, 1);

    let stored = store.get_request("bank-1").await.unwrap().unwrap();
    assert_eq!(stored.status, VerificationStatus::Completed);
    assert_eq!(stored.result.unwrap()["beneficiary_name"], "Acme Traders");

    let merchant = store.get_merchant("merchant-bank-1").await.unwrap().unwrap();
    assert!(merchant.bank_account_verified);
    assert!(merchant.bank_account_verified_at.is_some());
}

#[tokio::test]
async fn test_failed_bank_check_keeps_merchant_unverified() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    let request = pending_request("bank-2", VerificationKind::BankAccount);
    store.insert_request(&request).await.unwrap();

    provider.set_bank_lookup(
        "token-bank-2",
        BankLookupStatus::Failed,
        serde_json::json!({"status": "failed", "reason": "name mismatch"}),
    );

    let mut reconciler = Reconciler::new(store.clone(), provider);
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.failed, 1);

    let stored = store.get_request("bank-2").await.unwrap().unwrap();
    assert_eq!(stored.status, VerificationStatus::Failed);
    assert_eq!(stored.result.unwrap()["reason"], "name mismatch");

    assert!(store.get_merchant("merchant-bank-2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_still_pending_records_are_left_untouched() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    // Unscripted tokens answer pending
    let request = pending_request("bank-3", VerificationKind::BankAccount);
    store.insert_request(&request).await.unwrap();

    let mut reconciler = Reconciler::new(store.clone(), provider.clone());
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.still_pending, 1);

    let stored = store.get_request("bank-3").await.unwrap().unwrap();
    assert_eq!(stored.status, VerificationStatus::Pending);
    assert!(stored.completed_at.is_none());

    // Still pending, so the next sweep polls it again
    reconciler.reconcile_pending().await.unwrap();
    assert_eq!(provider.lookup_count("token-bank-3"), 2);
}

#[tokio::test]
async fn test_lapsed_identity_record_is_excluded_from_batch() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    let mut lapsed = pending_request("id-lapsed", VerificationKind::IdentityDocument);
    lapsed.expires_at = Some(Utc::now() - Duration::minutes(10));
    store.insert_request(&lapsed).await.unwrap();

    let live = pending_request("id-live", VerificationKind::IdentityDocument);
    store.insert_request(&live).await.unwrap();

    let mut reconciler = Reconciler::new(store.clone(), provider.clone());
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.polled, 1);
    assert_eq!(provider.lookup_count("token-id-lapsed"), 0);
    assert_eq!(provider.lookup_count("token-id-live"), 1);
}

#[tokio::test]
async fn test_one_bad_record_does_not_abort_the_batch() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    for i in 1..=3 {
        let request = pending_request(&format!("bank-{}", i), VerificationKind::BankAccount);
        store.insert_request(&request).await.unwrap();
    }

    provider.set_bank_lookup(
        "token-bank-1",
        BankLookupStatus::Success,
        serde_json::json!({"status": "success"}),
    );
    provider.fail_lookups("token-bank-2");
    provider.set_bank_lookup(
        "token-bank-3",
        BankLookupStatus::Success,
        serde_json::json!({"status": "success"}),
    );

    let mut reconciler = Reconciler::new(store.clone(), provider);
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.polled, 3);
    assert_eq!(report.completed, 2);
    assert_eq!(report.errors, 1);

    let first = store.get_request("bank-1").await.unwrap().unwrap();
    assert_eq!(first.status, VerificationStatus::Completed);

    // The failing record stays pending and gets retried next sweep
    let second = store.get_request("bank-2").await.unwrap().unwrap();
    assert_eq!(second.status, VerificationStatus::Pending);

    let third = store.get_request("bank-3").await.unwrap().unwrap();
    assert_eq!(third.status, VerificationStatus::Completed);
}

#[tokio::test]
async fn test_batch_per_kind_never_exceeds_the_cap() {
    let mut store = MemoryStore::new();
    let provider = MockProvider::new();

    for i in 0..60 {
        let identity =
            pending_request(&format!("id-{:02}", i), VerificationKind::IdentityDocument);
        store.insert_request(&identity).await.unwrap();

        let bank = pending_request(&format!("bank-{:02}", i), VerificationKind::BankAccount);
        store.insert_request(&bank).await.unwrap();
    }

    let mut reconciler = Reconciler::new(store, provider.clone());
    let report = reconciler.reconcile_pending().await.unwrap();

    assert_eq!(report.polled, 2 * PENDING_BATCH_LIMIT);
    assert_eq!(provider.total_lookups(), 2 * PENDING_BATCH_LIMIT);
}
