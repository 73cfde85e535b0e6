//! Verification status reconciler
//!
//! Sweeps pending verification requests and reconciles them against the
//! external provider's source of truth. Holds no scheduling logic of its
//! own; callers invoke `reconcile_pending` from whatever trigger they run
//! (the service binary uses a tokio interval).

use kyc_common::{Result, VerificationKind, VerificationRequest};
use tracing::{debug, error, info};

use crate::provider::{BankLookupStatus, IdentityLookupStatus, VerificationProvider};
use crate::storage::VerificationStore;

/// Upper bound on records polled per kind in one sweep
pub const PENDING_BATCH_LIMIT: usize = 50;

/// Outcome of reconciling a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Completed,
    Failed,
    Expired,
    StillPending,
}

/// Counters for one reconciliation sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records polled against the provider
    pub polled: usize,
    /// Records that reached completed
    pub completed: usize,
    /// Records that reached failed
    pub failed: usize,
    /// Records that reached expired
    pub expired: usize,
    /// Records the provider still reports as pending
    pub still_pending: usize,
    /// Records whose provider call or store write errored; they stay
    /// pending and are retried next sweep
    pub errors: usize,
}

impl ReconcileReport {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Completed => self.completed += 1,
            RecordOutcome::Failed => self.failed += 1,
            RecordOutcome::Expired => self.expired += 1,
            RecordOutcome::StillPending => self.still_pending += 1,
        }
    }
}

/// Reconciles locally stored pending requests against the provider
///
/// Constructed per invocation site with the store and provider injected;
/// there is no module-level worker instance.
pub struct Reconciler<S, P> {
    store: S,
    provider: P,
}

impl<S, P> Reconciler<S, P>
where
    S: VerificationStore,
    P: VerificationProvider,
{
    pub fn new(store: S, provider: P) -> Self {
        Self { store, provider }
    }

    /// Run one reconciliation sweep over both verification kinds
    ///
    /// Errors on a single record are logged and contained; the record is
    /// left pending for the next sweep. There is no retry counter and no
    /// backoff. Records are processed one at a time, and each write stands
    /// alone: a sweep that dies partway leaves every already-written record
    /// correct.
    pub async fn reconcile_pending(&mut self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for kind in VerificationKind::ALL {
            let batch = match self.store.pending_requests(kind, PENDING_BATCH_LIMIT).await {
                Ok(batch) => batch,
                Err(e) => {
                    // A broken index for one kind must not starve the other
                    error!("Failed to fetch pending {} batch: {}", kind, e);
                    report.errors += 1;
                    continue;
                }
            };

            debug!("Fetched {} pending {} request(s)", batch.len(), kind);

            for request in batch {
                report.polled += 1;
                let request_id = request.id.clone();

                let result = match kind {
                    VerificationKind::IdentityDocument => {
                        self.reconcile_identity(request).await
                    }
                    VerificationKind::BankAccount => self.reconcile_bank(request).await,
                };

                match result {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => {
                        error!(
                            "Failed to reconcile {} request {}: {}",
                            kind, request_id, e
                        );
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            "Reconcile sweep: {} polled, {} completed, {} failed, {} expired, {} still pending, {} errors",
            report.polled,
            report.completed,
            report.failed,
            report.expired,
            report.still_pending,
            report.errors
        );

        Ok(report)
    }

    async fn reconcile_identity(
        &mut self,
        mut request: VerificationRequest,
    ) -> Result<RecordOutcome> {
        let status = self.provider.identity_status(&request.provider_token).await?;

        match status {
            IdentityLookupStatus::Completed => {
                let documents = self.provider.identity_result(&request.provider_token).await?;
                request.mark_completed(documents);
                self.store.update_request(&request).await?;
                info!("Identity verification {} completed", request.id);
                Ok(RecordOutcome::Completed)
            }
            IdentityLookupStatus::Failed => {
                // No document fetch for a failed check
                request.mark_failed(None);
                self.store.update_request(&request).await?;
                info!("Identity verification {} failed", request.id);
                Ok(RecordOutcome::Failed)
            }
            IdentityLookupStatus::Expired => {
                request.mark_expired();
                self.store.update_request(&request).await?;
                info!("Identity verification {} expired", request.id);
                Ok(RecordOutcome::Expired)
            }
            IdentityLookupStatus::Pending => Ok(RecordOutcome::StillPending),
        }
    }

    async fn reconcile_bank(
        &mut self,
        mut request: VerificationRequest,
    ) -> Result<RecordOutcome> {
        let lookup = self.provider.bank_status(&request.provider_token).await?;

        match lookup.status {
            BankLookupStatus::Success => {
                request.mark_completed(lookup.payload);
                self.store.update_request(&request).await?;
                self.store
                    .set_merchant_bank_verified(&request.merchant_id)
                    .await?;
                info!(
                    "Bank verification {} succeeded, merchant {} marked verified",
                    request.id, request.merchant_id
                );
                Ok(RecordOutcome::Completed)
            }
            BankLookupStatus::Failed => {
                request.mark_failed(Some(lookup.payload));
                self.store.update_request(&request).await?;
                info!("Bank verification {} failed", request.id);
                Ok(RecordOutcome::Failed)
            }
            BankLookupStatus::Pending => Ok(RecordOutcome::StillPending),
        }
    }
}
