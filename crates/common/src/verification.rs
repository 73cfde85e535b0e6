//! Verification request model shared between the API and the reconciler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of KYC check performed for a merchant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    /// Identity document check via a digital-locker provider
    IdentityDocument,
    /// Bank account ownership check
    BankAccount,
}

impl VerificationKind {
    /// All kinds the reconciler sweeps, in sweep order
    pub const ALL: [VerificationKind; 2] =
        [VerificationKind::IdentityDocument, VerificationKind::BankAccount];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::IdentityDocument => "identity_document",
            VerificationKind::BankAccount => "bank_account",
        }
    }
}

impl std::fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification request status
///
/// Transitions are monotonic: a record leaves `Pending` exactly once and
/// every non-pending status is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Waiting on the provider; the only status the reconciler polls
    Pending,
    /// Provider confirmed the check passed
    Completed,
    /// Provider reported the check failed
    Failed,
    /// The provider request lapsed before the merchant finished it
    Expired,
}

impl VerificationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationStatus::Pending)
    }
}

/// A KYC verification request tracked against an external provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Unique request identifier
    pub id: String,

    /// Owning merchant
    pub merchant_id: String,

    /// Which check this request performs
    pub kind: VerificationKind,

    /// Request token assigned by the external provider
    pub provider_token: String,

    /// Current status
    pub status: VerificationStatus,

    /// When the provider request lapses (identity-document checks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Result payload returned by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// When the request was created
    pub created_at: DateTime<Utc>,

    /// When the request reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VerificationRequest {
    /// Create a new pending request
    pub fn new(
        id: String,
        merchant_id: String,
        kind: VerificationKind,
        provider_token: String,
    ) -> Self {
        Self {
            id,
            merchant_id,
            kind,
            provider_token,
            status: VerificationStatus::Pending,
            expires_at: None,
            result: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the reconciler should poll this record at `now`
    ///
    /// Terminal records are never polled; identity-document records past
    /// their expiry window are skipped.
    pub fn is_pollable(&self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match (self.kind, self.expires_at) {
            (VerificationKind::IdentityDocument, Some(expires_at)) => expires_at > now,
            _ => true,
        }
    }

    /// Mark the request as completed with the provider's result payload
    pub fn mark_completed(&mut self, result: serde_json::Value) {
        self.status = VerificationStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
    }

    /// Mark the request as failed
    pub fn mark_failed(&mut self, result: Option<serde_json::Value>) {
        self.status = VerificationStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.result = result;
    }

    /// Mark the request as expired
    pub fn mark_expired(&mut self) {
        self.status = VerificationStatus::Expired;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(kind: VerificationKind) -> VerificationRequest {
        VerificationRequest::new(
            "req-1".to_string(),
            "merchant-1".to_string(),
            kind,
            "token-1".to_string(),
        )
    }

    #[test]
    fn test_pending_is_the_only_non_terminal_status() {
        assert!(!VerificationStatus::Pending.is_terminal());
        assert!(VerificationStatus::Completed.is_terminal());
        assert!(VerificationStatus::Failed.is_terminal());
        assert!(VerificationStatus::Expired.is_terminal());
    }

    #[test]
    fn test_mark_completed_stores_payload_and_timestamp() {
        let mut req = request(VerificationKind::IdentityDocument);
        req.mark_completed(serde_json::json!({"documents": ["aadhaar"]}));

        assert_eq!(req.status, VerificationStatus::Completed);
        assert!(req.completed_at.is_some());
        assert!(req.result.is_some());
    }

    #[test]
    fn test_mark_failed_without_payload() {
        let mut req = request(VerificationKind::IdentityDocument);
        req.mark_failed(None);

        assert_eq!(req.status, VerificationStatus::Failed);
        assert!(req.completed_at.is_some());
        assert!(req.result.is_none());
    }

    #[test]
    fn test_terminal_record_is_not_pollable() {
        let mut req = request(VerificationKind::BankAccount);
        req.mark_completed(serde_json::json!({"status": "success"}));

        assert!(!req.is_pollable(Utc::now()));
    }

    #[test]
    fn test_expired_identity_record_is_not_pollable() {
        let mut req = request(VerificationKind::IdentityDocument);
        req.expires_at = Some(Utc::now() - Duration::minutes(5));

        assert!(!req.is_pollable(Utc::now()));
    }

    #[test]
    fn test_identity_record_within_expiry_is_pollable() {
        let mut req = request(VerificationKind::IdentityDocument);
        req.expires_at = Some(Utc::now() + Duration::hours(1));

        assert!(req.is_pollable(Utc::now()));
    }

    #[test]
    fn test_bank_records_ignore_expiry() {
        // Bank verifications carry no provider-side expiry window
        let mut req = request(VerificationKind::BankAccount);
        req.expires_at = Some(Utc::now() - Duration::minutes(5));

        assert!(req.is_pollable(Utc::now()));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&VerificationKind::IdentityDocument).unwrap();
        assert_eq!(json, "\"identity_document\"");
    }
}
