//! API request/response shapes

use chrono::{DateTime, Utc};
use kyc_common::{VerificationKind, VerificationRequest};
use serde::{Deserialize, Serialize};

/// Request to open a new verification
#[derive(Debug, Deserialize)]
pub struct CreateVerificationRequest {
    /// Owning merchant
    pub merchant_id: String,

    /// Which check to track
    pub kind: VerificationKind,

    /// Request token assigned by the external provider
    pub provider_token: String,

    /// Expiry of the provider request (identity-document checks)
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response from opening a verification
#[derive(Debug, Serialize)]
pub struct CreateVerificationResponse {
    pub success: bool,

    /// Request ID for tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Response with a verification request's current state
#[derive(Debug, Serialize)]
pub struct VerificationStatusResponse {
    pub request: VerificationRequest,
}
