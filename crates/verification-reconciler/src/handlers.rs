//! API handlers for the verification reconciler

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use kyc_common::VerificationKind;

use crate::models::{
    CreateVerificationRequest, CreateVerificationResponse, VerificationStatusResponse,
};
use crate::storage::VerificationStore;

/// Shared application state
pub struct AppState {
    pub storage: Mutex<Box<dyn VerificationStore + Send>>,
}

impl AppState {
    pub fn new<S: VerificationStore + Send + 'static>(storage: S) -> Self {
        Self {
            storage: Mutex::new(Box::new(storage)),
        }
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<kyc_common::Error> for ApiError {
    fn from(err: kyc_common::Error) -> Self {
        let status = match &err {
            kyc_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "verification-reconciler"
    }))
}

/// Open a new pending verification request
pub async fn create_verification_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateVerificationRequest>,
) -> Result<Json<CreateVerificationResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    let mut request = kyc_common::VerificationRequest::new(
        request_id.clone(),
        payload.merchant_id.clone(),
        payload.kind,
        payload.provider_token,
    );
    request.expires_at = payload.expires_at;

    let mut storage = state.storage.lock().await;
    storage.insert_request(&request).await?;

    info!(
        "Opened {} verification {} for merchant {}",
        payload.kind, request_id, payload.merchant_id
    );

    Ok(Json(CreateVerificationResponse {
        success: true,
        request_id: Some(request_id),
    }))
}

/// Get a verification request's current state
pub async fn get_verification_handler(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<VerificationStatusResponse>, ApiError> {
    let mut storage = state.storage.lock().await;
    let request = storage.get_request(&request_id).await?;

    match request {
        Some(request) => Ok(Json(VerificationStatusResponse { request })),
        None => Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("Verification request not found: {}", request_id),
        }),
    }
}

/// All verification requests for a merchant, with the merchant's flag
pub async fn get_merchant_verifications_handler(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut storage = state.storage.lock().await;
    let requests = storage.merchant_requests(&merchant_id).await?;
    let merchant = storage.get_merchant(&merchant_id).await?;

    Ok(Json(serde_json::json!({
        "merchant_id": merchant_id,
        "bank_account_verified": merchant.map(|m| m.bank_account_verified).unwrap_or(false),
        "total": requests.len(),
        "verifications": requests,
    })))
}

/// Pending counts per verification kind
pub async fn get_stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut storage = state.storage.lock().await;
    let identity_pending = storage
        .pending_count(VerificationKind::IdentityDocument)
        .await?;
    let bank_pending = storage.pending_count(VerificationKind::BankAccount).await?;

    Ok(Json(serde_json::json!({
        "service": "verification-reconciler",
        "pending": {
            "identity_document": identity_pending,
            "bank_account": bank_pending,
        }
    })))
}
