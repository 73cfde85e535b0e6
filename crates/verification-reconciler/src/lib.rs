//! Verification Reconciler
//!
//! Background reconciliation of merchant KYC verification requests
//! (identity-document and bank-account checks) against an external
//! provider, plus a thin status API.

pub mod config;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod reconciler;
pub mod storage;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;
pub use provider::{HttpProvider, MockProvider, VerificationProvider};
pub use reconciler::{ReconcileReport, Reconciler, PENDING_BATCH_LIMIT};
pub use storage::{MemoryStore, RedisStore, VerificationStore};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/stats", get(handlers::get_stats_handler))
        .route("/api/verifications", post(handlers::create_verification_handler))
        .route(
            "/api/verifications/{request_id}",
            get(handlers::get_verification_handler),
        )
        .route(
            "/api/merchants/{merchant_id}/verifications",
            get(handlers::get_merchant_verifications_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
