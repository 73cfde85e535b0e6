//! Verification Reconciler service
//!
//! Status API + background sweep reconciling pending KYC verification
//! requests against the external provider.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verification_reconciler::{
    create_router, AppState, Config, HttpProvider, MemoryStore, MockProvider, Reconciler,
    RedisStore, VerificationProvider, VerificationStore,
};

/// Periodic trigger; the reconciler itself holds no scheduling logic
async fn run_reconcile_loop<S, P>(store: S, provider: P, interval_secs: u64)
where
    S: VerificationStore,
    P: VerificationProvider,
{
    info!(
        "Starting reconcile loop (sweeping every {} seconds)",
        interval_secs
    );

    let mut reconciler = Reconciler::new(store, provider);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        if let Err(e) = reconciler.reconcile_pending().await {
            // Keep the loop alive; the next sweep retries everything
            error!("Reconcile sweep failed: {:#}", e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verification_reconciler=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    info!("Starting Verification Reconciler");
    info!("Provider URL: {}", config.provider_url);
    info!("Poll interval: {}s", config.poll_interval_secs);

    let state = if config.mock_mode {
        info!("Mock mode: using in-memory store and mock provider");

        let store = MemoryStore::new();
        let provider = MockProvider::new();

        tokio::spawn(run_reconcile_loop(
            store.clone(),
            provider,
            config.poll_interval_secs,
        ));

        AppState::new(store)
    } else {
        info!("Redis URL: {}", config.redis_url);

        let store = RedisStore::new(&config.redis_url)
            .await
            .context("Failed to initialize verification store")?;
        let provider = HttpProvider::new(
            config.provider_url.clone(),
            config.provider_api_key.clone(),
        );

        tokio::spawn(run_reconcile_loop(
            store.clone(),
            provider,
            config.poll_interval_secs,
        ));

        AppState::new(store)
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Verification Reconciler API running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
