//! Verification store backends
//!
//! Redis data model:
//! - kyc:request:{id} → JSON-encoded VerificationRequest
//! - kyc:pending:{kind} → Set of pending request ids for that kind
//! - kyc:merchant:{merchant_id}:requests → Set of the merchant's request ids
//! - kyc:merchant:{merchant_id} → JSON-encoded Merchant

use async_trait::async_trait;
use chrono::Utc;
use kyc_common::{Error, Merchant, Result, VerificationKind, VerificationRequest};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Storage backend for verification requests and merchant flags
///
/// The reconciler and the API handlers receive a store as an injected
/// dependency; nothing in the crate reaches for a shared singleton.
#[async_trait]
pub trait VerificationStore {
    /// Store a new request and index it
    async fn insert_request(&mut self, request: &VerificationRequest) -> Result<()>;

    /// Get a request by id
    async fn get_request(&mut self, id: &str) -> Result<Option<VerificationRequest>>;

    /// Fetch a bounded batch of pollable pending requests for a kind
    ///
    /// Identity-document records past their expiry window are excluded.
    async fn pending_requests(
        &mut self,
        kind: VerificationKind,
        limit: usize,
    ) -> Result<Vec<VerificationRequest>>;

    /// Persist an updated request; terminal records leave the pending index
    async fn update_request(&mut self, request: &VerificationRequest) -> Result<()>;

    /// Number of requests currently in the pending index for a kind
    async fn pending_count(&mut self, kind: VerificationKind) -> Result<usize>;

    /// All requests for a merchant, newest first
    async fn merchant_requests(&mut self, merchant_id: &str)
        -> Result<Vec<VerificationRequest>>;

    /// Get a merchant record by id
    async fn get_merchant(&mut self, merchant_id: &str) -> Result<Option<Merchant>>;

    /// Flip the merchant's bank-account-verified flag, stamping the time
    async fn set_merchant_bank_verified(&mut self, merchant_id: &str) -> Result<()>;
}

fn request_key(id: &str) -> String {
    format!("kyc:request:{}", id)
}

fn pending_key(kind: VerificationKind) -> String {
    format!("kyc:pending:{}", kind)
}

fn merchant_key(merchant_id: &str) -> String {
    format!("kyc:merchant:{}", merchant_id)
}

fn merchant_requests_key(merchant_id: &str) -> String {
    format!("kyc:merchant:{}:requests", merchant_id)
}

fn redis_err(e: redis::RedisError) -> Error {
    Error::Redis(e.to_string())
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(redis_err)?;

        let conn = ConnectionManager::new(client).await.map_err(redis_err)?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }
}

#[async_trait]
impl VerificationStore for RedisStore {
    async fn insert_request(&mut self, request: &VerificationRequest) -> Result<()> {
        let json = serde_json::to_string(request)?;

        let _: () = self
            .conn
            .set(request_key(&request.id), &json)
            .await
            .map_err(redis_err)?;

        if !request.status.is_terminal() {
            let _: () = self
                .conn
                .sadd(pending_key(request.kind), &request.id)
                .await
                .map_err(redis_err)?;
        }

        let _: () = self
            .conn
            .sadd(merchant_requests_key(&request.merchant_id), &request.id)
            .await
            .map_err(redis_err)?;

        info!(
            "Stored verification request {} ({}) for merchant {}",
            request.id, request.kind, request.merchant_id
        );
        Ok(())
    }

    async fn get_request(&mut self, id: &str) -> Result<Option<VerificationRequest>> {
        let json: Option<String> = self.conn.get(request_key(id)).await.map_err(redis_err)?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn pending_requests(
        &mut self,
        kind: VerificationKind,
        limit: usize,
    ) -> Result<Vec<VerificationRequest>> {
        let ids: Vec<String> = self
            .conn
            .smembers(pending_key(kind))
            .await
            .map_err(redis_err)?;

        let now = Utc::now();
        let mut batch = Vec::new();
        for id in ids {
            if batch.len() >= limit {
                break;
            }
            match self.get_request(&id).await? {
                Some(request) if request.is_pollable(now) => batch.push(request),
                Some(_) => debug!("Skipping non-pollable request {} in pending index", id),
                None => debug!("Pending index references missing request {}", id),
            }
        }

        Ok(batch)
    }

    async fn update_request(&mut self, request: &VerificationRequest) -> Result<()> {
        let json = serde_json::to_string(request)?;

        let _: () = self
            .conn
            .set(request_key(&request.id), json)
            .await
            .map_err(redis_err)?;

        if request.status.is_terminal() {
            let _: () = self
                .conn
                .srem(pending_key(request.kind), &request.id)
                .await
                .map_err(redis_err)?;
        }

        debug!(
            "Updated request {} status: {:?}",
            request.id, request.status
        );
        Ok(())
    }

    async fn pending_count(&mut self, kind: VerificationKind) -> Result<usize> {
        let count: usize = self
            .conn
            .scard(pending_key(kind))
            .await
            .map_err(redis_err)?;
        Ok(count)
    }

    async fn merchant_requests(
        &mut self,
        merchant_id: &str,
    ) -> Result<Vec<VerificationRequest>> {
        let ids: Vec<String> = self
            .conn
            .smembers(merchant_requests_key(merchant_id))
            .await
            .map_err(redis_err)?;

        let mut requests = Vec::new();
        for id in ids {
            if let Some(request) = self.get_request(&id).await? {
                requests.push(request);
            }
        }

        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(requests)
    }

    async fn get_merchant(&mut self, merchant_id: &str) -> Result<Option<Merchant>> {
        let json: Option<String> = self
            .conn
            .get(merchant_key(merchant_id))
            .await
            .map_err(redis_err)?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn set_merchant_bank_verified(&mut self, merchant_id: &str) -> Result<()> {
        let mut merchant = self
            .get_merchant(merchant_id)
            .await?
            .unwrap_or_else(|| Merchant::new(merchant_id.to_string()));

        merchant.mark_bank_verified();

        let json = serde_json::to_string(&merchant)?;
        let _: () = self
            .conn
            .set(merchant_key(merchant_id), json)
            .await
            .map_err(redis_err)?;

        info!("Marked merchant {} bank-account verified", merchant_id);
        Ok(())
    }
}

/// In-process store used in mock mode and by tests
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    requests: HashMap<String, VerificationRequest>,
    merchants: HashMap<String, Merchant>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn insert_request(&mut self, request: &VerificationRequest) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get_request(&mut self, id: &str) -> Result<Option<VerificationRequest>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.requests.get(id).cloned())
    }

    async fn pending_requests(
        &mut self,
        kind: VerificationKind,
        limit: usize,
    ) -> Result<Vec<VerificationRequest>> {
        let inner = self.inner.lock().unwrap();
        let now = Utc::now();

        let mut batch: Vec<VerificationRequest> = inner
            .requests
            .values()
            .filter(|r| r.kind == kind && r.is_pollable(now))
            .cloned()
            .collect();

        batch.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        batch.truncate(limit);

        Ok(batch)
    }

    async fn update_request(&mut self, request: &VerificationRequest) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn pending_count(&mut self, kind: VerificationKind) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .requests
            .values()
            .filter(|r| r.kind == kind && !r.status.is_terminal())
            .count())
    }

    async fn merchant_requests(
        &mut self,
        merchant_id: &str,
    ) -> Result<Vec<VerificationRequest>> {
        let inner = self.inner.lock().unwrap();

        let mut requests: Vec<VerificationRequest> = inner
            .requests
            .values()
            .filter(|r| r.merchant_id == merchant_id)
            .cloned()
            .collect();

        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(requests)
    }

    async fn get_merchant(&mut self, merchant_id: &str) -> Result<Option<Merchant>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.merchants.get(merchant_id).cloned())
    }

    async fn set_merchant_bank_verified(&mut self, merchant_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let merchant = inner
            .merchants
            .entry(merchant_id.to_string())
            .or_insert_with(|| Merchant::new(merchant_id.to_string()));
        merchant.mark_bank_verified();
        Ok(())
    }
}
