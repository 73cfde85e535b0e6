//! Clients for the external verification provider

use async_trait::async_trait;
use kyc_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Status reported by the provider for an identity-document request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityLookupStatus {
    Pending,
    Completed,
    Failed,
    Expired,
}

/// Status reported by the provider for a bank-account request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankLookupStatus {
    Pending,
    Success,
    Failed,
}

/// Result of a bank-account status lookup
///
/// `payload` is the provider's full response body; it is persisted on the
/// request whether the check succeeded or failed.
#[derive(Debug, Clone)]
pub struct BankLookup {
    pub status: BankLookupStatus,
    pub payload: serde_json::Value,
}

/// Status-lookup interface against the external verification provider
#[async_trait]
pub trait VerificationProvider {
    /// Current status of an identity-document request
    async fn identity_status(&self, token: &str) -> Result<IdentityLookupStatus>;

    /// Document payload for a completed identity-document request
    async fn identity_result(&self, token: &str) -> Result<serde_json::Value>;

    /// Current status of a bank-account request
    async fn bank_status(&self, token: &str) -> Result<BankLookup>;
}

/// HTTP client for the verification provider
pub struct HttpProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IdentityStatusResponse {
    status: IdentityLookupStatus,
}

impl HttpProvider {
    /// Create a new provider client
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "Provider returned {} for {}",
                response.status(),
                url
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl VerificationProvider for HttpProvider {
    async fn identity_status(&self, token: &str) -> Result<IdentityLookupStatus> {
        let url = format!("{}/v1/identity/requests/{}/status", self.base_url, token);
        debug!("Looking up identity status: {}", url);

        let response: IdentityStatusResponse = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Invalid identity status response: {}", e)))?;

        Ok(response.status)
    }

    async fn identity_result(&self, token: &str) -> Result<serde_json::Value> {
        let url = format!("{}/v1/identity/requests/{}/documents", self.base_url, token);
        debug!("Fetching identity documents: {}", url);

        self.get(&url)
            .await?
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Invalid identity result response: {}", e)))
    }

    async fn bank_status(&self, token: &str) -> Result<BankLookup> {
        let url = format!("{}/v1/bank/verifications/{}", self.base_url, token);
        debug!("Looking up bank verification status: {}", url);

        let payload: serde_json::Value = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Invalid bank status response: {}", e)))?;

        let status = payload
            .get("status")
            .cloned()
            .ok_or_else(|| Error::Provider("Bank status response missing status".to_string()))?;
        let status: BankLookupStatus = serde_json::from_value(status)
            .map_err(|e| Error::Provider(format!("Unknown bank status: {}", e)))?;

        Ok(BankLookup { status, payload })
    }
}

/// Scriptable in-process provider used in mock mode and by tests
///
/// Unscripted tokens answer `pending`. Status lookups and document fetches
/// are counted per token so tests can assert which records were actually
/// polled. Clones share scripts and counters.
#[derive(Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    identity_statuses: HashMap<String, IdentityLookupStatus>,
    identity_documents: HashMap<String, serde_json::Value>,
    bank_lookups: HashMap<String, (BankLookupStatus, serde_json::Value)>,
    failing_tokens: HashSet<String>,
    status_lookups: HashMap<String, usize>,
    document_fetches: HashMap<String, usize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status answered for an identity token
    pub fn set_identity_status(&self, token: &str, status: IdentityLookupStatus) {
        self.inner
            .lock()
            .unwrap()
            .identity_statuses
            .insert(token.to_string(), status);
    }

    /// Script the document payload answered for an identity token
    pub fn set_identity_documents(&self, token: &str, documents: serde_json::Value) {
        self.inner
            .lock()
            .unwrap()
            .identity_documents
            .insert(token.to_string(), documents);
    }

    /// Script the lookup answered for a bank token
    pub fn set_bank_lookup(
        &self,
        token: &str,
        status: BankLookupStatus,
        payload: serde_json::Value,
    ) {
        self.inner
            .lock()
            .unwrap()
            .bank_lookups
            .insert(token.to_string(), (status, payload));
    }

    /// Make every call for a token return an error
    pub fn fail_lookups(&self, token: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_tokens
            .insert(token.to_string());
    }

    /// How many status lookups were issued for a token
    pub fn lookup_count(&self, token: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .status_lookups
            .get(token)
            .copied()
            .unwrap_or(0)
    }

    /// How many document fetches were issued for a token
    pub fn document_fetch_count(&self, token: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .document_fetches
            .get(token)
            .copied()
            .unwrap_or(0)
    }

    /// Total status lookups issued across all tokens
    pub fn total_lookups(&self) -> usize {
        self.inner.lock().unwrap().status_lookups.values().sum()
    }
}

#[async_trait]
impl VerificationProvider for MockProvider {
    async fn identity_status(&self, token: &str) -> Result<IdentityLookupStatus> {
        let mut inner = self.inner.lock().unwrap();
        *inner.status_lookups.entry(token.to_string()).or_insert(0) += 1;

        if inner.failing_tokens.contains(token) {
            return Err(Error::Provider(format!(
                "Scripted provider failure for {}",
                token
            )));
        }

        Ok(inner
            .identity_statuses
            .get(token)
            .copied()
            .unwrap_or(IdentityLookupStatus::Pending))
    }

    async fn identity_result(&self, token: &str) -> Result<serde_json::Value> {
        let mut inner = self.inner.lock().unwrap();
        *inner.document_fetches.entry(token.to_string()).or_insert(0) += 1;

        if inner.failing_tokens.contains(token) {
            return Err(Error::Provider(format!(
                "Scripted provider failure for {}",
                token
            )));
        }

        Ok(inner
            .identity_documents
            .get(token)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }

    async fn bank_status(&self, token: &str) -> Result<BankLookup> {
        let mut inner = self.inner.lock().unwrap();
        *inner.status_lookups.entry(token.to_string()).or_insert(0) += 1;

        if inner.failing_tokens.contains(token) {
            return Err(Error::Provider(format!(
                "Scripted provider failure for {}",
                token
            )));
        }

        let lookup = inner
            .bank_lookups
            .get(token)
            .cloned()
            .unwrap_or((BankLookupStatus::Pending, serde_json::json!({})));
        Ok(BankLookup {
            status: lookup.0,
            payload: lookup.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_defaults_to_pending() {
        let provider = MockProvider::new();

        let status = provider.identity_status("unknown").await.unwrap();
        assert_eq!(status, IdentityLookupStatus::Pending);

        let lookup = provider.bank_status("unknown").await.unwrap();
        assert_eq!(lookup.status, BankLookupStatus::Pending);
    }

    #[tokio::test]
    async fn test_mock_provider_scripted_statuses() {
        let provider = MockProvider::new();
        provider.set_identity_status("tok-1", IdentityLookupStatus::Completed);
        provider.set_bank_lookup(
            "tok-2",
            BankLookupStatus::Success,
            serde_json::json!({"status": "success", "beneficiary_name": "Acme"}),
        );

        assert_eq!(
            provider.identity_status("tok-1").await.unwrap(),
            IdentityLookupStatus::Completed
        );

        let lookup = provider.bank_status("tok-2").await.unwrap();
        assert_eq!(lookup.status, BankLookupStatus::Success);
        assert_eq!(lookup.payload["beneficiary_name"], "Acme");
    }

    #[tokio::test]
    async fn test_mock_provider_counts_lookups() {
        let provider = MockProvider::new();

        provider.identity_status("tok-1").await.unwrap();
        provider.identity_status("tok-1").await.unwrap();
        provider.bank_status("tok-2").await.unwrap();

        assert_eq!(provider.lookup_count("tok-1"), 2);
        assert_eq!(provider.lookup_count("tok-2"), 1);
        assert_eq!(provider.total_lookups(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_scripted_failure() {
        let provider = MockProvider::new();
        provider.fail_lookups("tok-bad");

        assert!(provider.identity_status("tok-bad").await.is_err());
        // The failed lookup still counts as an issued call
        assert_eq!(provider.lookup_count("tok-bad"), 1);
    }

    #[test]
    fn test_bank_status_deserializes_snake_case() {
        let status: BankLookupStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(status, BankLookupStatus::Success);
    }
}
