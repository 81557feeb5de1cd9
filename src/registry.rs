//! Tax-ID registry collaborator
//!
//! Confirms an EIN against an external registry. The engine never depends
//! on this service being reachable; callers degrade a failed lookup to an
//! unverified warning finding.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;
use tracing::info;

use crate::error::{AuditError, Result};

/// Outcome of one registry lookup
#[derive(Debug, Clone)]
pub struct RegistryVerdict {
    pub confirmed: bool,
    pub confidence: f64,
    pub note: String,
}

/// Trait for EIN verification backends
#[async_trait]
pub trait EinRegistry: Send + Sync {
    async fn lookup(&self, ein: &str) -> Result<RegistryVerdict>;
}

/// Default backend when no registry service is configured; every EIN
/// comes back unverified at low confidence.
pub struct OfflineRegistry;

#[async_trait]
impl EinRegistry for OfflineRegistry {
    async fn lookup(&self, _ein: &str) -> Result<RegistryVerdict> {
        Ok(RegistryVerdict {
            confirmed: false,
            confidence: 0.2,
            note: "IRS verification unavailable in current environment.".to_string(),
        })
    }
}

/// HTTP-backed registry client (connection-pooled)
pub struct HttpEinRegistry {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    confirmed: bool,
    confidence: f64,
    #[serde(default)]
    note: Option<String>,
}

impl HttpEinRegistry {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from `EIN_REGISTRY_BASE_URL` when configured
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("EIN_REGISTRY_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self::new(base_url))
    }
}

#[async_trait]
impl EinRegistry for HttpEinRegistry {
    async fn lookup(&self, ein: &str) -> Result<RegistryVerdict> {
        let url = format!("{}/v1/ein/verify", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "ein": ein }))
            .send()
            .await
            .map_err(|e| AuditError::Registry(format!("registry request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::Registry(format!(
                "registry returned {} for EIN lookup",
                status
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| AuditError::Registry(format!("invalid registry response: {}", e)))?;

        info!(confirmed = body.confirmed, "EIN registry lookup completed");

        Ok(RegistryVerdict {
            confirmed: body.confirmed,
            confidence: body.confidence.clamp(0.0, 1.0),
            note: body.note.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_registry_is_always_unverified() {
        let verdict = OfflineRegistry.lookup("84-2674654").await.unwrap();
        assert!(!verdict.confirmed);
        assert_eq!(verdict.confidence, 0.2);
        assert!(verdict.note.contains("unavailable"));
    }

    #[test]
    fn test_http_registry_trims_trailing_slash() {
        let registry = HttpEinRegistry::new("https://registry.example.org/".to_string());
        assert_eq!(registry.base_url, "https://registry.example.org");
    }
}
