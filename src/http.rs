// 🌐 HTTP Backend - the hosted services over JSON
//
// Endpoints (relative to the configured base URL):
//   POST /reports            → { "report_ids": [...] }
//   POST /gift/validate      → GiftValidation
//   POST /gift/redeem        → RedemptionResponse
//   POST /checkout/session   → { "url": "..." }
//   POST /subscribers/track  → ignored body

use crate::collaborators::{
    CheckoutService, CheckoutSessionRequest, CheckoutSessionResponse, GiftRedeemer, GiftValidation, GiftValidator,
    RedemptionRequest, RedemptionResponse, ReportRequest, ReportService, SubscriberBeacon, SubscriberEvent,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ReportBatch<'a> {
    reports: &'a [ReportRequest],
}

#[derive(Debug, Deserialize)]
struct ReportBatchResponse {
    #[serde(default)]
    report_ids: Vec<String>,
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(concat!("pet-intake/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?;

        res.json::<R>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

#[async_trait]
impl ReportService for HttpBackend {
    async fn create_reports(&self, requests: &[ReportRequest]) -> Result<Vec<String>> {
        let response: ReportBatchResponse = self.post_json("reports", &ReportBatch { reports: requests }).await?;
        Ok(response.report_ids)
    }
}

#[async_trait]
impl GiftValidator for HttpBackend {
    async fn validate(&self, code: &str) -> Result<GiftValidation> {
        self.post_json("gift/validate", &json!({ "code": code })).await
    }
}

#[async_trait]
impl GiftRedeemer for HttpBackend {
    async fn redeem(&self, request: &RedemptionRequest) -> Result<RedemptionResponse> {
        self.post_json("gift/redeem", request).await
    }
}

#[async_trait]
impl CheckoutService for HttpBackend {
    async fn create_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSessionResponse> {
        self.post_json("checkout/session", request).await
    }
}

#[async_trait]
impl SubscriberBeacon for HttpBackend {
    async fn track(&self, event: &SubscriberEvent) -> Result<()> {
        let url = self.endpoint("subscribers/track");
        self.client
            .post(&url)
            .json(event)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let backend = HttpBackend::new("https://api.example.com/");
        assert_eq!(backend.endpoint("/reports"), "https://api.example.com/reports");
        assert_eq!(backend.endpoint("gift/redeem"), "https://api.example.com/gift/redeem");
    }

    #[test]
    fn test_report_batch_response_tolerates_missing_ids() {
        let parsed: ReportBatchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.report_ids.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let backend = HttpBackend::new("http://127.0.0.1:9");
        let err = backend.create_reports(&[]).await.unwrap_err();
        assert!(err.to_string().contains("127.0.0.1:9"));
    }
}
