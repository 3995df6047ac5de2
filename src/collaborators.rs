// 🔌 Collaborators - contracts for the hosted services the flow talks to
//
// Every call is async and may fail on its own. The orchestrator awaits the
// ones it depends on; the subscriber beacon is detached and its failures
// only reach the log.

use crate::pricing::Tier;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

// ============================================================================
// REPORT CREATION
// ============================================================================

/// One pet's payload for the report-creation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub email: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_origin: Option<String>,
    pub time_of_origin: String,
    pub location: String,
    pub soul_archetype: String,
    pub special_trait: String,
    pub social_reaction: String,
    pub acquisition_mode: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_date_of_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_time_of_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_location: Option<String>,
}

#[async_trait]
pub trait ReportService: Send + Sync {
    /// Returns one report id per request, in request order
    async fn create_reports(&self, requests: &[ReportRequest]) -> Result<Vec<String>>;
}

// ============================================================================
// GIFT VALIDATION + REDEMPTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftValidation {
    pub valid: bool,
    pub entity_count: usize,
    pub tier_overrides: BTreeMap<usize, Tier>,
    pub portrait_indices: Vec<usize>,
    pub includes_recurring_addon: bool,
    pub amount: u64,
    pub gift_message: Option<String>,
    pub recipient_name: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait GiftValidator: Send + Sync {
    /// `code` is already trimmed and uppercased
    async fn validate(&self, code: &str) -> Result<GiftValidation>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    pub code: String,
    pub primary_report_id: String,
    pub report_ids: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub photo_urls: BTreeMap<usize, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedemptionResponse {
    pub success: bool,
    pub tier: Option<Tier>,
    pub includes_portrait: bool,
    pub error: Option<String>,
}

#[async_trait]
pub trait GiftRedeemer: Send + Sync {
    async fn redeem(&self, request: &RedemptionRequest) -> Result<RedemptionResponse>;
}

// ============================================================================
// CHECKOUT SESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub report_ids: Vec<String>,
    pub entity_count: usize,
    /// Tier of the first pet, kept for single-pet callers
    pub tier: Tier,
    pub tiers: BTreeMap<usize, Tier>,
    pub addons: BTreeMap<usize, bool>,
    pub photo_urls: BTreeMap<usize, String>,
    pub volume_discount_percent: u64,
    pub expected_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_for_friend_tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_for_friend_amount: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    pub url: String,
}

#[async_trait]
pub trait CheckoutService: Send + Sync {
    async fn create_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSessionResponse>;
}

// ============================================================================
// SUBSCRIBER BEACON (fire-and-forget)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberEvent {
    pub email: String,
    pub event: String,
    pub pet_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

#[async_trait]
pub trait SubscriberBeacon: Send + Sync {
    async fn track(&self, event: &SubscriberEvent) -> Result<()>;
}

/// Detach a beacon call; nothing awaits it and failures are only logged
pub fn spawn_beacon(beacon: Arc<dyn SubscriberBeacon>, event: SubscriberEvent) {
    tokio::spawn(async move {
        match beacon.track(&event).await {
            Ok(()) => debug!(event = %event.event, "subscriber beacon sent"),
            Err(e) => warn!(event = %event.event, error = %e, "subscriber beacon failed (ignored)"),
        }
    });
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// Scriptable stand-in for every hosted service (demo runs and tests)
#[derive(Default)]
pub struct InMemoryBackend {
    gift_codes: Mutex<HashMap<String, GiftValidation>>,
    report_calls: AtomicUsize,
    created_reports: Mutex<Vec<ReportRequest>>,
    redemptions: Mutex<Vec<RedemptionRequest>>,
    sessions: Mutex<Vec<CheckoutSessionRequest>>,
    beacons: Mutex<Vec<SubscriberEvent>>,
    failures: Mutex<Failures>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Failures {
    reports: bool,
    redemption: bool,
    checkout: bool,
    beacon: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gift_code(self, code: &str, validation: GiftValidation) -> Self {
        if let Ok(mut codes) = self.gift_codes.lock() {
            codes.insert(code.to_uppercase(), validation);
        }
        self
    }

    pub fn fail_reports(&self, fail: bool) {
        self.set_failure(|f| f.reports = fail);
    }

    pub fn fail_redemption(&self, fail: bool) {
        self.set_failure(|f| f.redemption = fail);
    }

    pub fn fail_checkout(&self, fail: bool) {
        self.set_failure(|f| f.checkout = fail);
    }

    pub fn fail_beacon(&self, fail: bool) {
        self.set_failure(|f| f.beacon = fail);
    }

    fn set_failure(&self, update: impl FnOnce(&mut Failures)) {
        if let Ok(mut failures) = self.failures.lock() {
            update(&mut failures);
        }
    }

    fn failures(&self) -> Failures {
        self.failures.lock().map(|f| *f).unwrap_or_default()
    }

    /// Number of create_reports calls, failed ones included
    pub fn report_calls(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }

    pub fn created_reports(&self) -> Vec<ReportRequest> {
        self.created_reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn redemptions(&self) -> Vec<RedemptionRequest> {
        self.redemptions.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn sessions(&self) -> Vec<CheckoutSessionRequest> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn beacons(&self) -> Vec<SubscriberEvent> {
        self.beacons.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory backend lock poisoned")
}

#[async_trait]
impl ReportService for InMemoryBackend {
    async fn create_reports(&self, requests: &[ReportRequest]) -> Result<Vec<String>> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures().reports {
            return Err(anyhow!("report service unavailable"));
        }

        let mut created = self.created_reports.lock().map_err(poisoned)?;
        created.extend(requests.iter().cloned());
        Ok(requests
            .iter()
            .map(|_| format!("rpt_{}", uuid::Uuid::new_v4().simple()))
            .collect())
    }
}

#[async_trait]
impl GiftValidator for InMemoryBackend {
    async fn validate(&self, code: &str) -> Result<GiftValidation> {
        let codes = self.gift_codes.lock().map_err(poisoned)?;
        Ok(codes.get(code).cloned().unwrap_or(GiftValidation {
            valid: false,
            error: Some("Gift code not found".to_string()),
            ..GiftValidation::default()
        }))
    }
}

#[async_trait]
impl GiftRedeemer for InMemoryBackend {
    async fn redeem(&self, request: &RedemptionRequest) -> Result<RedemptionResponse> {
        if self.failures().redemption {
            return Err(anyhow!("redemption service unavailable"));
        }

        let validation = self
            .gift_codes
            .lock()
            .map_err(poisoned)?
            .get(&request.code)
            .cloned();
        self.redemptions.lock().map_err(poisoned)?.push(request.clone());

        Ok(match validation {
            Some(v) if v.valid => RedemptionResponse {
                success: true,
                tier: v.tier_overrides.get(&0).copied(),
                includes_portrait: !v.portrait_indices.is_empty(),
                error: None,
            },
            _ => RedemptionResponse {
                success: false,
                error: Some("Gift code already used".to_string()),
                ..RedemptionResponse::default()
            },
        })
    }
}

#[async_trait]
impl CheckoutService for InMemoryBackend {
    async fn create_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSessionResponse> {
        if self.failures().checkout {
            return Err(anyhow!("checkout service unavailable"));
        }

        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        sessions.push(request.clone());
        Ok(CheckoutSessionResponse {
            url: format!("https://pay.example.com/session/{}", sessions.len()),
        })
    }
}

#[async_trait]
impl SubscriberBeacon for InMemoryBackend {
    async fn track(&self, event: &SubscriberEvent) -> Result<()> {
        if self.failures().beacon {
            return Err(anyhow!("beacon endpoint unavailable"));
        }
        self.beacons.lock().map_err(poisoned)?.push(event.clone());
        Ok(())
    }
}
