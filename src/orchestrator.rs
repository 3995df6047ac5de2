// 🧾 Checkout Orchestrator - validate, create reports, then branch
//
//   1. validate every pet           (local, before any network call)
//   2. validate the contact address (local)
//   3. create reports in one batch  (one id per pet, same order)
//   4. gift code?  → redeem
//      test mode?  → bypass payment
//      otherwise   → payment session + redirect
//
// Collaborator errors stop here as CheckoutError; the caller stays on a
// recoverable step. Report ids survive a failed redemption or checkout
// call and are reused when the same pets are retried.

use crate::collaborators::{
    spawn_beacon, CheckoutService, CheckoutSessionRequest, GiftRedeemer, RedemptionRequest, ReportRequest,
    ReportService, SubscriberBeacon, SubscriberEvent,
};
use crate::config::FlowConfig;
use crate::dev;
use crate::entities::{OwnerRecord, PetRecord, UNSURE};
use crate::error::CheckoutError;
use crate::flow::IntakeFlow;
use crate::gift::GiftEntitlement;
use crate::persistence::ProgressStore;
use crate::pricing::{CheckoutSelection, PricingEngine, Tier};
use crate::steps::Topology;
use crate::validation::{is_valid_email, validate_pet_for_checkout};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ============================================================================
// REQUEST + OUTCOME
// ============================================================================

/// Everything submission needs, detached from the live flow
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub topology: Topology,
    pub pets: Vec<PetRecord>,
    pub owner: Option<OwnerRecord>,
    pub entitlement: Option<GiftEntitlement>,
    pub portrait_targets: Vec<usize>,
    pub selection: CheckoutSelection,
}

impl CheckoutRequest {
    pub fn from_flow(flow: &IntakeFlow, selection: CheckoutSelection) -> Self {
        let state = flow.state();
        CheckoutRequest {
            topology: state.topology,
            pets: state.pets.clone(),
            owner: flow.owner().cloned(),
            entitlement: state.entitlement.clone(),
            portrait_targets: state.portrait_targets.clone(),
            selection,
        }
    }
}

/// Choices carried to the success page in test mode, not re-validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevHandoff {
    pub tiers: BTreeMap<usize, Tier>,
    pub addons: BTreeMap<usize, bool>,
    pub gift_upsell: Option<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessDestination {
    pub report_ids: Vec<String>,
    pub session_id: Option<String>,
    pub gift_code: Option<String>,
    pub resolved_tier: Option<Tier>,
    pub includes_portrait: bool,
    pub recipient_name: Option<String>,
    pub handoff: Option<DevHandoff>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    GiftRedeemed(SuccessDestination),
    DevBypass(SuccessDestination),
    Redirect { url: String, report_ids: Vec<String> },
    /// A submission was already running; nothing happened
    AlreadySubmitting,
}

impl CheckoutOutcome {
    pub fn report_ids(&self) -> &[String] {
        match self {
            CheckoutOutcome::GiftRedeemed(dest) | CheckoutOutcome::DevBypass(dest) => &dest.report_ids,
            CheckoutOutcome::Redirect { report_ids, .. } => report_ids,
            CheckoutOutcome::AlreadySubmitting => &[],
        }
    }
}

// ============================================================================
// IN-FLIGHT GUARD
// ============================================================================

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
struct CachedReports {
    fingerprint: String,
    report_ids: Vec<String>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct CheckoutOrchestrator {
    reports: Arc<dyn ReportService>,
    redeemer: Arc<dyn GiftRedeemer>,
    checkout: Arc<dyn CheckoutService>,
    beacon: Arc<dyn SubscriberBeacon>,
    store: Arc<dyn ProgressStore>,
    pricing: PricingEngine,
    config: FlowConfig,
    in_flight: AtomicBool,
    cached_reports: Mutex<Option<CachedReports>>,
}

impl CheckoutOrchestrator {
    pub fn new(
        reports: Arc<dyn ReportService>,
        redeemer: Arc<dyn GiftRedeemer>,
        checkout: Arc<dyn CheckoutService>,
        beacon: Arc<dyn SubscriberBeacon>,
        store: Arc<dyn ProgressStore>,
        config: FlowConfig,
    ) -> Self {
        CheckoutOrchestrator {
            reports,
            redeemer,
            checkout,
            beacon,
            store,
            pricing: PricingEngine::new(),
            config,
            in_flight: AtomicBool::new(false),
            cached_reports: Mutex::new(None),
        }
    }

    /// One backend serving every collaborator role
    pub fn with_backend<B>(backend: Arc<B>, store: Arc<dyn ProgressStore>, config: FlowConfig) -> Self
    where
        B: ReportService + GiftRedeemer + CheckoutService + SubscriberBeacon + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend.clone(), backend, store, config)
    }

    pub fn with_pricing(mut self, pricing: PricingEngine) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit the live flow; marks it submitted on success
    pub async fn submit_flow(
        &self,
        flow: &mut IntakeFlow,
        selection: CheckoutSelection,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let outcome = self.submit(CheckoutRequest::from_flow(flow, selection)).await?;
        if outcome != CheckoutOutcome::AlreadySubmitting {
            flow.mark_submitted();
        }
        Ok(outcome)
    }

    pub async fn submit(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            info!("submission already in flight, ignoring");
            return Ok(CheckoutOutcome::AlreadySubmitting);
        };

        // Test topology only counts with the operator flag on this side too
        let test_mode = request.topology == Topology::Test;
        if test_mode && !self.config.dev_mode {
            warn!("test-mode submission rejected, dev mode is off");
            return Err(CheckoutError::DevModeDisabled);
        }

        let mut pets = request.pets;
        if test_mode {
            let filled = dev::fill_unnamed(&mut pets);
            if filled > 0 {
                info!(filled, "test mode: synthetic data for unnamed pets");
            }
        }

        // 1 + 2: local validation, nothing leaves the process on failure
        let today = Utc::now().date_naive();
        for (index, pet) in pets.iter().enumerate() {
            if let Err(errors) = validate_pet_for_checkout(pet, index, today) {
                return Err(CheckoutError::InvalidPet {
                    pet_number: index + 1,
                    errors,
                });
            }
        }
        let email = pets.first().map(|p| p.email.trim().to_string()).unwrap_or_default();
        if !is_valid_email(&email) {
            return Err(CheckoutError::InvalidEmail);
        }
        if let Some(entitlement) = &request.entitlement {
            check_portrait_photos(entitlement, &request.portrait_targets, &pets)?;
        }

        // 3: one batch, one id per pet
        let report_requests = build_report_requests(&pets, request.owner.as_ref(), &self.config.language);
        let report_ids = self.create_or_reuse_reports(&report_requests).await?;

        spawn_beacon(
            self.beacon.clone(),
            SubscriberEvent {
                email: email.clone(),
                event: "report_created".to_string(),
                pet_name: pets.first().map(|p| p.name.trim().to_string()).unwrap_or_default(),
                referral_code: self.config.referral_code.clone(),
            },
        );

        // 4: branch
        let outcome = if let Some(entitlement) = &request.entitlement {
            self.redeem_gift(entitlement, &request.portrait_targets, &pets, report_ids).await?
        } else if test_mode {
            let session_id = dev::synthetic_session_id();
            info!(session = %session_id, "test mode: payment bypassed");
            CheckoutOutcome::DevBypass(SuccessDestination {
                report_ids,
                session_id: Some(session_id),
                gift_code: None,
                resolved_tier: None,
                includes_portrait: false,
                recipient_name: None,
                handoff: Some(DevHandoff {
                    tiers: request.selection.tiers().clone(),
                    addons: request.selection.addons().clone(),
                    gift_upsell: request.selection.gift_upsell(),
                }),
            })
        } else {
            self.start_payment(&request.selection, report_ids).await?
        };

        self.finish();
        Ok(outcome)
    }

    async fn create_or_reuse_reports(&self, requests: &[ReportRequest]) -> Result<Vec<String>, CheckoutError> {
        let fingerprint = fingerprint(requests);

        if let Ok(cache) = self.cached_reports.lock() {
            if let Some(cached) = cache.as_ref().filter(|c| c.fingerprint == fingerprint) {
                info!(reports = cached.report_ids.len(), "reusing reports from previous attempt");
                return Ok(cached.report_ids.clone());
            }
        }

        info!(pets = requests.len(), "creating reports");
        let report_ids = self.reports.create_reports(requests).await.map_err(|e| {
            warn!(error = %e, "report creation failed");
            CheckoutError::ReportCreation(e.to_string())
        })?;

        if report_ids.len() != requests.len() || report_ids.iter().any(|id| id.trim().is_empty()) {
            warn!(expected = requests.len(), got = report_ids.len(), "report service returned incomplete ids");
            return Err(CheckoutError::ReportCreation("missing report identifiers".to_string()));
        }

        if let Ok(mut cache) = self.cached_reports.lock() {
            *cache = Some(CachedReports {
                fingerprint,
                report_ids: report_ids.clone(),
            });
        }
        Ok(report_ids)
    }

    async fn redeem_gift(
        &self,
        entitlement: &GiftEntitlement,
        portrait_targets: &[usize],
        pets: &[PetRecord],
        report_ids: Vec<String>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let photo_urls: BTreeMap<usize, String> = portrait_targets
            .iter()
            .filter_map(|i| pets.get(*i).and_then(|p| p.photo_url.clone()).map(|url| (*i, url)))
            .collect();

        let request = RedemptionRequest {
            code: entitlement.code.clone(),
            primary_report_id: report_ids.first().cloned().unwrap_or_default(),
            report_ids: report_ids.clone(),
            photo_urls,
        };

        info!(code = %entitlement.code, reports = report_ids.len(), "redeeming gift");
        let response = self.redeemer.redeem(&request).await.map_err(|e| {
            warn!(error = %e, "gift redemption call failed");
            CheckoutError::Redemption(e.to_string())
        })?;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "gift could not be redeemed".to_string());
            warn!(code = %entitlement.code, reason = %reason, "gift redemption rejected");
            return Err(CheckoutError::Redemption(reason));
        }

        Ok(CheckoutOutcome::GiftRedeemed(SuccessDestination {
            report_ids,
            session_id: None,
            gift_code: Some(entitlement.code.clone()),
            resolved_tier: response.tier.or_else(|| entitlement.entitled_tier(0)),
            includes_portrait: response.includes_portrait,
            recipient_name: entitlement.recipient_name.clone(),
            handoff: None,
        }))
    }

    async fn start_payment(
        &self,
        selection: &CheckoutSelection,
        report_ids: Vec<String>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let quote = self.pricing.quote(selection);
        let request = CheckoutSessionRequest {
            report_ids: report_ids.clone(),
            entity_count: selection.entity_count(),
            tier: selection.tier(0),
            tiers: selection.tiers().clone(),
            addons: selection.addons().clone(),
            photo_urls: selection.photos().iter().map(|(i, p)| (*i, p.url.clone())).collect(),
            volume_discount_percent: quote.pets.discount_percent,
            expected_total: quote.grand_total,
            coupon_code: self.config.coupon_code.clone(),
            referral_code: self.config.referral_code.clone(),
            gift_for_friend_tier: selection.gift_upsell(),
            gift_for_friend_amount: quote.gift_for_friend.as_ref().map(|item| item.amount),
        };

        info!(reports = report_ids.len(), total = quote.grand_total, "requesting payment session");
        let response = self.checkout.create_session(&request).await.map_err(|e| {
            warn!(error = %e, "checkout session failed");
            CheckoutError::CheckoutSession(e.to_string())
        })?;

        if response.url.trim().is_empty() {
            return Err(CheckoutError::CheckoutSession("no redirect URL returned".to_string()));
        }

        Ok(CheckoutOutcome::Redirect {
            url: response.url,
            report_ids,
        })
    }

    /// Order went through: saved progress and cached ids are spent
    fn finish(&self) {
        if let Err(e) = self.store.clear_progress() {
            warn!(error = %e, "could not clear saved progress after submission");
        }
        if let Ok(mut cache) = self.cached_reports.lock() {
            *cache = None;
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn check_portrait_photos(
    entitlement: &GiftEntitlement,
    targets: &[usize],
    pets: &[PetRecord],
) -> Result<(), CheckoutError> {
    if !entitlement.includes_portraits() {
        return Ok(());
    }
    // Single-portrait gifts get their target preset; several need a choice
    if !entitlement.accepts_portrait_targets(targets) {
        return Err(CheckoutError::MissingPortraitSelection);
    }
    for index in targets {
        let has_photo = pets.get(*index).map(|p| p.photo_url.is_some()).unwrap_or(false);
        if !has_photo {
            let name = pets.get(*index).map(|p| p.display_name(*index)).unwrap_or_default();
            return Err(CheckoutError::MissingPortraitPhoto(name));
        }
    }
    Ok(())
}

pub fn build_report_requests(pets: &[PetRecord], owner: Option<&OwnerRecord>, language: &str) -> Vec<ReportRequest> {
    let owner = owner.filter(|o| !o.is_empty());
    let non_empty = |s: &str| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    pets.iter()
        .map(|pet| ReportRequest {
            email: pet.email.trim().to_string(),
            name: pet.name.trim().to_string(),
            species: pet.species.map(|s| s.as_str().to_string()).unwrap_or_default(),
            breed: pet.breed.trim().to_string(),
            sex: pet.sex.as_str().to_string(),
            date_of_origin: pet.date_of_origin.map(|d| d.format("%Y-%m-%d").to_string()),
            time_of_origin: pet.time_of_origin.trim().to_string(),
            location: pet.location.trim().to_string(),
            soul_archetype: pet.soul_archetype.clone().unwrap_or_else(|| UNSURE.to_string()),
            special_trait: pet.special_trait.clone().unwrap_or_else(|| UNSURE.to_string()),
            social_reaction: pet.social_reaction.clone().unwrap_or_else(|| UNSURE.to_string()),
            acquisition_mode: pet.acquisition_mode.as_str().to_string(),
            language: language.to_string(),
            owner_name: owner.and_then(|o| non_empty(&o.name)),
            owner_date_of_origin: owner.and_then(|o| o.date_of_origin).map(|d| d.format("%Y-%m-%d").to_string()),
            owner_time_of_origin: owner.and_then(|o| non_empty(&o.time_of_origin)),
            owner_location: owner.and_then(|o| non_empty(&o.location)),
        })
        .collect()
}

/// Stable digest of the report payloads (for reuse on retry)
fn fingerprint(requests: &[ReportRequest]) -> String {
    let mut hasher = Sha256::new();
    for request in requests {
        hasher.update(serde_json::to_vec(request).unwrap_or_default());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{GiftValidation, InMemoryBackend};
    use crate::entities::{PetField, Sex, Species};
    use crate::persistence::MemoryProgressStore;
    use crate::steps::StepTag;
    use chrono::NaiveDate;

    fn valid_pet(name: &str) -> PetRecord {
        let mut pet = PetRecord::empty();
        pet.apply(PetField::Name(name.to_string()));
        pet.apply(PetField::Species(Species::Dog));
        pet.apply(PetField::Sex(Sex::Male));
        pet.apply(PetField::DateOfOrigin(NaiveDate::from_ymd_opt(2019, 9, 1)));
        pet.apply(PetField::Email("owner@example.com".to_string()));
        pet
    }

    fn normal_request(pets: Vec<PetRecord>) -> CheckoutRequest {
        let count = pets.len();
        CheckoutRequest {
            topology: Topology::Normal,
            pets,
            owner: None,
            entitlement: None,
            portrait_targets: Vec::new(),
            selection: CheckoutSelection::new(count, Tier::Mid),
        }
    }

    fn setup() -> (Arc<InMemoryBackend>, Arc<MemoryProgressStore>, CheckoutOrchestrator) {
        setup_with(FlowConfig::default())
    }

    fn setup_with(config: FlowConfig) -> (Arc<InMemoryBackend>, Arc<MemoryProgressStore>, CheckoutOrchestrator) {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryProgressStore::new());
        let orchestrator = CheckoutOrchestrator::with_backend(backend.clone(), store.clone(), config);
        (backend, store, orchestrator)
    }

    fn dev_config() -> FlowConfig {
        FlowConfig {
            dev_mode: true,
            ..FlowConfig::default()
        }
    }

    fn dev_request(count: usize) -> CheckoutRequest {
        CheckoutRequest {
            topology: Topology::Test,
            pets: vec![PetRecord::empty(); count],
            owner: None,
            entitlement: None,
            portrait_targets: Vec::new(),
            selection: CheckoutSelection::new(count, Tier::Mid),
        }
    }

    fn gift_setup(
        code: &str,
        portrait_indices: Vec<usize>,
    ) -> (Arc<InMemoryBackend>, Arc<MemoryProgressStore>, CheckoutOrchestrator, GiftEntitlement) {
        let validation = GiftValidation {
            valid: true,
            entity_count: 2,
            tier_overrides: [(0, Tier::Top), (1, Tier::Top)].into_iter().collect(),
            portrait_indices,
            ..GiftValidation::default()
        };
        let backend = Arc::new(InMemoryBackend::new().with_gift_code(code, validation.clone()));
        let store = Arc::new(MemoryProgressStore::new());
        let orchestrator = CheckoutOrchestrator::with_backend(backend.clone(), store.clone(), FlowConfig::default());
        (backend, store, orchestrator, GiftEntitlement::from_validation(code, &validation))
    }

    fn gift_request(entitlement: &GiftEntitlement, pets: Vec<PetRecord>, targets: Vec<usize>) -> CheckoutRequest {
        CheckoutRequest {
            topology: Topology::Gift,
            selection: CheckoutSelection::new(pets.len(), Tier::Mid),
            pets,
            owner: None,
            entitlement: Some(entitlement.clone()),
            portrait_targets: targets,
        }
    }

    #[tokio::test]
    async fn test_empty_name_aborts_before_network() {
        let (backend, _, orchestrator) = setup();
        let mut first = valid_pet("Rex");
        first.name = String::new();

        let err = orchestrator
            .submit(normal_request(vec![first, valid_pet("Kiwi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::InvalidPet { pet_number: 1, .. }));
        assert!(err.to_string().starts_with("Pet 1"));
        assert_eq!(backend.report_calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_email_aborts_before_network() {
        let (backend, _, orchestrator) = setup();
        let mut pet = valid_pet("Rex");
        pet.email = "not-an-email".to_string();

        let err = orchestrator.submit(normal_request(vec![pet])).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidEmail));
        assert_eq!(backend.report_calls(), 0);
    }

    #[tokio::test]
    async fn test_normal_checkout_redirects_and_clears_progress() {
        let (backend, store, orchestrator) = setup();
        store.set(crate::persistence::PROGRESS_KEY, "{}").unwrap();

        let outcome = orchestrator
            .submit(normal_request(vec![valid_pet("Rex"), valid_pet("Kiwi")]))
            .await
            .unwrap();

        match &outcome {
            CheckoutOutcome::Redirect { url, report_ids } => {
                assert!(url.starts_with("https://pay.example.com/"));
                assert_eq!(report_ids.len(), 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let sessions = backend.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].volume_discount_percent, 20);
        assert_eq!(sessions[0].expected_total, 8000);
        assert_eq!(sessions[0].report_ids, outcome.report_ids());
        assert!(store.get(crate::persistence::PROGRESS_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_state_and_reuses_reports() {
        let (backend, store, orchestrator) = setup();
        store.set(crate::persistence::PROGRESS_KEY, "{}").unwrap();
        backend.fail_checkout(true);

        let err = orchestrator.submit(normal_request(vec![valid_pet("Rex")])).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.get(crate::persistence::PROGRESS_KEY).unwrap().is_some());
        assert_eq!(backend.report_calls(), 1);

        backend.fail_checkout(false);
        let outcome = orchestrator.submit(normal_request(vec![valid_pet("Rex")])).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Redirect { .. }));
        assert_eq!(backend.report_calls(), 1, "report ids reused on retry");
    }

    #[tokio::test]
    async fn test_report_failure_is_retryable() {
        let (backend, _, orchestrator) = setup();
        backend.fail_reports(true);

        let err = orchestrator.submit(normal_request(vec![valid_pet("Rex")])).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ReportCreation(_)));
        assert!(err.is_retryable());
        assert!(backend.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_noop() {
        let (_, _, orchestrator) = setup();
        let _held = InFlightGuard::acquire(&orchestrator.in_flight).unwrap();
        assert!(orchestrator.is_submitting());

        let outcome = orchestrator.submit(normal_request(vec![valid_pet("Rex")])).await.unwrap();
        assert_eq!(outcome, CheckoutOutcome::AlreadySubmitting);
    }

    #[tokio::test]
    async fn test_guard_released_after_error() {
        let (backend, _, orchestrator) = setup();
        backend.fail_reports(true);
        let _ = orchestrator.submit(normal_request(vec![valid_pet("Rex")])).await;
        assert!(!orchestrator.is_submitting());
    }

    #[tokio::test]
    async fn test_gift_redemption_sends_photos() {
        let validation = GiftValidation {
            valid: true,
            entity_count: 2,
            tier_overrides: [(0, Tier::Top), (1, Tier::Top)].into_iter().collect(),
            portrait_indices: vec![1],
            ..GiftValidation::default()
        };
        let backend = Arc::new(InMemoryBackend::new().with_gift_code("PAWS", validation.clone()));
        let store = Arc::new(MemoryProgressStore::new());
        let orchestrator = CheckoutOrchestrator::with_backend(backend.clone(), store, FlowConfig::default());

        let entitlement = GiftEntitlement::from_validation("PAWS", &validation);
        let mut pets = vec![valid_pet("Rex"), valid_pet("Kiwi")];
        let request = |pets: Vec<PetRecord>| CheckoutRequest {
            topology: Topology::Gift,
            pets,
            owner: None,
            entitlement: Some(entitlement.clone()),
            portrait_targets: vec![1],
            selection: CheckoutSelection::new(2, Tier::Mid),
        };

        let err = orchestrator.submit(request(pets.clone())).await.unwrap_err();
        assert!(matches!(err, CheckoutError::MissingPortraitPhoto(ref name) if name == "Kiwi"));

        pets[1].photo_url = Some("https://cdn.example.com/kiwi.jpg".to_string());
        let outcome = orchestrator.submit(request(pets)).await.unwrap();

        match outcome {
            CheckoutOutcome::GiftRedeemed(dest) => {
                assert_eq!(dest.gift_code.as_deref(), Some("PAWS"));
                assert_eq!(dest.resolved_tier, Some(Tier::Top));
                assert!(dest.includes_portrait);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let redemptions = backend.redemptions();
        assert_eq!(redemptions.len(), 1);
        assert_eq!(redemptions[0].photo_urls.get(&1).map(String::as_str), Some("https://cdn.example.com/kiwi.jpg"));
        assert_eq!(redemptions[0].primary_report_id, redemptions[0].report_ids[0]);
        assert!(backend.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_test_mode_fills_and_bypasses_payment() {
        let (backend, _, orchestrator) = setup_with(dev_config());
        let mut request = dev_request(3);
        request.selection.set_tier(2, Tier::Top);

        let outcome = orchestrator.submit(request).await.unwrap();

        match outcome {
            CheckoutOutcome::DevBypass(dest) => {
                assert_eq!(dest.report_ids.len(), 3);
                assert!(dest.session_id.unwrap().starts_with("dev_test_"));
                assert_eq!(dest.handoff.unwrap().tiers.get(&2), Some(&Tier::Top));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.created_reports().len(), 3);
        assert!(backend.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_test_topology_without_dev_mode_is_rejected() {
        let (backend, _, orchestrator) = setup();

        let err = orchestrator.submit(dev_request(2)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::DevModeDisabled));
        assert!(!err.is_retryable());
        assert_eq!(backend.report_calls(), 0);
        assert!(backend.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_future_origin_date_aborts_before_network() {
        let (backend, _, orchestrator) = setup();
        let mut pet = valid_pet("Rex");
        pet.date_of_origin = NaiveDate::from_ymd_opt(2999, 1, 1);

        let err = orchestrator.submit(normal_request(vec![pet])).await.unwrap_err();
        match err {
            CheckoutError::InvalidPet { pet_number, errors } => {
                assert_eq!(pet_number, 1);
                assert_eq!(errors[0].field, "date_of_origin");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(backend.report_calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_portrait_gift_requires_selection() {
        let (backend, _, orchestrator, entitlement) = gift_setup("DUO", vec![0, 1]);
        let mut pets = vec![valid_pet("Rex"), valid_pet("Kiwi")];
        pets[0].photo_url = Some("https://cdn.example.com/rex.jpg".to_string());

        let err = orchestrator
            .submit(gift_request(&entitlement, pets.clone(), Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingPortraitSelection));
        assert_eq!(backend.report_calls(), 0);
        assert!(backend.redemptions().is_empty());

        let outcome = orchestrator.submit(gift_request(&entitlement, pets, vec![0])).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::GiftRedeemed(_)));
        assert_eq!(backend.redemptions()[0].photo_urls.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_redemption_keeps_progress_and_reuses_reports() {
        let (backend, store, orchestrator, entitlement) = gift_setup("RETRY", Vec::new());
        store.set(crate::persistence::PROGRESS_KEY, "{}").unwrap();
        let pets = vec![valid_pet("Rex"), valid_pet("Kiwi")];
        backend.fail_redemption(true);

        let err = orchestrator
            .submit(gift_request(&entitlement, pets.clone(), Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Redemption(_)));
        assert!(err.is_retryable());
        assert!(store.get(crate::persistence::PROGRESS_KEY).unwrap().is_some());

        backend.fail_redemption(false);
        let outcome = orchestrator.submit(gift_request(&entitlement, pets, Vec::new())).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::GiftRedeemed(_)));
        assert_eq!(backend.report_calls(), 1);
        assert!(store.get(crate::persistence::PROGRESS_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_redemption_surfaces_reason() {
        let (backend, store, orchestrator, _) = gift_setup("KNOWN", Vec::new());
        store.set(crate::persistence::PROGRESS_KEY, "{}").unwrap();
        let unknown = GiftEntitlement::from_validation(
            "SPENT",
            &GiftValidation {
                valid: true,
                entity_count: 1,
                ..GiftValidation::default()
            },
        );

        let err = orchestrator
            .submit(gift_request(&unknown, vec![valid_pet("Rex")], Vec::new()))
            .await
            .unwrap_err();
        match err {
            CheckoutError::Redemption(reason) => assert_eq!(reason, "Gift code already used"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(backend.redemptions().len(), 1);
        assert!(store.get(crate::persistence::PROGRESS_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_flow_marks_complete() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryProgressStore::new());
        let config = FlowConfig { dev_mode: true, ..FlowConfig::default() };
        let orchestrator = CheckoutOrchestrator::with_backend(backend, store.clone(), config.clone());

        let mut flow = IntakeFlow::start_test(store.clone(), config).unwrap();
        flow.dispatch(crate::flow::FlowEvent::DevJump { target: StepTag::Checkout }).unwrap();
        let selection = flow.checkout_selection();

        let outcome = orchestrator.submit_flow(&mut flow, selection).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::DevBypass(_)));
        assert!(flow.is_submitted());
        assert_eq!(flow.position().step, StepTag::Complete);
        assert!(store.load_progress().unwrap().is_none());
    }

    #[test]
    fn test_report_payload_shape() {
        let owner = OwnerRecord {
            name: "Ana".to_string(),
            ..OwnerRecord::default()
        };
        let requests = build_report_requests(&[valid_pet("Rex")], Some(&owner), "pt");
        assert_eq!(requests[0].species, "dog");
        assert_eq!(requests[0].sex, "male");
        assert_eq!(requests[0].date_of_origin.as_deref(), Some("2019-09-01"));
        assert_eq!(requests[0].soul_archetype, UNSURE);
        assert_eq!(requests[0].owner_name.as_deref(), Some("Ana"));
        assert_eq!(requests[0].owner_location, None);
        assert_eq!(requests[0].language, "pt");
    }

    #[test]
    fn test_fingerprint_changes_with_payload() {
        let a = build_report_requests(&[valid_pet("Rex")], None, "en");
        let b = build_report_requests(&[valid_pet("Max")], None, "en");
        assert_eq!(fingerprint(&a), fingerprint(&a));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
