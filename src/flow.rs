// 🔁 Intake Flow - explicit state, pure transitions, mirrored to storage
//
// All navigation is a pure reducer:  reduce(state, event) -> state'
// IntakeFlow wraps the reducer with hydration, persistence and the
// operator/gift entry points.

use crate::config::FlowConfig;
use crate::dev;
use crate::entities::{OwnerField, OwnerRecord, PetField, PetRecord, AcquisitionMode};
use crate::error::FlowError;
use crate::gift::{GiftEntitlement, MAX_PETS};
use crate::persistence::{ProgressSnapshot, ProgressStore};
use crate::pricing::CheckoutSelection;
use crate::steps::{StepGraph, StepPosition, StepTag, Topology};
use crate::validation::{self, ValidationError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// FLOW STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub topology: Topology,
    pub entitlement: Option<GiftEntitlement>,
    pub entity_count: usize,
    pub pets: Vec<PetRecord>,
    pub position: StepPosition,

    /// Pets whose portrait photo is collected at the upload step
    pub portrait_targets: Vec<usize>,

    /// Last per-pet step visited for each pet (carried by the snapshot)
    #[serde(skip)]
    pub last_steps: Vec<Option<StepTag>>,
}

impl FlowState {
    /// Single pet, normal topology, pet-count step
    pub fn new_normal() -> Self {
        Self::fresh(Topology::Normal, None, 1, AcquisitionMode::default())
    }

    pub fn new_test() -> Self {
        Self::fresh(Topology::Test, None, 1, AcquisitionMode::default())
    }

    /// Gift flows start at the first pet's name with the count preset
    pub fn new_gift(entitlement: GiftEntitlement) -> Self {
        let count = entitlement.entity_count;
        let targets = entitlement.auto_portrait_targets().unwrap_or_default();
        let mut state = Self::fresh(Topology::Gift, Some(entitlement), count, AcquisitionMode::Gifted);
        state.portrait_targets = targets;
        state
    }

    fn fresh(
        topology: Topology,
        entitlement: Option<GiftEntitlement>,
        count: usize,
        mode: AcquisitionMode,
    ) -> Self {
        let mut state = FlowState {
            topology,
            entitlement,
            entity_count: count,
            pets: vec![PetRecord::with_mode(mode); count],
            position: StepPosition::new(StepTag::PetCount, 0),
            portrait_targets: Vec::new(),
            last_steps: vec![None; count],
        };
        state.position = state.graph().first_position();
        state
    }

    pub fn graph(&self) -> StepGraph {
        match (self.topology, &self.entitlement) {
            (Topology::Normal, _) => StepGraph::normal(),
            (Topology::Test, _) => StepGraph::test(),
            (Topology::Gift, Some(entitlement)) => entitlement.step_graph(),
            (Topology::Gift, None) => StepGraph::gift(0),
        }
    }

    pub fn current_pet(&self) -> Option<&PetRecord> {
        self.pets.get(self.position.entity_index)
    }

    pub fn is_complete(&self) -> bool {
        self.position.step == StepTag::Complete
    }

    /// Heal invariant violations instead of surfacing them:
    /// count within [1, 5], collection exactly `count` long, index in range,
    /// step belonging to the active topology.
    pub fn reconcile(mut self) -> Self {
        self.entity_count = self.entity_count.clamp(1, MAX_PETS);
        let count = self.entity_count;

        let pad_mode = match self.topology {
            Topology::Gift => AcquisitionMode::Gifted,
            _ => AcquisitionMode::default(),
        };
        if self.pets.len() < count {
            self.pets.resize(count, PetRecord::with_mode(pad_mode));
        }
        self.pets.truncate(count);
        self.last_steps.resize(count, None);
        self.portrait_targets.retain(|i| *i < count);

        let graph = self.graph();
        if !graph.contains(self.position.step) {
            debug!(step = ?self.position.step, topology = self.topology.name(), "step not in topology, restarting position");
            self.position = graph.first_position();
        }

        if self.position.entity_index >= count {
            let index = count - 1;
            let step = if self.position.step.is_per_entity() {
                self.last_steps[index].unwrap_or_else(|| graph.first_entity_step())
            } else {
                self.position.step
            };
            debug!(from = self.position.entity_index, to = index, "pet index clamped");
            self.position = StepPosition::new(step, index);
        }

        self
    }

    fn record_visit(&mut self) {
        if self.position.step.is_per_entity() {
            if let Some(slot) = self.last_steps.get_mut(self.position.entity_index) {
                *slot = Some(self.position.step);
            }
        }
    }

    pub fn to_snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            pets: self.pets.clone(),
            current_entity_index: self.position.entity_index,
            current_step: self.position.step,
            entity_count: self.entity_count,
            topology: self.topology,
            gift: self.entitlement.clone(),
            portrait_targets: self.portrait_targets.clone(),
            last_steps: self.last_steps.clone(),
            saved_at: Utc::now(),
        }
    }

    pub fn from_snapshot(snapshot: ProgressSnapshot) -> Self {
        let count = snapshot.entity_count;
        FlowState {
            topology: snapshot.topology,
            entitlement: snapshot.gift,
            entity_count: count,
            pets: snapshot.pets,
            position: StepPosition::new(snapshot.current_step, snapshot.current_entity_index),
            portrait_targets: snapshot.portrait_targets,
            last_steps: snapshot.last_steps,
        }
        .reconcile()
    }
}

// ============================================================================
// EVENTS + REDUCER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    SetPetCount { count: usize },
    IncrementPetCount,
    DecrementPetCount,
    UpdatePet { index: usize, field: PetField },
    /// Contact address is shared; written to every pet
    SetContactEmail { email: String },
    SelectPortraitTargets { targets: Vec<usize> },
    Advance,
    Retreat,
    /// Operator shortcut, test topology only
    DevJump { target: StepTag },
}

/// Pure transition function
pub fn reduce(state: &FlowState, event: &FlowEvent) -> FlowState {
    let mut next = state.clone();
    let graph = state.graph();

    match event {
        FlowEvent::SetPetCount { count } => {
            if state.topology != Topology::Gift {
                next.entity_count = *count;
            }
        }
        FlowEvent::IncrementPetCount => {
            if state.topology != Topology::Gift {
                next.entity_count = (state.entity_count + 1).min(MAX_PETS);
            }
        }
        FlowEvent::DecrementPetCount => {
            if state.topology != Topology::Gift {
                next.entity_count = state.entity_count.saturating_sub(1).max(1);
            }
        }
        FlowEvent::UpdatePet { index, field } => {
            if let Some(pet) = next.pets.get_mut(*index) {
                pet.apply(field.clone());
            }
        }
        FlowEvent::SetContactEmail { email } => {
            let email = email.trim().to_string();
            for pet in next.pets.iter_mut() {
                pet.email = email.clone();
            }
        }
        FlowEvent::SelectPortraitTargets { targets } => {
            if let Some(entitlement) = &state.entitlement {
                if entitlement.accepts_portrait_targets(targets) {
                    let mut targets = targets.clone();
                    targets.sort_unstable();
                    targets.dedup();
                    next.portrait_targets = targets;
                }
            }
        }
        FlowEvent::Advance => {
            next.position = graph.advance(state.position, state.entity_count);
        }
        FlowEvent::Retreat => {
            next.position = graph.retreat(state.position, state.entity_count);
        }
        FlowEvent::DevJump { target } => {
            let allowed = matches!(target, StepTag::OwnerDetails | StepTag::Checkout);
            if state.topology == Topology::Test && allowed {
                dev::fill_unnamed(&mut next.pets);
                next.position = StepPosition::new(*target, state.entity_count.max(1) - 1);
            }
        }
    }

    let mut next = next.reconcile();
    next.record_visit();
    next
}

// ============================================================================
// PROGRESS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowProgress {
    pub global_step: usize,
    pub total_steps: usize,
    pub percent: u8,
}

// ============================================================================
// INTAKE FLOW CONTROLLER
// ============================================================================

pub struct IntakeFlow {
    state: FlowState,
    owner: Option<OwnerRecord>,
    store: Arc<dyn ProgressStore>,
    config: FlowConfig,
    /// Set once the order went through; no more writes after that
    submitted: bool,
}

impl IntakeFlow {
    /// Organic entry: resume a saved snapshot or start fresh
    pub fn resume(store: Arc<dyn ProgressStore>, config: FlowConfig) -> Self {
        let state = match store.load_progress() {
            Ok(Some(snapshot)) if snapshot.is_resumable() => {
                info!(step = ?snapshot.current_step, pet = snapshot.current_entity_index, "resuming saved progress");
                let mut state = FlowState::from_snapshot(snapshot);
                if state.topology == Topology::Test && !config.dev_mode {
                    state.topology = Topology::Normal;
                }
                state
            }
            Ok(_) => FlowState::new_normal(),
            Err(e) => {
                warn!(error = %e, "saved progress unreadable, starting fresh");
                FlowState::new_normal()
            }
        };

        let owner = store.load_owner().unwrap_or_else(|e| {
            warn!(error = %e, "saved owner unreadable, ignoring");
            None
        });

        IntakeFlow {
            state,
            owner,
            store,
            config,
            submitted: false,
        }
    }

    /// Gift entry: never inherits unrelated progress
    pub fn start_gift(store: Arc<dyn ProgressStore>, config: FlowConfig, entitlement: GiftEntitlement) -> Self {
        if let Err(e) = store.clear_progress() {
            warn!(error = %e, "could not discard previous progress for gift flow");
        }
        info!(code = %entitlement.code, pets = entitlement.entity_count, "starting gift flow");

        let mut flow = IntakeFlow {
            state: FlowState::new_gift(entitlement),
            owner: None,
            store,
            config,
            submitted: false,
        };
        flow.owner = flow.store.load_owner().unwrap_or(None);
        flow
    }

    /// Operator entry with dev shortcuts
    pub fn start_test(store: Arc<dyn ProgressStore>, config: FlowConfig) -> Result<Self, FlowError> {
        if !config.dev_mode {
            return Err(FlowError::DevModeDisabled);
        }
        info!("starting test flow");
        Ok(IntakeFlow {
            state: FlowState::new_test(),
            owner: None,
            store,
            config,
            submitted: false,
        })
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn position(&self) -> StepPosition {
        self.state.position
    }

    pub fn owner(&self) -> Option<&OwnerRecord> {
        self.owner.as_ref()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn progress(&self) -> FlowProgress {
        let graph = self.state.graph();
        FlowProgress {
            global_step: graph.global_step(&self.state.position, self.state.entity_count),
            total_steps: graph.total_steps(self.state.entity_count),
            percent: graph.progress_percent(&self.state.position, self.state.entity_count),
        }
    }

    /// Apply an event and mirror the result to storage
    pub fn dispatch(&mut self, event: FlowEvent) -> Result<(), FlowError> {
        match &event {
            FlowEvent::UpdatePet { index, .. } if *index >= self.state.entity_count => {
                return Err(FlowError::NoSuchPet {
                    index: *index,
                    count: self.state.entity_count,
                });
            }
            FlowEvent::DevJump { .. } if self.state.topology != Topology::Test => {
                return Err(FlowError::DevModeDisabled);
            }
            _ => {}
        }

        let before = self.state.position;
        self.state = reduce(&self.state, &event);
        if self.state.position != before {
            debug!(
                from = before.step.number(),
                to = self.state.position.step.number(),
                pet = self.state.position.entity_index,
                "step changed"
            );
        }
        if matches!(event, FlowEvent::DevJump { .. }) && self.owner.is_none() {
            self.owner = Some(dev::synthetic_owner());
        }

        self.persist();
        Ok(())
    }

    /// Validate what the current step owns, then advance
    pub fn next(&mut self, today: NaiveDate) -> Result<StepPosition, FlowError> {
        let errors = self.step_errors(today);
        if !errors.is_empty() {
            return Err(FlowError::Invalid(errors));
        }
        self.dispatch(FlowEvent::Advance)?;
        Ok(self.state.position)
    }

    pub fn back(&mut self) -> Result<StepPosition, FlowError> {
        self.dispatch(FlowEvent::Retreat)?;
        Ok(self.state.position)
    }

    fn step_errors(&self, today: NaiveDate) -> Vec<ValidationError> {
        let position = self.state.position;
        match position.step {
            StepTag::PortraitSelection => {
                let accepted = self
                    .state
                    .entitlement
                    .as_ref()
                    .map(|e| e.accepts_portrait_targets(&self.state.portrait_targets))
                    .unwrap_or(false);
                if accepted {
                    Vec::new()
                } else {
                    vec![ValidationError::new("portrait_targets", "Choose at least one pet", "Portraits")]
                }
            }
            StepTag::PhotoUpload => self
                .state
                .portrait_targets
                .iter()
                .filter(|i| {
                    self.state.pets.get(**i).and_then(|p| p.photo_url.as_ref()).is_none()
                })
                .map(|i| ValidationError::new("photo_url", "Please upload a photo", &format!("Pet {}", i + 1)))
                .collect(),
            step => {
                let owner = self.owner.clone().unwrap_or_default();
                validation::validate_step(step, self.state.current_pet(), position.entity_index, &owner, today)
                    .err()
                    .unwrap_or_default()
            }
        }
    }

    /// Owner record is created on first write and saved on its own key
    pub fn update_owner(&mut self, field: OwnerField) {
        let owner = self.owner.get_or_insert_with(OwnerRecord::default);
        owner.apply(field);
        if let Err(e) = self.store.save_owner(owner) {
            warn!(error = %e, "could not save owner details");
        }
    }

    /// Customer-initiated restart: wipe storage and start over
    pub fn restart(&mut self) -> Result<(), FlowError> {
        self.store.clear_progress()?;
        self.store.clear_owner()?;
        self.state = FlowState::new_normal();
        self.owner = None;
        self.submitted = false;
        info!("flow restarted");
        Ok(())
    }

    /// Selection the checkout view starts from
    pub fn checkout_selection(&self) -> CheckoutSelection {
        match &self.state.entitlement {
            Some(entitlement) => entitlement.checkout_selection(
                self.config.default_tier,
                self.config.gift_entitled_tier_default,
            ),
            None => CheckoutSelection::new(self.state.entity_count, self.config.default_tier),
        }
    }

    /// Called once the order went through; storage was cleared by then
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
        self.state.position = StepPosition::new(StepTag::Complete, self.state.entity_count.saturating_sub(1));
    }

    /// Skip only pure no-ops: untouched pet-count step
    fn persist(&self) {
        if self.submitted {
            return;
        }
        let untouched = self.state.position.step == StepTag::PetCount
            && self.state.pets.first().map(|p| p.name.is_empty()).unwrap_or(true);
        if untouched {
            return;
        }

        if let Err(e) = self.store.save_progress(&self.state.to_snapshot()) {
            warn!(error = %e, "could not save progress");
        }
    }
}
