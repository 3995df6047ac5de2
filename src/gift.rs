// 🎁 Gift Redemption - validated entitlements that reshape the flow
//
// A gift code is validated once. The resulting entitlement is read-only
// and decides:
// - how many pets the flow collects and their initial acquisition mode
// - which tiers the pets receive
// - whether portrait selection / photo upload steps are spliced in

use crate::collaborators::{GiftValidation, GiftValidator};
use crate::error::GiftError;
use crate::pricing::{CheckoutSelection, Tier};
use crate::steps::StepGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const MAX_PETS: usize = 5;

// ============================================================================
// GIFT ENTITLEMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftEntitlement {
    pub code: String,
    pub entity_count: usize,
    pub tier_overrides: BTreeMap<usize, Tier>,
    /// Pets entitled to a portrait, ascending and within entity_count
    pub portrait_indices: Vec<usize>,
    pub includes_recurring_addon: bool,
    pub amount: u64,
    pub gift_message: Option<String>,
    pub recipient_name: Option<String>,
}

impl GiftEntitlement {
    /// Build from a positive validator answer, clamping what it sent
    pub fn from_validation(code: &str, validation: &GiftValidation) -> Self {
        let entity_count = validation.entity_count.clamp(1, MAX_PETS);

        let mut portrait_indices: Vec<usize> = validation
            .portrait_indices
            .iter()
            .copied()
            .filter(|i| *i < entity_count)
            .collect();
        portrait_indices.sort_unstable();
        portrait_indices.dedup();

        let tier_overrides = validation
            .tier_overrides
            .iter()
            .filter(|(i, _)| **i < entity_count)
            .map(|(i, t)| (*i, *t))
            .collect();

        GiftEntitlement {
            code: code.to_string(),
            entity_count,
            tier_overrides,
            portrait_indices,
            includes_recurring_addon: validation.includes_recurring_addon,
            amount: validation.amount,
            gift_message: validation.gift_message.clone(),
            recipient_name: validation.recipient_name.clone(),
        }
    }

    pub fn includes_portraits(&self) -> bool {
        !self.portrait_indices.is_empty()
    }

    pub fn step_graph(&self) -> StepGraph {
        StepGraph::gift(self.portrait_indices.len())
    }

    pub fn entitled_tier(&self, index: usize) -> Option<Tier> {
        self.tier_overrides.get(&index).copied()
    }

    /// With a single entitled pet there is nothing to choose
    pub fn auto_portrait_targets(&self) -> Option<Vec<usize>> {
        match self.portrait_indices.as_slice() {
            [only] => Some(vec![*only]),
            _ => None,
        }
    }

    /// A selection is a non-empty subset of the entitled pets
    pub fn accepts_portrait_targets(&self, targets: &[usize]) -> bool {
        !targets.is_empty() && targets.iter().all(|t| self.portrait_indices.contains(t))
    }

    /// Checkout selection for a gift flow.
    ///
    /// By default every pet starts at `default_tier` like organic flows;
    /// `use_entitled_tiers` starts each pet at its entitled tier instead.
    pub fn checkout_selection(&self, default_tier: Tier, use_entitled_tiers: bool) -> CheckoutSelection {
        let mut selection = CheckoutSelection::new(self.entity_count, default_tier);
        if use_entitled_tiers {
            for (index, tier) in &self.tier_overrides {
                selection.set_tier(*index, *tier);
            }
        }
        if self.includes_recurring_addon {
            for index in 0..self.entity_count {
                selection.set_addon(index, true);
            }
        }
        selection
    }
}

// ============================================================================
// CODE VALIDATION
// ============================================================================

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Validate a code with the external validator
pub async fn validate_gift_code(
    validator: &dyn GiftValidator,
    code: &str,
) -> Result<GiftEntitlement, GiftError> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(GiftError::EmptyCode);
    }

    let validation = validator.validate(&code).await.map_err(|e| {
        warn!(code = %code, error = %e, "gift validation call failed");
        GiftError::Unavailable(e.to_string())
    })?;

    if !validation.valid {
        let reason = validation
            .error
            .clone()
            .unwrap_or_else(|| "Invalid gift code".to_string());
        info!(code = %code, reason = %reason, "gift code rejected");
        return Err(GiftError::Rejected(reason));
    }

    let entitlement = GiftEntitlement::from_validation(&code, &validation);
    info!(
        code = %entitlement.code,
        pets = entitlement.entity_count,
        portraits = entitlement.portrait_indices.len(),
        "gift code validated"
    );
    Ok(entitlement)
}
