// 💰 Pricing Engine - tiers, volume discount, add-ons
//
// Amounts are integer minor currency units (cents).
//
//   base     = Σ tier price per pet
//   discount = round(base × rate(count))     rate: 1→0% 2→20% 3→30% 4→40% 5+→50%
//   final    = base − discount
//
// Add-ons are priced separately and surface as their own line items.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// TIERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Mid,
    Top,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Mid, Tier::Top];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Mid => "mid",
            Tier::Top => "top",
        }
    }

    pub fn parse(input: &str) -> Option<Tier> {
        match input.trim().to_lowercase().as_str() {
            "basic" => Some(Tier::Basic),
            "mid" => Some(Tier::Mid),
            "top" => Some(Tier::Top),
            _ => None,
        }
    }

    /// The lowest tier carries no portrait
    pub fn includes_portrait(&self) -> bool {
        !matches!(self, Tier::Basic)
    }

    /// The top tier already bundles the recurring add-on
    pub fn includes_recurring_addon(&self) -> bool {
        matches!(self, Tier::Top)
    }
}

/// One row of the price table; `anchor` is the struck-through display price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrice {
    pub tier: Tier,
    pub price: u64,
    pub anchor: u64,
}

pub const DEFAULT_PRICE_TABLE: [TierPrice; 3] = [
    TierPrice { tier: Tier::Basic, price: 3500, anchor: 4900 },
    TierPrice { tier: Tier::Mid, price: 5000, anchor: 8900 },
    TierPrice { tier: Tier::Top, price: 12900, anchor: 19900 },
];

/// Monthly add-on, per pet
pub const RECURRING_ADDON_PRICE: u64 = 499;

/// Gift-for-a-friend is sold at this share of the normal tier price
pub const GIFT_FOR_FRIEND_PERCENT: u64 = 50;

/// Volume discount step function keyed by pet count
pub fn volume_discount_percent(entity_count: usize) -> u64 {
    match entity_count {
        0 | 1 => 0,
        2 => 20,
        3 => 30,
        4 => 40,
        _ => 50,
    }
}

/// Round-half-up percentage of an integer amount
fn percent_of(amount: u64, percent: u64) -> u64 {
    (amount * percent + 50) / 100
}

// ============================================================================
// PRICE BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_total: u64,
    pub discount_percent: u64,
    pub discount_amount: u64,
    pub final_total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Pets,
    RecurringAddon,
    GiftForFriend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub label: String,
    pub amount: u64,
}

/// Everything the checkout view shows and the checkout call needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutQuote {
    pub pets: PriceBreakdown,
    pub addon_count: usize,
    pub addon_total: u64,
    pub gift_for_friend: Option<LineItem>,
    pub line_items: Vec<LineItem>,
    pub grand_total: u64,
}

impl CheckoutQuote {
    pub fn summary(&self) -> String {
        format!(
            "{} line item(s): base {}, discount {} ({}%), add-ons {}, total {}",
            self.line_items.len(),
            format_amount(self.pets.base_total),
            format_amount(self.pets.discount_amount),
            self.pets.discount_percent,
            format_amount(self.addon_total),
            format_amount(self.grand_total)
        )
    }
}

pub fn format_amount(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

// ============================================================================
// CHECKOUT SELECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortraitStyle {
    Classic,
    Watercolor,
    Cosmic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortraitPhoto {
    pub url: String,
    pub style: PortraitStyle,
}

/// In-memory choices made on the checkout view; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSelection {
    entity_count: usize,
    default_tier: Tier,
    tiers: BTreeMap<usize, Tier>,
    photos: BTreeMap<usize, PortraitPhoto>,
    addons: BTreeMap<usize, bool>,
    gift_upsell: Option<Tier>,
}

impl CheckoutSelection {
    pub fn new(entity_count: usize, default_tier: Tier) -> Self {
        let entity_count = entity_count.max(1);
        CheckoutSelection {
            entity_count,
            default_tier,
            tiers: (0..entity_count).map(|i| (i, default_tier)).collect(),
            photos: BTreeMap::new(),
            addons: BTreeMap::new(),
            gift_upsell: None,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    pub fn tier(&self, index: usize) -> Tier {
        self.tiers.get(&index).copied().unwrap_or(self.default_tier)
    }

    pub fn tiers(&self) -> &BTreeMap<usize, Tier> {
        &self.tiers
    }

    pub fn photos(&self) -> &BTreeMap<usize, PortraitPhoto> {
        &self.photos
    }

    pub fn addons(&self) -> &BTreeMap<usize, bool> {
        &self.addons
    }

    pub fn gift_upsell(&self) -> Option<Tier> {
        self.gift_upsell
    }

    pub fn has_addon(&self, index: usize) -> bool {
        self.addons.get(&index).copied().unwrap_or(false)
    }

    /// Changing to the lowest tier drops that pet's portrait photo
    pub fn set_tier(&mut self, index: usize, tier: Tier) {
        if index >= self.entity_count {
            return;
        }
        self.tiers.insert(index, tier);
        if !tier.includes_portrait() {
            self.photos.remove(&index);
        }
    }

    /// Bulk tier change; the lowest tier clears every photo
    pub fn set_all_tiers(&mut self, tier: Tier) {
        for index in 0..self.entity_count {
            self.tiers.insert(index, tier);
        }
        if !tier.includes_portrait() {
            self.photos.clear();
        }
    }

    /// Returns false when the pet's tier has no portrait
    pub fn set_photo(&mut self, index: usize, photo: PortraitPhoto) -> bool {
        if index >= self.entity_count || !self.tier(index).includes_portrait() {
            return false;
        }
        self.photos.insert(index, photo);
        true
    }

    pub fn clear_photo(&mut self, index: usize) {
        self.photos.remove(&index);
    }

    pub fn set_addon(&mut self, index: usize, enabled: bool) {
        if index < self.entity_count {
            self.addons.insert(index, enabled);
        }
    }

    pub fn set_gift_upsell(&mut self, tier: Option<Tier>) {
        self.gift_upsell = tier;
    }

    /// Pets paying for the recurring add-on (tier-bundled ones excluded)
    pub fn billable_addon_count(&self) -> usize {
        (0..self.entity_count)
            .filter(|i| self.has_addon(*i) && !self.tier(*i).includes_recurring_addon())
            .count()
    }
}

// ============================================================================
// PRICING ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct PricingEngine {
    pub table: [TierPrice; 3],
    pub addon_unit_price: u64,
}

impl PricingEngine {
    pub fn new() -> Self {
        PricingEngine {
            table: DEFAULT_PRICE_TABLE,
            addon_unit_price: RECURRING_ADDON_PRICE,
        }
    }

    pub fn tier_price(&self, tier: Tier) -> TierPrice {
        self.table
            .iter()
            .copied()
            .find(|row| row.tier == tier)
            .unwrap_or(TierPrice { tier, price: 0, anchor: 0 })
    }

    /// Pure price for the pets themselves
    ///
    /// Example:
    /// ```
    /// use pet_intake::pricing::{PricingEngine, Tier};
    /// use std::collections::BTreeMap;
    ///
    /// let tiers: BTreeMap<usize, Tier> = [(0, Tier::Mid), (1, Tier::Mid)].into_iter().collect();
    /// let breakdown = PricingEngine::new().price_pets(2, &tiers);
    /// assert_eq!(breakdown.final_total, 8000);
    /// ```
    pub fn price_pets(&self, entity_count: usize, tiers: &BTreeMap<usize, Tier>) -> PriceBreakdown {
        let base_total: u64 = (0..entity_count)
            .map(|i| tiers.get(&i).map(|t| self.tier_price(*t).price).unwrap_or(0))
            .sum();
        let discount_percent = volume_discount_percent(entity_count);
        let discount_amount = percent_of(base_total, discount_percent).min(base_total);

        PriceBreakdown {
            base_total,
            discount_percent,
            discount_amount,
            final_total: base_total - discount_amount,
        }
    }

    pub fn gift_for_friend_price(&self, tier: Tier) -> u64 {
        percent_of(self.tier_price(tier).price, GIFT_FOR_FRIEND_PERCENT)
    }

    /// Full quote: pets, recurring add-on, gift-for-a-friend
    pub fn quote(&self, selection: &CheckoutSelection) -> CheckoutQuote {
        let pets = self.price_pets(selection.entity_count(), selection.tiers());
        let addon_count = selection.billable_addon_count();
        let addon_total = addon_count as u64 * self.addon_unit_price;

        let mut line_items = vec![LineItem {
            kind: LineItemKind::Pets,
            label: format!("{} pet reading(s)", selection.entity_count()),
            amount: pets.final_total,
        }];

        if addon_count > 0 {
            line_items.push(LineItem {
                kind: LineItemKind::RecurringAddon,
                label: format!("Monthly updates × {}", addon_count),
                amount: addon_total,
            });
        }

        let gift_for_friend = selection.gift_upsell().map(|tier| LineItem {
            kind: LineItemKind::GiftForFriend,
            label: format!("Gift for a friend ({})", tier.as_str()),
            amount: self.gift_for_friend_price(tier),
        });
        if let Some(item) = &gift_for_friend {
            line_items.push(item.clone());
        }

        let grand_total = line_items.iter().map(|item| item.amount).sum();

        CheckoutQuote {
            pets,
            addon_count,
            addon_total,
            gift_for_friend,
            line_items,
            grand_total,
        }
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new()
    }
}
