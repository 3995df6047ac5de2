// 🐾 Species - closed set with per-species trait option tables
//
// Every species resolves to a table at compile time. Species without a
// dedicated table share the `Other` table.

use serde::{Deserialize, Serialize};

/// Sentinel accepted for any trait question
pub const UNSURE: &str = "unsure";

// ============================================================================
// SPECIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Dog,
    Cat,
    Rabbit,
    Hamster,
    GuineaPig,
    Bird,
    Fish,
    Reptile,
    Horse,
    Other,
}

impl Species {
    pub const ALL: [Species; 10] = [
        Species::Dog,
        Species::Cat,
        Species::Rabbit,
        Species::Hamster,
        Species::GuineaPig,
        Species::Bird,
        Species::Fish,
        Species::Reptile,
        Species::Horse,
        Species::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
            Species::Rabbit => "rabbit",
            Species::Hamster => "hamster",
            Species::GuineaPig => "guinea_pig",
            Species::Bird => "bird",
            Species::Fish => "fish",
            Species::Reptile => "reptile",
            Species::Horse => "horse",
            Species::Other => "other",
        }
    }

    /// Lenient parse used for free-form input; unknown names map to `Other`
    pub fn parse(input: &str) -> Species {
        let normalized = input.trim().to_lowercase().replace([' ', '-'], "_");
        Species::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == normalized)
            .unwrap_or(Species::Other)
    }

    pub fn traits(&self) -> &'static TraitTable {
        match self {
            Species::Dog => &DOG_TRAITS,
            Species::Cat => &CAT_TRAITS,
            Species::Rabbit | Species::Hamster | Species::GuineaPig => &SMALL_MAMMAL_TRAITS,
            Species::Bird => &BIRD_TRAITS,
            Species::Horse => &HORSE_TRAITS,
            Species::Fish | Species::Reptile | Species::Other => &DEFAULT_TRAITS,
        }
    }
}

// ============================================================================
// TRAIT TABLES
// ============================================================================

/// Which of the three trait questions is being asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    SoulArchetype,
    SpecialTrait,
    SocialReaction,
}

impl TraitKind {
    pub fn field_name(&self) -> &'static str {
        match self {
            TraitKind::SoulArchetype => "soul_archetype",
            TraitKind::SpecialTrait => "special_trait",
            TraitKind::SocialReaction => "social_reaction",
        }
    }
}

#[derive(Debug)]
pub struct TraitTable {
    pub soul_archetypes: &'static [&'static str],
    pub special_traits: &'static [&'static str],
    pub social_reactions: &'static [&'static str],
}

impl TraitTable {
    pub fn options(&self, kind: TraitKind) -> &'static [&'static str] {
        match kind {
            TraitKind::SoulArchetype => self.soul_archetypes,
            TraitKind::SpecialTrait => self.special_traits,
            TraitKind::SocialReaction => self.social_reactions,
        }
    }

    /// True when `value` is one of the options or the "unsure" sentinel
    pub fn accepts(&self, kind: TraitKind, value: &str) -> bool {
        value == UNSURE || self.options(kind).contains(&value)
    }
}

static DOG_TRAITS: TraitTable = TraitTable {
    soul_archetypes: &["loyal_guardian", "playful_clown", "gentle_healer", "wild_explorer", "wise_elder"],
    special_traits: &["reads_emotions", "endless_energy", "finds_anything", "makes_friends"],
    social_reactions: &["greets_everyone", "cautious_then_warm", "protective_bark", "hides_behind_owner"],
};

static CAT_TRAITS: TraitTable = TraitTable {
    soul_archetypes: &["regal_observer", "secret_softie", "chaos_agent", "quiet_mystic", "wise_elder"],
    special_traits: &["perfect_timing", "heat_seeker", "silent_stalker", "purr_therapy"],
    social_reactions: &["inspects_from_afar", "vanishes", "demands_attention", "ignores_completely"],
};

static SMALL_MAMMAL_TRAITS: TraitTable = TraitTable {
    soul_archetypes: &["curious_nibbler", "cozy_burrower", "tiny_adventurer", "gentle_soul"],
    special_traits: &["zoomies", "hoarding", "escape_artist", "happy_popcorning"],
    social_reactions: &["freezes", "sniffs_hello", "runs_to_hide", "begs_for_treats"],
};

static BIRD_TRAITS: TraitTable = TraitTable {
    soul_archetypes: &["chatterbox", "sky_dreamer", "loyal_companion", "performer"],
    special_traits: &["mimicry", "music_lover", "puzzle_solver", "morning_alarm"],
    social_reactions: &["shows_off", "goes_quiet", "fluffs_up", "flies_over"],
};

static HORSE_TRAITS: TraitTable = TraitTable {
    soul_archetypes: &["noble_heart", "free_spirit", "steady_partner", "sensitive_soul"],
    special_traits: &["reads_riders", "remembers_everything", "calm_in_storms", "speed"],
    social_reactions: &["curious_approach", "keeps_distance", "nudges_for_treats", "snorts_warning"],
};

static DEFAULT_TRAITS: TraitTable = TraitTable {
    soul_archetypes: &["calm_presence", "curious_mind", "independent_spirit", "gentle_soul"],
    special_traits: &["hypnotic_calm", "uncanny_timing", "surprising_intelligence", "quiet_resilience"],
    social_reactions: &["unbothered", "retreats", "investigates", "watches_closely"],
};
