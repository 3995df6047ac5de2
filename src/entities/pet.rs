// 🐶 Pet Entity - one pet's collected intake data
//
// Records live in a dense, ordered collection whose length equals the
// declared pet count. Updates are partial: one field at a time.

use super::species::{Species, TraitKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    #[default]
    Unset,
    Male,
    Female,
}

impl Sex {
    pub fn is_set(&self) -> bool {
        !matches!(self, Sex::Unset)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Unset => "",
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

/// Why the customer is here - drives report tone downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    #[default]
    Discover,
    Celebrate,
    Memorialize,
    Gifted,
}

impl AcquisitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMode::Discover => "discover",
            AcquisitionMode::Celebrate => "celebrate",
            AcquisitionMode::Memorialize => "memorialize",
            AcquisitionMode::Gifted => "gifted",
        }
    }
}

// ============================================================================
// PET RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PetRecord {
    pub name: String,
    pub species: Option<Species>,
    pub breed: String,
    pub sex: Sex,

    /// Birth (or adoption) date; revived from an ISO string on restore
    pub date_of_origin: Option<NaiveDate>,
    pub time_of_origin: String,
    pub location: String,

    pub soul_archetype: Option<String>,
    pub special_trait: Option<String>,
    pub social_reaction: Option<String>,

    /// Contact address, shared across all pets of one order
    pub email: String,
    pub acquisition_mode: AcquisitionMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl PetRecord {
    /// Empty record used to pad the collection
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty record that inherits the acquisition mode (gift flows)
    pub fn with_mode(mode: AcquisitionMode) -> Self {
        PetRecord {
            acquisition_mode: mode,
            ..Self::default()
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Display name for messages ("Pet 2" when unnamed)
    pub fn display_name(&self, index: usize) -> String {
        if self.has_name() {
            self.name.trim().to_string()
        } else {
            format!("Pet {}", index + 1)
        }
    }

    pub fn trait_value(&self, kind: TraitKind) -> Option<&str> {
        match kind {
            TraitKind::SoulArchetype => self.soul_archetype.as_deref(),
            TraitKind::SpecialTrait => self.special_trait.as_deref(),
            TraitKind::SocialReaction => self.social_reaction.as_deref(),
        }
    }

    /// Apply one partial update
    pub fn apply(&mut self, field: PetField) {
        match field {
            PetField::Name(name) => self.name = name,
            PetField::Species(species) => {
                self.species = Some(species);
                self.drop_foreign_traits();
            }
            PetField::Breed(breed) => self.breed = breed,
            PetField::Sex(sex) => self.sex = sex,
            PetField::DateOfOrigin(date) => self.date_of_origin = date,
            PetField::TimeOfOrigin(time) => self.time_of_origin = time,
            PetField::Location(location) => self.location = location,
            PetField::Trait(kind, value) => match kind {
                TraitKind::SoulArchetype => self.soul_archetype = Some(value),
                TraitKind::SpecialTrait => self.special_trait = Some(value),
                TraitKind::SocialReaction => self.social_reaction = Some(value),
            },
            PetField::Email(email) => self.email = email,
            PetField::AcquisitionMode(mode) => self.acquisition_mode = mode,
            PetField::PhotoUrl(url) => self.photo_url = url,
        }
    }

    /// Trait answers from another species' table no longer make sense
    fn drop_foreign_traits(&mut self) {
        let Some(species) = self.species else {
            return;
        };
        let table = species.traits();
        for kind in [TraitKind::SoulArchetype, TraitKind::SpecialTrait, TraitKind::SocialReaction] {
            let keep = self
                .trait_value(kind)
                .map(|v| table.accepts(kind, v))
                .unwrap_or(true);
            if !keep {
                match kind {
                    TraitKind::SoulArchetype => self.soul_archetype = None,
                    TraitKind::SpecialTrait => self.special_trait = None,
                    TraitKind::SocialReaction => self.social_reaction = None,
                }
            }
        }
    }
}

/// Single-field update addressed to one pet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PetField {
    Name(String),
    Species(Species),
    Breed(String),
    Sex(Sex),
    DateOfOrigin(Option<NaiveDate>),
    TimeOfOrigin(String),
    Location(String),
    Trait(TraitKind, String),
    Email(String),
    AcquisitionMode(AcquisitionMode),
    PhotoUrl(Option<String>),
}
