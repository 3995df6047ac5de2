// 📐 Validation Layer - field rules for pets, owner and contact
//
// Two entry points:
// - validate_step: what the current step owns, checked before advancing
// - validate_pet_for_checkout: the full record, checked before submission

use crate::entities::{OwnerRecord, PetRecord, TraitKind};
use crate::steps::StepTag;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

pub const NAME_MAX_CHARS: usize = 50;

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str, context: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

fn into_result(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// PATTERNS
// ============================================================================

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\p{L}\p{M}\s'’\-]+$").expect("name pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

// ============================================================================
// FIELD RULES
// ============================================================================

/// Name rule: trimmed, 1-50 characters, letters/spaces/hyphens/apostrophes
pub fn check_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Required field is empty");
    }
    if trimmed.chars().count() > NAME_MAX_CHARS {
        return Err("Must be 50 characters or fewer");
    }
    if !name_pattern().is_match(trimmed) {
        return Err("Only letters, spaces, hyphens and apostrophes are allowed");
    }
    Ok(())
}

/// Permissive email shape: something@something.something
pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email.trim())
}

/// Origin dates may not lie in the future
pub fn check_origin_date(date: Option<NaiveDate>, today: NaiveDate) -> Result<(), &'static str> {
    match date {
        None => Err("Required field is empty"),
        Some(d) if d > today => Err("Date cannot be in the future"),
        Some(_) => Ok(()),
    }
}

fn check_trait(pet: &PetRecord, kind: TraitKind, context: &str) -> Option<ValidationError> {
    let value = match pet.trait_value(kind) {
        Some(v) if !v.is_empty() => v,
        _ => return Some(ValidationError::new(kind.field_name(), "Please choose an option", context)),
    };
    let species = pet.species.unwrap_or(crate::entities::Species::Other);
    if species.traits().accepts(kind, value) {
        None
    } else {
        Some(ValidationError::new(
            kind.field_name(),
            &format!("'{}' is not an option for {}", value, species.as_str()),
            context,
        ))
    }
}

// ============================================================================
// STEP VALIDATION
// ============================================================================

/// Validate what the given step owns before the flow advances past it
pub fn validate_step(
    step: StepTag,
    pet: Option<&PetRecord>,
    pet_index: usize,
    owner: &OwnerRecord,
    today: NaiveDate,
) -> ValidationResult {
    let context = format!("Pet {}", pet_index + 1);
    let mut errors = Vec::new();

    match (step, pet) {
        (StepTag::Name, Some(pet)) => {
            if let Err(msg) = check_name(&pet.name) {
                errors.push(ValidationError::new("name", msg, &context));
            }
        }
        (StepTag::Species, Some(pet)) => {
            if pet.species.is_none() {
                errors.push(ValidationError::new("species", "Please choose a species", &context));
            }
        }
        (StepTag::Sex, Some(pet)) => {
            if !pet.sex.is_set() {
                errors.push(ValidationError::new("sex", "Please choose one", &context));
            }
        }
        (StepTag::OriginDateTime, Some(pet)) => {
            if let Err(msg) = check_origin_date(pet.date_of_origin, today) {
                errors.push(ValidationError::new("date_of_origin", msg, &context));
            }
        }
        (StepTag::SoulArchetype, Some(pet)) => {
            errors.extend(check_trait(pet, TraitKind::SoulArchetype, &context));
        }
        (StepTag::SpecialTrait, Some(pet)) => {
            errors.extend(check_trait(pet, TraitKind::SpecialTrait, &context));
        }
        (StepTag::SocialReaction, Some(pet)) => {
            errors.extend(check_trait(pet, TraitKind::SocialReaction, &context));
        }
        (StepTag::OwnerDetails, _) => {
            // Optional step; only reject what was entered badly
            if !owner.name.trim().is_empty() {
                if let Err(msg) = check_name(&owner.name) {
                    errors.push(ValidationError::new("owner_name", msg, "Owner"));
                }
            }
            if let Some(date) = owner.date_of_origin {
                if date > today {
                    errors.push(ValidationError::new("owner_date_of_origin", "Date cannot be in the future", "Owner"));
                }
            }
        }
        (StepTag::ContactEmail, Some(pet)) => {
            if !is_valid_email(&pet.email) {
                errors.push(ValidationError::new("email", "Please enter a valid email address", "Contact"));
            }
        }
        _ => {}
    }

    into_result(errors)
}

// ============================================================================
// CHECKOUT VALIDATION
// ============================================================================

/// Full-record check run by the orchestrator before any network call
pub fn validate_pet_for_checkout(pet: &PetRecord, pet_index: usize, today: NaiveDate) -> ValidationResult {
    let context = format!("Pet {}", pet_index + 1);
    let mut errors = Vec::new();

    if let Err(msg) = check_name(&pet.name) {
        errors.push(ValidationError::new("name", msg, &context));
    }
    if pet.species.is_none() {
        errors.push(ValidationError::new("species", "Required field is empty", &context));
    }
    if !pet.sex.is_set() {
        errors.push(ValidationError::new("sex", "Required field is empty", &context));
    }
    if let Err(msg) = check_origin_date(pet.date_of_origin, today) {
        errors.push(ValidationError::new("date_of_origin", msg, &context));
    }

    into_result(errors)
}
