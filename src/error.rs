// 🚨 Error Types - what can go wrong between intake and checkout
//
// Validation errors stay local and never reach the network.
// Collaborator errors are retryable and leave flow state untouched.

use crate::validation::ValidationError;
use thiserror::Error;

// ============================================================================
// FLOW ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum FlowError {
    /// The current step's input is not acceptable yet
    #[error("step cannot advance: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    /// Operator-only action attempted outside dev mode
    #[error("dev shortcuts are disabled")]
    DevModeDisabled,

    /// Pet index outside the declared collection
    #[error("no pet at position {index} (pet count is {count})")]
    NoSuchPet { index: usize, count: usize },

    /// Durable storage failed (never blocks navigation)
    #[error("progress storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}

// ============================================================================
// GIFT ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GiftError {
    #[error("please enter a gift code")]
    EmptyCode,

    /// Validator answered but rejected the code
    #[error("gift code rejected: {0}")]
    Rejected(String),

    /// Validator could not be reached or returned garbage
    #[error("could not validate gift code: {0}")]
    Unavailable(String),
}

// ============================================================================
// CHECKOUT ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A pet record failed validation; `pet_number` is 1-based for display
    #[error("Pet {pet_number}: {}", join_errors(.errors))]
    InvalidPet {
        pet_number: usize,
        errors: Vec<ValidationError>,
    },

    #[error("please enter a valid email address")]
    InvalidEmail,

    /// Several pets are entitled to portraits and none were chosen
    #[error("please choose which pets get a portrait")]
    MissingPortraitSelection,

    /// Gift portraits were entitled but photos are missing
    #[error("please upload a photo for {0}")]
    MissingPortraitPhoto(String),

    /// Test-mode submission without the operator flag
    #[error("test mode is disabled")]
    DevModeDisabled,

    #[error("could not create reports: {0}")]
    ReportCreation(String),

    #[error("could not redeem gift: {0}")]
    Redemption(String),

    #[error("could not start checkout: {0}")]
    CheckoutSession(String),
}

impl CheckoutError {
    /// Collaborator failures can be retried without re-entering data
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::ReportCreation(_)
                | CheckoutError::Redemption(_)
                | CheckoutError::CheckoutSession(_)
        )
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
