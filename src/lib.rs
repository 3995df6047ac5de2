// Pet Intake - Core Library
// Exposes the intake flow, pricing and checkout for the CLI and tests

pub mod config;
pub mod collaborators;  // Hosted service contracts + in-memory stand-in
pub mod dev;            // Operator shortcuts (synthetic data)
pub mod entities;       // Pet, owner, species trait tables
pub mod error;
pub mod flow;           // Reducer + IntakeFlow controller
pub mod gift;           // Gift entitlement + code validation
pub mod http;           // reqwest-backed collaborators
pub mod orchestrator;   // Checkout: validate → reports → branch
pub mod persistence;    // Progress snapshots in SQLite
pub mod pricing;
pub mod steps;          // Step graph per topology
pub mod validation;

// Re-export commonly used types
pub use collaborators::{
    CheckoutService, GiftRedeemer, GiftValidator, InMemoryBackend, ReportService, SubscriberBeacon,
};
pub use config::FlowConfig;
pub use entities::{
    AcquisitionMode, OwnerField, OwnerRecord, PetField, PetRecord, Sex, Species, TraitKind,
};
pub use error::{CheckoutError, FlowError, GiftError};
pub use flow::{reduce, FlowEvent, FlowProgress, FlowState, IntakeFlow};
pub use gift::{normalize_code, validate_gift_code, GiftEntitlement};
pub use http::HttpBackend;
pub use orchestrator::{CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, SuccessDestination};
pub use persistence::{MemoryProgressStore, ProgressSnapshot, ProgressStore, SqliteProgressStore};
pub use pricing::{CheckoutQuote, CheckoutSelection, PriceBreakdown, PricingEngine, Tier};
pub use steps::{StepGraph, StepPosition, StepTag, Topology};
pub use validation::{ValidationError, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Most pets a single intake can carry
pub const MAX_PETS: usize = gift::MAX_PETS;
