// Entity Models - what the intake flow collects
//
// Each pet is a plain value in an ordered collection; the owner record is
// shared once per order and lives outside that collection.

pub mod owner;
pub mod pet;
pub mod species;

pub use owner::{OwnerField, OwnerRecord};
pub use pet::{AcquisitionMode, PetField, PetRecord, Sex};
pub use species::{Species, TraitKind, TraitTable, UNSURE};
