// 🧪 Dev Mode - synthetic data for operator shortcuts
//
// Only reachable when the operator flag is set. Fills pets whose name is
// still empty so a flow can jump straight to owner details or checkout.

use crate::entities::{OwnerRecord, PetRecord, Sex, Species, UNSURE};
use chrono::NaiveDate;

const SAMPLE_NAMES: [&str; 5] = ["Biscuit", "Luna", "Pepper", "Mochi", "Ziggy"];
const SAMPLE_SPECIES: [Species; 5] = [Species::Dog, Species::Cat, Species::Rabbit, Species::Bird, Species::Dog];

pub const TEST_EMAIL: &str = "dev-test@example.com";

/// Synthetic but fully valid pet for position `index`
pub fn synthetic_pet(index: usize, email: &str) -> PetRecord {
    let species = SAMPLE_SPECIES[index % SAMPLE_SPECIES.len()];
    let table = species.traits();

    PetRecord {
        name: SAMPLE_NAMES[index % SAMPLE_NAMES.len()].to_string(),
        species: Some(species),
        breed: String::new(),
        sex: if index % 2 == 0 { Sex::Male } else { Sex::Female },
        date_of_origin: NaiveDate::from_ymd_opt(2020, 1 + (index as u32 % 12), 15),
        time_of_origin: "08:30".to_string(),
        location: "London, UK".to_string(),
        soul_archetype: table.soul_archetypes.first().map(|s| s.to_string()),
        special_trait: Some(UNSURE.to_string()),
        social_reaction: table.social_reactions.first().map(|s| s.to_string()),
        email: email.to_string(),
        ..PetRecord::empty()
    }
}

/// Fill every unnamed pet in place; keeps acquisition mode and photo.
/// Returns how many pets were filled.
pub fn fill_unnamed(pets: &mut [PetRecord]) -> usize {
    let email = pets
        .iter()
        .map(|p| p.email.trim())
        .find(|e| !e.is_empty())
        .unwrap_or(TEST_EMAIL)
        .to_string();

    let mut filled = 0;
    for (index, pet) in pets.iter_mut().enumerate() {
        if pet.has_name() {
            if pet.email.trim().is_empty() {
                pet.email = email.clone();
            }
            continue;
        }
        let mut synthetic = synthetic_pet(index, &email);
        synthetic.acquisition_mode = pet.acquisition_mode;
        synthetic.photo_url = pet.photo_url.take();
        *pet = synthetic;
        filled += 1;
    }
    filled
}

pub fn synthetic_owner() -> OwnerRecord {
    OwnerRecord {
        name: "Dev Tester".to_string(),
        date_of_origin: NaiveDate::from_ymd_opt(1990, 5, 20),
        time_of_origin: String::new(),
        location: "London, UK".to_string(),
    }
}

/// Marker handed to the success destination instead of a payment session
pub fn synthetic_session_id() -> String {
    format!("dev_test_{}", uuid::Uuid::new_v4().simple())
}
