// 🧑 Owner Entity - shared once across all pets
//
// Independent lifecycle from pet records: created lazily the first time
// an owner field is set, persisted under its own key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerRecord {
    pub name: String,
    pub date_of_origin: Option<NaiveDate>,
    pub time_of_origin: String,
    pub location: String,
}

impl OwnerRecord {
    /// Owner step is optional; an empty record is simply not sent
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
            && self.date_of_origin.is_none()
            && self.time_of_origin.trim().is_empty()
            && self.location.trim().is_empty()
    }

    pub fn apply(&mut self, field: OwnerField) {
        match field {
            OwnerField::Name(name) => self.name = name,
            OwnerField::DateOfOrigin(date) => self.date_of_origin = date,
            OwnerField::TimeOfOrigin(time) => self.time_of_origin = time,
            OwnerField::Location(location) => self.location = location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum OwnerField {
    Name(String),
    DateOfOrigin(Option<NaiveDate>),
    TimeOfOrigin(String),
    Location(String),
}
