// ⚙️ Configuration - operator flags and defaults
//
// Read from the environment (a `.env` file is honoured by the binary).

use crate::pricing::Tier;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Operator flag enabling the test topology and payment bypass
    pub dev_mode: bool,

    /// Tier every pet starts with on the checkout view
    pub default_tier: Tier,

    /// Gift flows start each pet at its entitled tier instead
    pub gift_entitled_tier_default: bool,

    pub storage_path: PathBuf,
    pub backend_url: String,

    /// Language forwarded with every report
    pub language: String,
    pub referral_code: Option<String>,
    pub coupon_code: Option<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            dev_mode: false,
            default_tier: Tier::Mid,
            gift_entitled_tier_default: false,
            storage_path: PathBuf::from("pet_intake.db"),
            backend_url: "http://localhost:8787".to_string(),
            language: "en".to_string(),
            referral_code: None,
            coupon_code: None,
        }
    }
}

impl FlowConfig {
    /// Defaults overridden by PET_INTAKE_* variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = FlowConfig::default();

        if let Some(value) = lookup("PET_INTAKE_DEV_MODE") {
            config.dev_mode = parse_flag(&value);
        }
        if let Some(value) = lookup("PET_INTAKE_DEFAULT_TIER") {
            match Tier::parse(&value) {
                Some(tier) => config.default_tier = tier,
                None => bail!("PET_INTAKE_DEFAULT_TIER must be basic, mid or top (got {:?})", value),
            }
        }
        if let Some(value) = lookup("PET_INTAKE_GIFT_ENTITLED_TIERS") {
            config.gift_entitled_tier_default = parse_flag(&value);
        }
        if let Some(value) = lookup("PET_INTAKE_DB") {
            config.storage_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("PET_INTAKE_BACKEND_URL") {
            config.backend_url = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup("PET_INTAKE_LANGUAGE") {
            config.language = value;
        }
        config.referral_code = lookup("PET_INTAKE_REFERRAL").filter(|v| !v.trim().is_empty());
        config.coupon_code = lookup("PET_INTAKE_COUPON").filter(|v| !v.trim().is_empty());

        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
