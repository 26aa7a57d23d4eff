//! Campaign-side configuration and tracing bootstrap.
//!
//! One TOML file carries both the engine sections (`[general]`,
//! `[issues]`, `[weapon_commission]`, ...) and a `[campaign]` section
//! with the knobs only the campaign rule uses.

use serde::{Deserialize, Serialize};
use sidequest_core::config::SidequestConfig;
use sidequest_core::types::TICKS_PER_DAY;
use tracing_subscriber::EnvFilter;

use crate::error::{CampaignError, Result};

/// Engine configuration plus campaign knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Engine sections, at the top level of the file.
    #[serde(flatten)]
    pub core: SidequestConfig,
    /// Campaign rule settings.
    #[serde(default)]
    pub campaign: CampaignSettings,
}

/// The `[campaign]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSettings {
    /// Ticks between issue re-evaluation passes.
    #[serde(default = "default_reevaluate_interval")]
    pub reevaluate_interval_ticks: u64,
    /// Ticks between autosave requests; 0 disables autosave.
    #[serde(default)]
    pub autosave_interval_ticks: u64,
    /// Key of this campaign in the snapshot store.
    #[serde(default = "default_campaign_id")]
    pub campaign_id: String,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
}

fn default_reevaluate_interval() -> u64 {
    TICKS_PER_DAY
}
fn default_campaign_id() -> String {
    "sidequest".to_string()
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            reevaluate_interval_ticks: default_reevaluate_interval(),
            autosave_interval_ticks: 0,
            campaign_id: default_campaign_id(),
            json_logs: false,
        }
    }
}

impl CampaignConfig {
    /// Load from a TOML string.
    ///
    /// # Errors
    /// Returns `CampaignError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| CampaignError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate engine and campaign settings.
    ///
    /// # Errors
    /// Returns the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.core.validate()?;
        if self.campaign.reevaluate_interval_ticks == 0 {
            return Err(CampaignError::Config(
                "campaign.reevaluate_interval_ticks must be > 0".into(),
            ));
        }
        if self.campaign.campaign_id.trim().is_empty() {
            return Err(CampaignError::Config("campaign.campaign_id is empty".into()));
        }
        Ok(())
    }
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `general.log_level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(config: &CampaignConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.core.general.log_level));
    let installed = if config.campaign.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    installed.is_ok()
}
