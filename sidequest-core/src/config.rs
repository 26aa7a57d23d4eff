//! Configuration for the sidequest engine.
//!
//! Maps directly to `sidequest.toml`. Every section is optional; missing
//! keys fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{QuestError, Result};
use crate::types::IssueFrequency;

/// Top-level sidequest configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SidequestConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Issue and quest lifetimes, shared accept thresholds.
    #[serde(default)]
    pub issues: IssueConfig,
    /// The noble-wants-a-weapon template.
    #[serde(default)]
    pub weapon_commission: WeaponCommissionConfig,
    /// The starving-town-needs-supplies template.
    #[serde(default)]
    pub supply_delivery: SupplyDeliveryConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl SidequestConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `QuestError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| QuestError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values no template can run with.
    ///
    /// # Errors
    /// Returns `QuestError::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.issues.issue_duration_days == 0 {
            return Err(QuestError::Config("issues.issue_duration_days must be > 0".into()));
        }
        if self.issues.quest_duration_days == 0 {
            return Err(QuestError::Config("issues.quest_duration_days must be > 0".into()));
        }
        if self.persistence.snapshots_per_campaign == 0 {
            return Err(QuestError::Config(
                "persistence.snapshots_per_campaign must be > 0".into(),
            ));
        }
        if self.weapon_commission.payout_multiplier == 0 {
            return Err(QuestError::Config(
                "weapon_commission.payout_multiplier must be > 0".into(),
            ));
        }
        let supply = &self.supply_delivery;
        if supply.enabled {
            if supply.category.trim().is_empty() {
                return Err(QuestError::Config("supply_delivery.category is empty".into()));
            }
            if supply.needed == 0 {
                return Err(QuestError::Config("supply_delivery.needed must be > 0".into()));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the engine offers issues at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

/// Lifetimes and shared accept-time thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueConfig {
    /// Days an issue stays on offer before it expires.
    #[serde(default = "default_20_u32")]
    pub issue_duration_days: u32,
    /// Days the player has to finish an accepted quest.
    #[serde(default = "default_20_u32")]
    pub quest_duration_days: u32,
    /// Relations strictly below this block acceptance with reason `Relation`.
    #[serde(default = "default_min_relation")]
    pub min_relation_to_accept: i32,
    /// Closed issues, with their archived quests, kept for lookup and
    /// saves. The oldest are dropped first; 0 keeps none.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            issue_duration_days: 20,
            quest_duration_days: 20,
            min_relation_to_accept: default_min_relation(),
            history_limit: default_history_limit(),
        }
    }
}

/// Tuning for the weapon commission template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponCommissionConfig {
    /// Whether the template is registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scheduler hint.
    #[serde(default = "default_rare")]
    pub frequency: IssueFrequency,
    /// Minimum value of a qualifying weapon.
    #[serde(default = "default_3000")]
    pub min_value: u32,
    /// The giver pays this many times the weapon's value.
    #[serde(default = "default_2_u32")]
    pub payout_multiplier: u32,
    /// Relation change on success.
    #[serde(default = "default_10")]
    pub success_relation: i32,
    /// Relation change on timeout.
    #[serde(default = "default_minus_5")]
    pub failure_relation: i32,
}

impl Default for WeaponCommissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: IssueFrequency::Rare,
            min_value: 3000,
            payout_multiplier: 2,
            success_relation: 10,
            failure_relation: -5,
        }
    }
}

/// Tuning for the supply delivery template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyDeliveryConfig {
    /// Whether the template is registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scheduler hint.
    #[serde(default = "default_common")]
    pub frequency: IssueFrequency,
    /// Category of the goods the town needs.
    #[serde(default = "default_supply_category")]
    pub category: String,
    /// How many items must be handed over.
    #[serde(default = "default_20_u32")]
    pub needed: u32,
    /// Gold paid on success.
    #[serde(default = "default_reward_gold")]
    pub reward_gold: u32,
    /// Relation change on success.
    #[serde(default = "default_10")]
    pub success_relation: i32,
    /// Relation change on timeout.
    #[serde(default = "default_minus_5")]
    pub failure_relation: i32,
    /// Giver power change on success.
    #[serde(default = "default_25")]
    pub success_power: i32,
    /// Giver power change on timeout.
    #[serde(default = "default_minus_5")]
    pub failure_power: i32,
    /// Settlement prosperity change on success.
    #[serde(default = "default_50")]
    pub success_prosperity: i32,
    /// Settlement prosperity change on timeout.
    #[serde(default = "default_minus_10")]
    pub failure_prosperity: i32,
    /// Settlement militia change on success.
    #[serde(default = "default_20")]
    pub success_militia: i32,
    /// Mercy experience granted on success.
    #[serde(default = "default_50")]
    pub mercy_xp: i32,
    /// Generosity experience granted on success.
    #[serde(default = "default_30")]
    pub generosity_xp: i32,
}

impl Default for SupplyDeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: IssueFrequency::Common,
            category: default_supply_category(),
            needed: 20,
            reward_gold: default_reward_gold(),
            success_relation: 10,
            failure_relation: -5,
            success_power: 25,
            failure_power: -5,
            success_prosperity: 50,
            failure_prosperity: -10,
            success_militia: 20,
            mercy_xp: 50,
            generosity_xp: 30,
        }
    }
}

/// Settings for stores that keep board snapshots outside the host save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use SQLite WAL mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Snapshots kept per campaign; older ones are pruned on save.
    #[serde(default = "default_3_u32")]
    pub snapshots_per_campaign: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            snapshots_per_campaign: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde requires fn pointers)
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}
fn default_supply_category() -> String {
    "grain".into()
}
fn default_rare() -> IssueFrequency {
    IssueFrequency::Rare
}
fn default_common() -> IssueFrequency {
    IssueFrequency::Common
}
fn default_2_u32() -> u32 {
    2
}
fn default_3_u32() -> u32 {
    3
}
fn default_20_u32() -> u32 {
    20
}
fn default_3000() -> u32 {
    3000
}
fn default_reward_gold() -> u32 {
    1500
}
fn default_history_limit() -> u32 {
    50
}
fn default_min_relation() -> i32 {
    -10
}
fn default_minus_5() -> i32 {
    -5
}
fn default_minus_10() -> i32 {
    -10
}
fn default_10() -> i32 {
    10
}
fn default_20() -> i32 {
    20
}
fn default_25() -> i32 {
    25
}
fn default_30() -> i32 {
    30
}
fn default_50() -> i32 {
    50
}
