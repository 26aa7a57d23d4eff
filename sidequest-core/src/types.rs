//! Core type definitions shared by every sidequest module.
//!
//! All types are serializable; identifiers are UUID newtypes so that a save
//! written on one machine resolves to the same entities on another.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// An actor in the host world: a hero, a notable, a clan, the player.
    ActorId
);
uuid_id!(
    /// A kingdom or any other faction that can declare war.
    FactionId
);
uuid_id!(
    /// A town, castle or village.
    SettlementId
);
uuid_id!(
    /// A single issue instance.
    IssueId
);
uuid_id!(
    /// A single quest instance.
    QuestId
);
uuid_id!(
    /// A battle, raid or siege on the campaign map.
    MapEventId
);

/// Identifier of a journal entry, unique within one quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogId(pub u32);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Host item identifier (e.g. `"vlandian_pike"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    /// Wrap a host item identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Item classification used by objectives (weapon class, trade good type).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemCategory(pub String);

impl ItemCategory {
    /// Wrap a host category name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The category name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stack of identical items in an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Host item identifier.
    pub item: ItemId,
    /// Category the item belongs to.
    pub category: ItemCategory,
    /// Value of a single item, in the host currency.
    pub value: u32,
    /// Number of items in the stack.
    pub count: u32,
}

impl ItemStack {
    /// Create a stack.
    #[must_use]
    pub fn new(item: impl Into<String>, category: impl Into<String>, value: u32, count: u32) -> Self {
        Self {
            item: ItemId::new(item),
            category: ItemCategory::new(category),
            value,
            count,
        }
    }
}

// ---------------------------------------------------------------------------
// Campaign Time
// ---------------------------------------------------------------------------

/// Ticks per in-game hour.
pub const TICKS_PER_HOUR: u64 = 1_000;
/// Ticks per in-game day.
pub const TICKS_PER_DAY: u64 = 24 * TICKS_PER_HOUR;

/// A point on the campaign clock, in ticks since campaign start.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CampaignTime(pub u64);

impl CampaignTime {
    /// Campaign start.
    pub const ZERO: Self = Self(0);

    /// The start of the given campaign day.
    #[must_use]
    pub const fn from_days(days: u64) -> Self {
        Self(days.saturating_mul(TICKS_PER_DAY))
    }

    /// The start of the given campaign hour.
    #[must_use]
    pub const fn from_hours(hours: u64) -> Self {
        Self(hours.saturating_mul(TICKS_PER_HOUR))
    }

    /// This time shifted forward by whole days.
    #[must_use]
    pub const fn plus_days(self, days: u32) -> Self {
        Self(self.0.saturating_add(days as u64 * TICKS_PER_DAY))
    }

    /// This time shifted forward by raw ticks.
    #[must_use]
    pub const fn plus_ticks(self, ticks: u64) -> Self {
        Self(self.0.saturating_add(ticks))
    }

    /// Whether this time, used as a deadline, has passed at `now`.
    #[must_use]
    pub fn has_elapsed(self, now: Self) -> bool {
        now >= self
    }

    /// Whole days remaining until this time, zero once passed.
    #[must_use]
    pub fn days_until(self, now: Self) -> u64 {
        self.0.saturating_sub(now.0) / TICKS_PER_DAY
    }
}

impl fmt::Display for CampaignTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = self.0 / TICKS_PER_DAY;
        let hour = (self.0 % TICKS_PER_DAY) / TICKS_PER_HOUR;
        write!(f, "day {day}, {hour:02}h")
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How often the external scheduler should consider offering an issue type.
///
/// A tuning hint only; the scheduler's policy is host-owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFrequency {
    /// Offered almost everywhere it applies.
    VeryCommon,
    /// The usual rate.
    Common,
    /// Less often than usual.
    Uncommon,
    /// Seldom offered.
    Rare,
    /// Almost never offered.
    VeryRare,
}

impl IssueFrequency {
    /// Stable lowercase name, used in save records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryCommon => "very_common",
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::VeryRare => "very_rare",
        }
    }

    /// Parse the name written by [`Self::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "very_common" => Some(Self::VeryCommon),
            "common" => Some(Self::Common),
            "uncommon" => Some(Self::Uncommon),
            "rare" => Some(Self::Rare),
            "very_rare" => Some(Self::VeryRare),
            _ => None,
        }
    }
}

/// Personality traits the player can gain experience in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    /// Compassion towards the weak.
    Mercy,
    /// Willingness to give.
    Generosity,
    /// Keeping one's word.
    Honor,
    /// Courage in battle.
    Valor,
}
