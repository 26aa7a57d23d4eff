//! Versioned save records for issues and quests.
//!
//! Every persisted field lives under a stable integer key, so renaming a
//! Rust field never breaks an old save. A record also carries the schema
//! version it was written with and its template name. Loading:
//!
//! - rejects records newer than [`SCHEMA_VERSION`];
//! - ignores keys it does not know (written by a newer minor build);
//! - fails with [`QuestError::MissingField`] / [`QuestError::FieldType`]
//!   when a required field is absent or malformed.
//!
//! The bus is never persisted. Accepted quests re-register their
//! subscriptions when the board is restored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dialog::DeferredAction;
use crate::error::{QuestError, Result};
use crate::issue::{Issue, IssueState};
use crate::progress::{Journal, ProgressTracker};
use crate::quest::{Quest, QuestState};
use crate::template::{EffectBundle, QuestPayload, SupplyDelivery, TemplateKind, WeaponCommission};
use crate::types::{
    ActorId, CampaignTime, IssueFrequency, IssueId, ItemCategory, LogId, QuestId, SettlementId,
};

/// Highest record schema this build writes and reads.
pub const SCHEMA_VERSION: u16 = 1;

/// Stable field keys of a quest record.
pub mod quest_field {
    #![allow(missing_docs)]
    pub const QUEST_ID: u16 = 1;
    pub const ISSUE_ID: u16 = 2;
    pub const GIVER: u16 = 3;
    pub const STATE: u16 = 4;
    pub const CREATED_AT: u16 = 5;
    pub const DEADLINE: u16 = 6;
    pub const REWARD_GOLD: u16 = 7;
    pub const GIVER_NAME: u16 = 8;
    pub const PLACE_NAME: u16 = 9;
    pub const TARGET_CATEGORY: u16 = 10;
    pub const SETTLEMENT: u16 = 11;
    pub const MIN_VALUE: u16 = 20;
    pub const NEEDED: u16 = 21;
    pub const PAYOUT_MULTIPLIER: u16 = 22;
    pub const SUCCESS_EFFECTS: u16 = 25;
    pub const FAILURE_EFFECTS: u16 = 26;
    pub const RELATION_DELTA: u16 = 30;
    pub const PROGRESS_LOG: u16 = 40;
    pub const READY_LOG: u16 = 41;
    pub const JOURNAL: u16 = 50;
    pub const PENDING: u16 = 60;
}

/// Stable field keys of an issue record.
pub mod issue_field {
    #![allow(missing_docs)]
    pub const ISSUE_ID: u16 = 1;
    pub const OWNER: u16 = 2;
    pub const STATE: u16 = 3;
    pub const FREQUENCY: u16 = 4;
    pub const CREATED_AT: u16 = 5;
    pub const DEADLINE: u16 = 6;
    pub const QUEST_ID: u16 = 7;
    pub const TITLE: u16 = 8;
    pub const DESCRIPTION: u16 = 9;
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A single persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer (times, counts, gold).
    UInt(u64),
    /// String, including enum names.
    Text(String),
    /// Any engine identifier.
    Id(Uuid),
    /// A quest's journal.
    Journal(Journal),
    /// A reward or penalty bundle.
    Effects(EffectBundle),
}

impl FieldValue {
    fn shape(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Text(_) => "text",
            Self::Id(_) => "id",
            Self::Journal(_) => "journal",
            Self::Effects(_) => "effects",
        }
    }
}

/// One issue or quest, as integer-keyed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Schema version the record was written with.
    pub schema: u16,
    /// Template name (see [`TemplateKind::as_str`]).
    pub template: String,
    /// Field values by stable key.
    pub fields: BTreeMap<u16, FieldValue>,
}

impl Record {
    /// An empty record at the current schema.
    #[must_use]
    pub fn new(template: TemplateKind) -> Self {
        Self {
            schema: SCHEMA_VERSION,
            template: template.as_str().to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field.
    pub fn put(&mut self, key: u16, value: FieldValue) {
        self.fields.insert(key, value);
    }

    /// Set a field only when `value` is present.
    pub fn put_opt(&mut self, key: u16, value: Option<FieldValue>) {
        if let Some(value) = value {
            self.fields.insert(key, value);
        }
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, key: u16) -> Option<&FieldValue> {
        self.fields.get(&key)
    }

    /// Template tag, if this build knows it.
    ///
    /// # Errors
    /// `Corrupt` for a name no template uses.
    pub fn template_kind(&self) -> Result<TemplateKind> {
        TemplateKind::parse(&self.template)
            .ok_or_else(|| QuestError::Corrupt(format!("unknown template '{}'", self.template)))
    }

    fn check_schema(&self) -> Result<()> {
        if self.schema > SCHEMA_VERSION {
            return Err(QuestError::UnsupportedSchema {
                found: self.schema,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    fn required(&self, key: u16, name: &'static str) -> Result<&FieldValue> {
        self.get(key).ok_or(QuestError::MissingField { key, name })
    }

    fn uint(&self, key: u16, name: &'static str) -> Result<u64> {
        match self.required(key, name)? {
            FieldValue::UInt(v) => Ok(*v),
            _ => Err(QuestError::FieldType { key, expected: "uint" }),
        }
    }

    fn uint_opt(&self, key: u16) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(FieldValue::UInt(v)) => Ok(Some(*v)),
            Some(_) => Err(QuestError::FieldType { key, expected: "uint" }),
        }
    }

    fn u32(&self, key: u16, name: &'static str) -> Result<u32> {
        u32::try_from(self.uint(key, name)?).map_err(|_| QuestError::FieldType { key, expected: "u32" })
    }

    fn int(&self, key: u16, name: &'static str) -> Result<i64> {
        match self.required(key, name)? {
            FieldValue::Int(v) => Ok(*v),
            _ => Err(QuestError::FieldType { key, expected: "int" }),
        }
    }

    fn text(&self, key: u16, name: &'static str) -> Result<&str> {
        match self.required(key, name)? {
            FieldValue::Text(v) => Ok(v),
            _ => Err(QuestError::FieldType { key, expected: "text" }),
        }
    }

    fn text_opt(&self, key: u16) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(FieldValue::Text(v)) => Ok(Some(v)),
            Some(_) => Err(QuestError::FieldType { key, expected: "text" }),
        }
    }

    fn id(&self, key: u16, name: &'static str) -> Result<Uuid> {
        match self.required(key, name)? {
            FieldValue::Id(v) => Ok(*v),
            _ => Err(QuestError::FieldType { key, expected: "id" }),
        }
    }

    fn id_opt(&self, key: u16) -> Result<Option<Uuid>> {
        match self.get(key) {
            None => Ok(None),
            Some(FieldValue::Id(v)) => Ok(Some(*v)),
            Some(_) => Err(QuestError::FieldType { key, expected: "id" }),
        }
    }

    fn effects(&self, key: u16, name: &'static str) -> Result<EffectBundle> {
        match self.required(key, name)? {
            FieldValue::Effects(v) => Ok(v.clone()),
            _ => Err(QuestError::FieldType { key, expected: "effects" }),
        }
    }
}

fn log_id(value: Option<u64>, key: u16) -> Result<Option<LogId>> {
    value
        .map(|v| {
            u32::try_from(v)
                .map(LogId)
                .map_err(|_| QuestError::FieldType { key, expected: "u32" })
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// Quest codec
// ---------------------------------------------------------------------------

/// Encode a quest. Subscriptions are not part of the record.
#[must_use]
pub fn quest_to_record(quest: &Quest) -> Record {
    use quest_field as k;

    let mut r = Record::new(quest.payload.kind());
    r.put(k::QUEST_ID, FieldValue::Id(quest.id.0));
    r.put(k::ISSUE_ID, FieldValue::Id(quest.issue.0));
    r.put(k::GIVER, FieldValue::Id(quest.giver.0));
    r.put(k::STATE, FieldValue::Text(quest.state.as_str().to_string()));
    r.put(k::CREATED_AT, FieldValue::UInt(quest.created_at.0));
    r.put(k::DEADLINE, FieldValue::UInt(quest.deadline.0));
    r.put(k::REWARD_GOLD, FieldValue::UInt(u64::from(quest.reward_gold)));
    r.put(k::GIVER_NAME, FieldValue::Text(quest.giver_name.clone()));
    r.put(k::PLACE_NAME, FieldValue::Text(quest.place_name.clone()));
    r.put_opt(k::SETTLEMENT, quest.settlement.map(|s| FieldValue::Id(s.0)));
    r.put(k::RELATION_DELTA, FieldValue::Int(i64::from(quest.relation_delta)));
    r.put_opt(
        k::PROGRESS_LOG,
        quest.tracker.progress_log.map(|l| FieldValue::UInt(u64::from(l.0))),
    );
    r.put_opt(
        k::READY_LOG,
        quest.tracker.ready_log.map(|l| FieldValue::UInt(u64::from(l.0))),
    );
    r.put(k::JOURNAL, FieldValue::Journal(quest.journal.clone()));
    r.put_opt(
        k::PENDING,
        quest.pending.map(|p| FieldValue::Text(p.as_str().to_string())),
    );

    match &quest.payload {
        QuestPayload::WeaponCommission(p) => {
            r.put(k::TARGET_CATEGORY, FieldValue::Text(p.category.0.clone()));
            r.put(k::MIN_VALUE, FieldValue::UInt(u64::from(p.min_value)));
            r.put(k::PAYOUT_MULTIPLIER, FieldValue::UInt(u64::from(p.payout_multiplier)));
            r.put(k::SUCCESS_EFFECTS, FieldValue::Effects(p.success.clone()));
            r.put(k::FAILURE_EFFECTS, FieldValue::Effects(p.failure.clone()));
        }
        QuestPayload::SupplyDelivery(p) => {
            r.put(k::TARGET_CATEGORY, FieldValue::Text(p.category.0.clone()));
            r.put(k::NEEDED, FieldValue::UInt(u64::from(p.needed)));
            r.put(k::SUCCESS_EFFECTS, FieldValue::Effects(p.success.clone()));
            r.put(k::FAILURE_EFFECTS, FieldValue::Effects(p.failure.clone()));
        }
    }
    r
}

/// Decode a quest. The result holds no subscription; call
/// [`Quest::resume`] once it is back on a board.
///
/// # Errors
/// Schema, template and field errors as described in the module docs.
pub fn quest_from_record(r: &Record) -> Result<Quest> {
    use quest_field as k;

    r.check_schema()?;
    let kind = r.template_kind()?;
    let category = ItemCategory::new(r.text(k::TARGET_CATEGORY, "target_category")?);
    let success = r.effects(k::SUCCESS_EFFECTS, "success_effects")?;
    let failure = r.effects(k::FAILURE_EFFECTS, "failure_effects")?;
    let payload = match kind {
        TemplateKind::WeaponCommission => QuestPayload::WeaponCommission(WeaponCommission {
            category,
            min_value: r.u32(k::MIN_VALUE, "min_value")?,
            payout_multiplier: r.u32(k::PAYOUT_MULTIPLIER, "payout_multiplier")?,
            success,
            failure,
        }),
        TemplateKind::SupplyDelivery => QuestPayload::SupplyDelivery(SupplyDelivery {
            category,
            needed: r.u32(k::NEEDED, "needed")?,
            success,
            failure,
        }),
    };

    let state_name = r.text(k::STATE, "state")?;
    let state = QuestState::parse(state_name)
        .ok_or_else(|| QuestError::Corrupt(format!("unknown quest state '{state_name}'")))?;
    let pending = r
        .text_opt(k::PENDING)?
        .map(|name| {
            DeferredAction::parse(name)
                .ok_or_else(|| QuestError::Corrupt(format!("unknown deferred action '{name}'")))
        })
        .transpose()?;
    let journal = match r.required(k::JOURNAL, "journal")? {
        FieldValue::Journal(j) => j.clone(),
        _ => {
            return Err(QuestError::FieldType {
                key: k::JOURNAL,
                expected: "journal",
            })
        }
    };
    let relation_delta = i32::try_from(r.int(k::RELATION_DELTA, "relation_delta")?).map_err(|_| {
        QuestError::FieldType {
            key: k::RELATION_DELTA,
            expected: "i32",
        }
    })?;

    let (filter, required) = payload.template().objective();
    let mut tracker = ProgressTracker::new(filter, required);
    tracker.progress_log = log_id(r.uint_opt(k::PROGRESS_LOG)?, k::PROGRESS_LOG)?;
    tracker.ready_log = log_id(r.uint_opt(k::READY_LOG)?, k::READY_LOG)?;

    Ok(Quest {
        id: QuestId(r.id(k::QUEST_ID, "quest_id")?),
        issue: IssueId(r.id(k::ISSUE_ID, "issue_id")?),
        giver: ActorId(r.id(k::GIVER, "giver")?),
        giver_name: r.text(k::GIVER_NAME, "giver_name")?.to_string(),
        place_name: r.text(k::PLACE_NAME, "place_name")?.to_string(),
        settlement: r.id_opt(k::SETTLEMENT)?.map(SettlementId),
        payload,
        state,
        created_at: CampaignTime(r.uint(k::CREATED_AT, "created_at")?),
        deadline: CampaignTime(r.uint(k::DEADLINE, "deadline")?),
        reward_gold: r.u32(k::REWARD_GOLD, "reward_gold")?,
        journal,
        tracker,
        relation_delta,
        pending,
        subscription: None,
    })
}

// ---------------------------------------------------------------------------
// Issue codec
// ---------------------------------------------------------------------------

/// Encode an issue.
#[must_use]
pub fn issue_to_record(issue: &Issue) -> Record {
    use issue_field as k;

    let mut r = Record::new(issue.kind);
    r.put(k::ISSUE_ID, FieldValue::Id(issue.id.0));
    r.put(k::OWNER, FieldValue::Id(issue.owner.0));
    r.put(k::STATE, FieldValue::Text(issue.state.as_str().to_string()));
    r.put(k::FREQUENCY, FieldValue::Text(issue.frequency.as_str().to_string()));
    r.put(k::CREATED_AT, FieldValue::UInt(issue.created_at.0));
    r.put(k::DEADLINE, FieldValue::UInt(issue.deadline.0));
    r.put_opt(k::QUEST_ID, issue.quest.map(|q| FieldValue::Id(q.0)));
    r.put(k::TITLE, FieldValue::Text(issue.title.clone()));
    r.put(k::DESCRIPTION, FieldValue::Text(issue.description.clone()));
    r
}

/// Decode an issue.
///
/// # Errors
/// Schema, template and field errors as described in the module docs.
pub fn issue_from_record(r: &Record) -> Result<Issue> {
    use issue_field as k;

    r.check_schema()?;
    let kind = r.template_kind()?;
    let state_name = r.text(k::STATE, "state")?;
    let state = IssueState::parse(state_name)
        .ok_or_else(|| QuestError::Corrupt(format!("unknown issue state '{state_name}'")))?;
    let frequency_name = r.text(k::FREQUENCY, "frequency")?;
    let frequency = IssueFrequency::parse(frequency_name)
        .ok_or_else(|| QuestError::Corrupt(format!("unknown frequency '{frequency_name}'")))?;

    Ok(Issue {
        id: IssueId(r.id(k::ISSUE_ID, "issue_id")?),
        owner: ActorId(r.id(k::OWNER, "owner")?),
        kind,
        frequency,
        created_at: CampaignTime(r.uint(k::CREATED_AT, "created_at")?),
        deadline: CampaignTime(r.uint(k::DEADLINE, "deadline")?),
        state,
        quest: r.id_opt(k::QUEST_ID)?.map(QuestId),
        title: r.text(k::TITLE, "title")?.to_string(),
        description: r.text(k::DESCRIPTION, "description")?.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the board persists, ready for the host's save container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Schema version of the snapshot envelope.
    pub schema: u16,
    /// Wall-clock time the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Issue records.
    pub issues: Vec<Record>,
    /// Quest records, live and archived.
    pub quests: Vec<Record>,
}

impl BoardSnapshot {
    /// A snapshot at the current schema, stamped now.
    #[must_use]
    pub fn new(issues: Vec<Record>, quests: Vec<Record>) -> Self {
        Self {
            schema: SCHEMA_VERSION,
            saved_at: Utc::now(),
            issues,
            quests,
        }
    }

    /// Encode as MessagePack (field names kept).
    ///
    /// # Errors
    /// Returns `QuestError::Serialization` on encoder failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| QuestError::Serialization(e.to_string()))
    }

    /// Decode MessagePack written by [`Self::to_bytes`].
    ///
    /// # Errors
    /// Returns `QuestError::Serialization` on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| QuestError::Serialization(e.to_string()))
    }

    /// Encode as pretty-printed JSON, for inspection and debugging.
    ///
    /// # Errors
    /// Returns `QuestError::Serialization` on encoder failure.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| QuestError::Serialization(e.to_string()))
    }

    /// Decode JSON written by [`Self::to_json`].
    ///
    /// # Errors
    /// Returns `QuestError::Serialization` on malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| QuestError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusHandle;
    use crate::config::SidequestConfig;
    use crate::template::{IssueTemplate, TemplateCatalog};
    use crate::types::ItemStack;
    use crate::world::sandbox::SandboxWorld;
    use crate::world::{ActorProfile, ActorRoles};

    fn accepted_weapon_quest() -> (Quest, SandboxWorld) {
        let mut world = SandboxWorld::new();
        let giver = world.add_actor(
            ActorProfile::new(ActorId::new(), "Lady Ira")
                .with_roles(ActorRoles {
                    is_faction_leader: true,
                    has_party: true,
                    ..ActorRoles::default()
                })
                .with_primary_weapon("polearm"),
        );
        let catalog = TemplateCatalog::new(&SidequestConfig::default()).expect("catalog");
        let seed = catalog
            .get(TemplateKind::WeaponCommission)
            .expect("weapon")
            .generate_quest(&world, giver)
            .expect("seed");
        let mut quest = Quest::from_seed(&world, IssueId::new(), giver, seed, CampaignTime::ZERO, 20);
        world.give_item(ItemStack::new("glaive", "polearm", 4000, 1));
        quest
            .accept(&mut world, &BusHandle::new(), CampaignTime::ZERO)
            .expect("accept");
        (quest, world)
    }

    #[test]
    fn quest_record_restores_every_field() {
        let (quest, _world) = accepted_weapon_quest();
        let record = quest_to_record(&quest);
        assert_eq!(record.template, "weapon_commission");

        let restored = quest_from_record(&record).expect("decode");
        assert_eq!(restored.id(), quest.id());
        assert_eq!(restored.state(), QuestState::Accepted);
        assert_eq!(restored.payload(), quest.payload());
        assert_eq!(restored.journal(), quest.journal());
        assert_eq!(restored.progress(), Some((1, 1)));
        assert!(restored.objective_met());
        assert!(!restored.is_subscribed());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let (quest, _world) = accepted_weapon_quest();
        let mut record = quest_to_record(&quest);
        record.put(999, FieldValue::Text("from a newer build".into()));
        assert!(quest_from_record(&record).is_ok());
    }

    #[test]
    fn missing_field_names_its_key() {
        let (quest, _world) = accepted_weapon_quest();
        let mut record = quest_to_record(&quest);
        record.fields.remove(&quest_field::DEADLINE);
        assert!(matches!(
            quest_from_record(&record),
            Err(QuestError::MissingField {
                key: quest_field::DEADLINE,
                ..
            })
        ));
    }

    #[test]
    fn wrong_shape_is_a_type_error() {
        let (quest, _world) = accepted_weapon_quest();
        let mut record = quest_to_record(&quest);
        record.put(quest_field::REWARD_GOLD, FieldValue::Text("lots".into()));
        assert!(matches!(
            quest_from_record(&record),
            Err(QuestError::FieldType { .. })
        ));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let (quest, _world) = accepted_weapon_quest();
        let mut record = quest_to_record(&quest);
        record.schema = SCHEMA_VERSION + 1;
        assert!(matches!(
            quest_from_record(&record),
            Err(QuestError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn unknown_template_is_corrupt() {
        let (quest, _world) = accepted_weapon_quest();
        let mut record = quest_to_record(&quest);
        record.template = "escort".into();
        assert!(matches!(quest_from_record(&record), Err(QuestError::Corrupt(_))));
    }

    #[test]
    fn snapshot_survives_both_codecs() {
        let (quest, _world) = accepted_weapon_quest();
        let snapshot = BoardSnapshot::new(Vec::new(), vec![quest_to_record(&quest)]);

        let bytes = snapshot.to_bytes().expect("msgpack");
        assert_eq!(BoardSnapshot::from_bytes(&bytes).expect("decode"), snapshot);

        let json = snapshot.to_json().expect("json");
        assert_eq!(BoardSnapshot::from_json(&json).expect("decode"), snapshot);
    }
}
