//! Issue templates — data plus a fixed set of hooks.
//!
//! Each template contributes two halves:
//!
//! - an **issue side** ([`IssueTemplate`]) built from configuration, which
//!   decides eligibility, survival, titles, accept preconditions and what
//!   quest to generate;
//! - a **quest side** ([`QuestTemplate`]) carried inside the quest as a
//!   [`QuestPayload`], which supplies the objective, texts, dialog lines and
//!   the reward and penalty actions.
//!
//! Every hook is a required trait method, so a template missing one does
//! not compile; [`TemplateCatalog::new`] rejects unusable tuning before any
//! issue is offered.

pub mod supply;
pub mod weapon;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SidequestConfig;
use crate::dialog::DialogLines;
use crate::error::{QuestError, Result};
use crate::events::EventKind;
use crate::predicate::{AcceptBlocked, ItemFilter};
use crate::types::{ActorId, IssueFrequency, ItemStack, SettlementId, TraitKind};
use crate::world::{Action, Host, WorldQuery};

pub use supply::{SupplyDelivery, SupplyDeliveryTemplate};
pub use weapon::{WeaponCommission, WeaponCommissionTemplate};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Tag of every known template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    /// A noble wants a fine weapon of their favoured class.
    WeaponCommission,
    /// A starving town's merchant needs supplies.
    SupplyDelivery,
}

impl TemplateKind {
    /// Stable name, used in save records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WeaponCommission => "weapon_commission",
            Self::SupplyDelivery => "supply_delivery",
        }
    }

    /// Parse the name written by [`Self::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weapon_commission" => Some(Self::WeaponCommission),
            "supply_delivery" => Some(Self::SupplyDelivery),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// World changes applied once when a quest succeeds or fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectBundle {
    /// Relation change with the giver.
    pub relation: i32,
    /// Power change of the giver.
    pub giver_power: i32,
    /// Prosperity change of the giver's settlement.
    pub prosperity: i32,
    /// Militia change of the giver's settlement.
    pub militia: i32,
    /// Player trait experience.
    pub traits: Vec<(TraitKind, i32)>,
}

impl EffectBundle {
    /// Only a relation change.
    #[must_use]
    pub fn relation(delta: i32) -> Self {
        Self {
            relation: delta,
            ..Self::default()
        }
    }

    /// The host actions this bundle expands to. Zero fields emit nothing.
    #[must_use]
    pub fn actions(&self, giver: ActorId, settlement: Option<SettlementId>) -> Vec<Action> {
        let mut actions = Vec::new();
        for &(trait_kind, amount) in &self.traits {
            actions.push(Action::GrantTraitXp { trait_kind, amount });
        }
        if self.giver_power != 0 {
            actions.push(Action::AddPower {
                actor: giver,
                delta: self.giver_power,
            });
        }
        if let Some(settlement) = settlement {
            if self.prosperity != 0 || self.militia != 0 {
                actions.push(Action::AdjustSettlement {
                    settlement,
                    prosperity: self.prosperity,
                    militia: self.militia,
                });
            }
        }
        if self.relation != 0 {
            actions.push(Action::AdjustRelation {
                actor: giver,
                delta: self.relation,
            });
        }
        actions
    }
}

// ---------------------------------------------------------------------------
// Hook interfaces
// ---------------------------------------------------------------------------

/// What an issue generates when the player takes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestSeed {
    /// Template data for the quest.
    pub payload: QuestPayload,
    /// Gold promised on success (on top of any payout the template computes).
    pub reward_gold: u32,
}

/// Issue-side hooks.
pub trait IssueTemplate {
    /// Template tag.
    fn kind(&self) -> TemplateKind;
    /// Scheduler hint.
    fn frequency(&self) -> IssueFrequency;
    /// Whether `candidate` can pose this issue right now. Pure.
    fn is_eligible<W: WorldQuery + ?Sized>(&self, world: &W, candidate: ActorId) -> bool;
    /// Whether an existing issue owned by `owner` still makes sense.
    fn stays_alive<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> bool;
    /// Issue title.
    fn title<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String;
    /// Issue description.
    fn description<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String;
    /// Checks run when the player tries to take the issue.
    ///
    /// # Errors
    /// Returns every failed precondition.
    fn accept_preconditions<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        owner: ActorId,
    ) -> std::result::Result<(), AcceptBlocked>;
    /// The quest to start, or `None` if the owner no longer supports one.
    fn generate_quest<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> Option<QuestSeed>;
    /// Issue-level side effects when the issue expires.
    fn on_issue_timeout<H: Host + ?Sized>(&self, host: &mut H, owner: ActorId);
}

/// Journal and notification texts of a quest instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestTexts {
    /// Quest title.
    pub title: String,
    /// Entry written on acceptance (carries the counter).
    pub accept_log: String,
    /// Label of the counter.
    pub objective_label: String,
    /// Entry shown while the objective is met.
    pub ready_log: String,
    /// Notification when the objective is first met.
    pub notice: String,
    /// Entry on success.
    pub success_log: String,
    /// Entry on timeout.
    pub timeout_log: String,
    /// Entry when war cancels the quest.
    pub war_cancel_log: String,
    /// Entry when a raid cancels the quest.
    pub raid_cancel_log: String,
    /// Entry when the player attacks the giver's people.
    pub coercion_log: String,
    /// Entry when the giver or their home no longer exists.
    pub lost_log: String,
    /// Entry when the issue behind the quest is withdrawn.
    pub withdrawn_log: String,
}

impl QuestTexts {
    /// Cancellation lines shared by every template.
    #[allow(clippy::too_many_arguments)]
    fn with_common(
        giver: &str,
        title: String,
        accept_log: String,
        objective_label: String,
        ready_log: String,
        notice: String,
        success_log: String,
        timeout_log: String,
    ) -> Self {
        Self {
            title,
            accept_log,
            objective_label,
            ready_log,
            notice,
            success_log,
            timeout_log,
            war_cancel_log: format!(
                "Your faction is now at war with {giver}'s. Your agreement with {giver} is void."
            ),
            raid_cancel_log: format!(
                "{giver}'s home was raided. The goods are no longer needed."
            ),
            coercion_log: format!(
                "You attacked {giver}'s people. {giver} no longer wants your help."
            ),
            lost_log: format!("{giver} can no longer be reached. The quest is void."),
            withdrawn_log: format!("{giver} no longer needs your help."),
        }
    }
}

/// Quest-side hooks.
pub trait QuestTemplate {
    /// Template tag.
    fn kind(&self) -> TemplateKind;
    /// Events the quest listens to while accepted.
    fn subscriptions(&self) -> &'static [EventKind];
    /// What counts and how many are needed.
    fn objective(&self) -> (ItemFilter, u32);
    /// Texts, given the giver's and their home's names.
    fn texts(&self, giver: &str, place: &str) -> QuestTexts;
    /// Dialog lines, given the giver's name.
    fn dialog_lines(&self, giver: &str) -> DialogLines;
    /// Payout and item removal on hand-over; `None` if the items are gone.
    fn settle(&self, inventory: &[ItemStack], player: ActorId, reward_gold: u32) -> Option<Vec<Action>>;
    /// Applied once on success.
    fn success_effects(&self) -> &EffectBundle;
    /// Applied once on timeout.
    fn failure_effects(&self) -> &EffectBundle;
    /// Whether a raid on the giver's settlement cancels the quest.
    fn cancels_on_raid(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Template data carried by a quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestPayload {
    /// See [`WeaponCommission`].
    WeaponCommission(WeaponCommission),
    /// See [`SupplyDelivery`].
    SupplyDelivery(SupplyDelivery),
}

impl QuestPayload {
    /// The quest-side hooks of this payload.
    #[must_use]
    pub fn template(&self) -> &dyn QuestTemplate {
        match self {
            Self::WeaponCommission(p) => p,
            Self::SupplyDelivery(p) => p,
        }
    }

    /// Template tag.
    #[must_use]
    pub fn kind(&self) -> TemplateKind {
        self.template().kind()
    }
}

/// A registered, configured template.
#[derive(Debug, Clone)]
pub enum Template {
    /// See [`WeaponCommissionTemplate`].
    WeaponCommission(WeaponCommissionTemplate),
    /// See [`SupplyDeliveryTemplate`].
    SupplyDelivery(SupplyDeliveryTemplate),
}

macro_rules! delegate {
    ($self:ident, $t:ident => $body:expr) => {
        match $self {
            Template::WeaponCommission($t) => $body,
            Template::SupplyDelivery($t) => $body,
        }
    };
}

impl IssueTemplate for Template {
    fn kind(&self) -> TemplateKind {
        delegate!(self, t => t.kind())
    }

    fn frequency(&self) -> IssueFrequency {
        delegate!(self, t => t.frequency())
    }

    fn is_eligible<W: WorldQuery + ?Sized>(&self, world: &W, candidate: ActorId) -> bool {
        delegate!(self, t => t.is_eligible(world, candidate))
    }

    fn stays_alive<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> bool {
        delegate!(self, t => t.stays_alive(world, owner))
    }

    fn title<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String {
        delegate!(self, t => t.title(world, owner))
    }

    fn description<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String {
        delegate!(self, t => t.description(world, owner))
    }

    fn accept_preconditions<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        owner: ActorId,
    ) -> std::result::Result<(), AcceptBlocked> {
        delegate!(self, t => t.accept_preconditions(world, owner))
    }

    fn generate_quest<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> Option<QuestSeed> {
        delegate!(self, t => t.generate_quest(world, owner))
    }

    fn on_issue_timeout<H: Host + ?Sized>(&self, host: &mut H, owner: ActorId) {
        delegate!(self, t => t.on_issue_timeout(host, owner));
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The set of templates enabled by configuration.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    /// Build and validate the catalog.
    ///
    /// # Errors
    /// Returns `QuestError::Config` if the configuration is unusable.
    pub fn new(config: &SidequestConfig) -> Result<Self> {
        config.validate()?;
        let mut templates = Vec::new();
        let min_relation = config.issues.min_relation_to_accept;
        if config.weapon_commission.enabled {
            templates.push(Template::WeaponCommission(WeaponCommissionTemplate::new(
                config.weapon_commission.clone(),
                min_relation,
            )));
        }
        if config.supply_delivery.enabled {
            templates.push(Template::SupplyDelivery(SupplyDeliveryTemplate::new(
                config.supply_delivery.clone(),
                min_relation,
            )));
        }
        info!(
            templates = templates.len(),
            "Template catalog built"
        );
        Ok(Self { templates })
    }

    /// Look up a registered template.
    ///
    /// # Errors
    /// Returns `QuestError::TemplateUnavailable` if `kind` is not registered.
    pub fn get(&self, kind: TemplateKind) -> Result<&Template> {
        self.templates
            .iter()
            .find(|t| t.kind() == kind)
            .ok_or(QuestError::TemplateUnavailable(kind))
    }

    /// Whether `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: TemplateKind) -> bool {
        self.templates.iter().any(|t| t.kind() == kind)
    }

    /// Registered templates, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no template is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Name of an actor, or a neutral stand-in when it no longer resolves.
pub(crate) fn actor_name<W: WorldQuery + ?Sized>(world: &W, actor: ActorId) -> String {
    world
        .actor(actor)
        .map_or_else(|| "someone".to_string(), |a| a.name)
}

/// Name of an actor's settlement, or a neutral stand-in.
pub(crate) fn home_name<W: WorldQuery + ?Sized>(world: &W, actor: ActorId) -> String {
    world
        .actor(actor)
        .and_then(|a| a.settlement)
        .and_then(|s| world.settlement(s))
        .map_or_else(|| "their home".to_string(), |s| s.name)
}
