//! Quest state machine.
//!
//! ```text
//!            accept (dialog)                  hand-over + interaction end
//!  Offered ─────────────────▶ Accepted ─────────────────────────────────▶ Succeeded
//!     │                         │  │
//!     │ withdrawn               │  └─ deadline ──────────────────────────▶ Failed
//!     ▼                         ▼
//!  Cancelled ◀──── war · raid · coercion · lost reference
//! ```
//!
//! Every outgoing transition from `Accepted` is guarded by a state check,
//! so whichever fires first wins and all later calls are no-ops. Reaching
//! a terminal state drops the quest's [`Subscription`], which unregisters
//! it from the bus in the same step.

use tracing::{debug, info, warn};

use crate::bus::{BusHandle, Subscription};
use crate::dialog::{Consequence, DeferredAction, DialogNode, DialogReply, DialogView};
use crate::error::{QuestError, Result};
use crate::events::WorldEvent;
use crate::predicate;
use crate::progress::{Crossing, Journal, ProgressTracker, ReadyTexts, Recount};
use crate::template::{QuestPayload, QuestSeed, QuestTexts};
use crate::types::{ActorId, CampaignTime, IssueId, QuestId, SettlementId};
use crate::world::{Action, Host, WorldQuery};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Lifecycle state of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestState {
    /// Generated, waiting for the player to accept through dialog.
    Offered,
    /// Accepted; progress is tracked (the "in progress" phase).
    Accepted,
    /// Handed over. Terminal.
    Succeeded,
    /// Deadline passed. Terminal.
    Failed,
    /// Invalidated by the world. Terminal.
    Cancelled,
}

impl QuestState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether progress is being tracked.
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        self == Self::Accepted
    }

    /// Stable name, used in save records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offered => "offered",
            Self::Accepted => "accepted",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the name written by [`Self::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offered" => Some(Self::Offered),
            "accepted" => Some(Self::Accepted),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Why a quest was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The giver's side went to war with the player's.
    War,
    /// The giver's settlement was raided.
    Raid,
    /// The player attacked the giver's people.
    Coercion,
    /// The giver or their settlement no longer resolves.
    ReferenceLost,
    /// The issue behind the quest was withdrawn.
    Withdrawn,
}

/// What an event delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not relevant, or the quest is not accepted.
    Ignored,
    /// Progress was recomputed.
    Progress(Crossing),
    /// The quest was cancelled.
    Cancelled(CancelReason),
}

// ---------------------------------------------------------------------------
// Quest
// ---------------------------------------------------------------------------

/// An accepted (or about to be accepted) objective.
#[derive(Debug)]
pub struct Quest {
    pub(crate) id: QuestId,
    pub(crate) issue: IssueId,
    pub(crate) giver: ActorId,
    pub(crate) giver_name: String,
    pub(crate) place_name: String,
    pub(crate) settlement: Option<SettlementId>,
    pub(crate) payload: QuestPayload,
    pub(crate) state: QuestState,
    pub(crate) created_at: CampaignTime,
    pub(crate) deadline: CampaignTime,
    pub(crate) reward_gold: u32,
    pub(crate) journal: Journal,
    pub(crate) tracker: ProgressTracker,
    pub(crate) relation_delta: i32,
    pub(crate) pending: Option<DeferredAction>,
    pub(crate) subscription: Option<Subscription>,
}

impl Quest {
    /// Build an `Offered` quest from an issue's seed.
    ///
    /// Names are captured now so that journal texts stay readable even if
    /// the giver later disappears.
    pub fn from_seed<W: WorldQuery + ?Sized>(
        world: &W,
        issue: IssueId,
        giver: ActorId,
        seed: QuestSeed,
        now: CampaignTime,
        duration_days: u32,
    ) -> Self {
        let profile = world.actor(giver);
        let settlement = profile.as_ref().and_then(|p| p.settlement);
        let giver_name = profile.map_or_else(|| "someone".to_string(), |p| p.name);
        let place_name = settlement
            .and_then(|s| world.settlement(s))
            .map_or_else(|| "the road".to_string(), |s| s.name);
        let (filter, required) = seed.payload.template().objective();
        Self {
            id: QuestId::new(),
            issue,
            giver,
            giver_name,
            place_name,
            settlement,
            payload: seed.payload,
            state: QuestState::Offered,
            created_at: now,
            deadline: now.plus_days(duration_days),
            reward_gold: seed.reward_gold,
            journal: Journal::new(),
            tracker: ProgressTracker::new(filter, required),
            relation_delta: 0,
            pending: None,
            subscription: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Quest identifier.
    #[must_use]
    pub fn id(&self) -> QuestId {
        self.id
    }

    /// Issue that spawned the quest.
    #[must_use]
    pub fn issue(&self) -> IssueId {
        self.issue
    }

    /// The quest giver.
    #[must_use]
    pub fn giver(&self) -> ActorId {
        self.giver
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> QuestState {
        self.state
    }

    /// When the quest was generated.
    #[must_use]
    pub fn created_at(&self) -> CampaignTime {
        self.created_at
    }

    /// When the quest times out.
    #[must_use]
    pub fn deadline(&self) -> CampaignTime {
        self.deadline
    }

    /// Gold promised on top of any template payout.
    #[must_use]
    pub fn reward_gold(&self) -> u32 {
        self.reward_gold
    }

    /// Template data.
    #[must_use]
    pub fn payload(&self) -> &QuestPayload {
        &self.payload
    }

    /// Journal entries.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Sum of relation changes this quest has applied.
    #[must_use]
    pub fn relation_delta(&self) -> i32 {
        self.relation_delta
    }

    /// Action waiting for the current interaction to end.
    #[must_use]
    pub fn pending(&self) -> Option<DeferredAction> {
        self.pending
    }

    /// Whether the quest holds a live bus registration.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// `(current, required)` of the objective counter, once accepted.
    #[must_use]
    pub fn progress(&self) -> Option<(u32, u32)> {
        let log = self.tracker.progress_log?;
        let progress = self.journal.get(log)?.progress.as_ref()?;
        Some((progress.current, progress.required))
    }

    /// Whether the last recomputation found the objective met.
    #[must_use]
    pub fn objective_met(&self) -> bool {
        self.tracker.is_complete()
    }

    /// Texts for this instance.
    #[must_use]
    pub fn texts(&self) -> QuestTexts {
        self.payload
            .template()
            .texts(&self.giver_name, &self.place_name)
    }

    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_overdue(&self, now: CampaignTime) -> bool {
        self.deadline.has_elapsed(now)
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Re-register an accepted quest after a reload. No-op otherwise.
    pub fn resume(&mut self, bus: &BusHandle) {
        if self.state == QuestState::Accepted && self.subscription.is_none() {
            let kinds = self.payload.template().subscriptions();
            self.subscription = Some(bus.subscribe(self.id, kinds));
            debug!(quest = %self.id, "Quest subscriptions restored");
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Offered → Accepted. Registers every subscription in the same step.
    ///
    /// # Errors
    /// `InvalidTransition` unless the quest is `Offered`.
    pub fn accept<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        bus: &BusHandle,
        now: CampaignTime,
    ) -> Result<()> {
        if self.state != QuestState::Offered {
            return Err(QuestError::InvalidTransition {
                entity: "quest",
                from: self.state.as_str(),
                to: QuestState::Accepted.as_str(),
            });
        }
        self.state = QuestState::Accepted;
        self.subscription = Some(bus.subscribe(self.id, self.payload.template().subscriptions()));

        let texts = self.texts();
        let inventory = host.player_inventory();
        let count = self.tracker.scan(&inventory);
        let entry = self.journal.add_discrete_log(
            texts.accept_log,
            texts.objective_label,
            count,
            self.tracker.required,
            now,
        );
        self.tracker.progress_log = Some(entry.id);
        host.apply(Action::JournalAdded {
            quest: self.id,
            entry,
        });
        self.recompute(host, &inventory, now);

        info!(
            quest = %self.id,
            kind = ?self.payload.kind(),
            deadline = %self.deadline,
            "Quest accepted"
        );
        Ok(())
    }

    /// Accepted → Succeeded, applying payout and rewards once.
    ///
    /// Returns `false` (and changes nothing) unless the quest is accepted
    /// and the player still holds the goods.
    pub fn complete<H: Host + ?Sized>(&mut self, host: &mut H, now: CampaignTime) -> bool {
        if self.state != QuestState::Accepted {
            return false;
        }
        let inventory = host.player_inventory();
        let player = host.player();
        let template = self.payload.template();
        let Some(settlement_actions) = template.settle(&inventory, player, self.reward_gold) else {
            warn!(quest = %self.id, "Hand-over discarded: goods no longer in inventory");
            return false;
        };
        let effects = template.success_effects().actions(self.giver, self.settlement);
        let relation = template.success_effects().relation;
        let text = self.texts().success_log;

        self.terminate(QuestState::Succeeded);
        self.write_log(host, text, now);
        for action in settlement_actions.into_iter().chain(effects) {
            host.apply(action);
        }
        self.relation_delta += relation;
        info!(quest = %self.id, relation, "Quest succeeded");
        true
    }

    /// Accepted → Failed, applying the penalty once.
    pub fn time_out<H: Host + ?Sized>(&mut self, host: &mut H, now: CampaignTime) -> bool {
        if self.state != QuestState::Accepted {
            return false;
        }
        let template = self.payload.template();
        let effects = template.failure_effects().actions(self.giver, self.settlement);
        let relation = template.failure_effects().relation;
        let text = self.texts().timeout_log;

        self.terminate(QuestState::Failed);
        self.write_log(host, text, now);
        for action in effects {
            host.apply(action);
        }
        self.relation_delta += relation;
        info!(quest = %self.id, relation, "Quest failed: deadline passed");
        true
    }

    /// Offered/Accepted → Cancelled. No reward, no penalty.
    pub fn cancel<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        reason: CancelReason,
        now: CampaignTime,
    ) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let texts = self.texts();
        let text = match reason {
            CancelReason::War => texts.war_cancel_log,
            CancelReason::Raid => texts.raid_cancel_log,
            CancelReason::Coercion => texts.coercion_log,
            CancelReason::ReferenceLost => texts.lost_log,
            CancelReason::Withdrawn => texts.withdrawn_log,
        };
        self.terminate(QuestState::Cancelled);
        self.write_log(host, text, now);
        info!(quest = %self.id, ?reason, "Quest cancelled");
        true
    }

    fn terminate(&mut self, state: QuestState) {
        self.state = state;
        self.pending = None;
        // Dropping the guard unregisters the quest.
        self.subscription = None;
    }

    fn write_log<H: Host + ?Sized>(&mut self, host: &mut H, text: String, now: CampaignTime) {
        let entry = self.journal.add_log(text, now);
        host.apply(Action::JournalAdded {
            quest: self.id,
            entry,
        });
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Deliver a world event. Never fails; no-op unless accepted.
    pub fn handle_event<H: Host + ?Sized>(
        &mut self,
        event: &WorldEvent,
        host: &mut H,
        now: CampaignTime,
    ) -> EventOutcome {
        if self.state != QuestState::Accepted {
            return EventOutcome::Ignored;
        }
        if self.references_lost(&*host) {
            self.cancel(host, CancelReason::ReferenceLost, now);
            return EventOutcome::Cancelled(CancelReason::ReferenceLost);
        }

        let reason = match event {
            WorldEvent::InventoryExchange { added, removed, .. } => {
                if self.tracker.filter.touches(added) || self.tracker.filter.touches(removed) {
                    let recount = self.refresh_progress(host, now);
                    return EventOutcome::Progress(recount.map_or(Crossing::None, |r| r.crossing));
                }
                None
            }
            WorldEvent::WarDeclared { .. } | WorldEvent::AffiliationChanged { .. } => {
                self.hostile_to_player(&*host).then_some(CancelReason::War)
            }
            WorldEvent::MapEventStarted {
                attacker, defender, ..
            } => {
                let targets_giver = defender.leader == Some(self.giver)
                    || (defender.settlement.is_some() && defender.settlement == self.settlement);
                (attacker.is_player && targets_giver).then_some(CancelReason::Coercion)
            }
            WorldEvent::RaidCompleted { settlement, .. } => (self
                .payload
                .template()
                .cancels_on_raid()
                && self.settlement == Some(*settlement))
            .then_some(CancelReason::Raid),
        };

        match reason {
            Some(reason) => {
                self.cancel(host, reason, now);
                EventOutcome::Cancelled(reason)
            }
            None => EventOutcome::Ignored,
        }
    }

    /// Re-derive progress from the current inventory. `None` unless accepted.
    pub fn refresh_progress<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        now: CampaignTime,
    ) -> Option<Recount> {
        if self.state != QuestState::Accepted {
            return None;
        }
        let inventory = host.player_inventory();
        Some(self.recompute(host, &inventory, now))
    }

    fn recompute<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        inventory: &[crate::types::ItemStack],
        now: CampaignTime,
    ) -> Recount {
        let texts = self.texts();
        let recount = self.tracker.recompute(
            self.id,
            &mut self.journal,
            inventory,
            ReadyTexts {
                ready_log: &texts.ready_log,
                notice: &texts.notice,
            },
            now,
        );
        for action in &recount.actions {
            host.apply(action.clone());
        }
        recount
    }

    /// Whether the giver or their settlement has stopped resolving.
    pub fn references_lost<W: WorldQuery + ?Sized>(&self, world: &W) -> bool {
        world.actor(self.giver).is_none()
            || self.settlement.is_some_and(|s| world.settlement(s).is_none())
    }

    /// Whether the giver's side (own faction, else their town's owner) is at war with the player.
    fn hostile_to_player<W: WorldQuery + ?Sized>(&self, world: &W) -> bool {
        if predicate::at_war_with_player(world, self.giver) {
            return true;
        }
        let owner = self
            .settlement
            .and_then(|s| world.settlement(s))
            .and_then(|s| s.owner_faction);
        match (owner, world.player_faction()) {
            (Some(theirs), Some(ours)) => world.is_at_war(theirs, ours),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Dialog
    // ------------------------------------------------------------------

    fn check_partner(&self, partner: ActorId) -> Result<()> {
        if partner == self.giver {
            Ok(())
        } else {
            Err(QuestError::WrongPartner(partner))
        }
    }

    fn dialog_node(&self) -> Result<DialogNode> {
        let lines = self.payload.template().dialog_lines(&self.giver_name);
        match self.state {
            QuestState::Offered => Ok(DialogNode::offer(&lines)),
            QuestState::Accepted => Ok(DialogNode::discuss(&lines)),
            state => Err(QuestError::InvalidTransition {
                entity: "quest",
                from: state.as_str(),
                to: "dialog",
            }),
        }
    }

    /// The offer flow, for a conversation with the giver.
    ///
    /// # Errors
    /// `WrongPartner` for anyone but the giver; `InvalidTransition` unless offered.
    pub fn open_offer(&self, partner: ActorId) -> Result<DialogView> {
        self.check_partner(partner)?;
        if self.state != QuestState::Offered {
            return Err(QuestError::InvalidTransition {
                entity: "quest",
                from: self.state.as_str(),
                to: "offer dialog",
            });
        }
        Ok(self.dialog_node()?.present(self.id, false))
    }

    /// The discuss flow, with gates evaluated against freshly recomputed progress.
    ///
    /// # Errors
    /// `WrongPartner` for anyone but the giver; `InvalidTransition` unless accepted.
    pub fn open_discuss<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        partner: ActorId,
        now: CampaignTime,
    ) -> Result<DialogView> {
        self.check_partner(partner)?;
        if self.state != QuestState::Accepted {
            return Err(QuestError::InvalidTransition {
                entity: "quest",
                from: self.state.as_str(),
                to: "discuss dialog",
            });
        }
        self.refresh_progress(host, now);
        Ok(self.dialog_node()?.present(self.id, self.tracker.is_complete()))
    }

    /// Apply a dialog selection in whichever flow the state implies.
    ///
    /// # Errors
    /// `UnknownOption` / `OptionUnavailable` from the gate, or
    /// `InvalidTransition` if the quest is terminal.
    pub fn choose<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        bus: &BusHandle,
        option: &str,
        now: CampaignTime,
    ) -> Result<DialogReply> {
        let node = self.dialog_node()?;
        self.refresh_progress(host, now);
        let chosen = node.select(option, self.tracker.is_complete())?;
        match chosen.consequence {
            Consequence::AcceptQuest => self.accept(host, bus, now)?,
            Consequence::Defer(action) => {
                self.pending = Some(action);
                debug!(quest = %self.id, action = action.as_str(), "Deferred action scheduled");
            }
            Consequence::None => {}
        }
        Ok(DialogReply {
            line: chosen.reply.clone(),
            consequence: chosen.consequence,
        })
    }

    /// Run whatever the closed interaction left pending.
    ///
    /// Returns the new state if a transition happened.
    pub fn end_interaction<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        now: CampaignTime,
    ) -> Option<QuestState> {
        match self.pending.take()? {
            DeferredAction::CompleteOnInteractionEnd => {
                self.complete(host, now).then_some(self.state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SidequestConfig;
    use crate::dialog::{OPTION_ACCEPT, OPTION_HAND_OVER, OPTION_STILL_WORKING};
    use crate::events::{BattleSide, PartyRef};
    use crate::template::{IssueTemplate, TemplateCatalog, TemplateKind};
    use crate::types::{FactionId, ItemId, ItemStack, MapEventId};
    use crate::world::sandbox::SandboxWorld;
    use crate::world::{ActorProfile, ActorRoles, SettlementProfile};

    struct Fixture {
        world: SandboxWorld,
        bus: BusHandle,
        giver: ActorId,
        town: SettlementId,
        lords: FactionId,
        ours: FactionId,
    }

    fn fixture() -> Fixture {
        let mut world = SandboxWorld::new();
        let (lords, ours) = (FactionId::new(), FactionId::new());
        world.set_player_faction(Some(ours));
        let town = world.add_settlement(SettlementProfile {
            id: SettlementId::new(),
            name: "Sargot".into(),
            is_town: true,
            is_starving: true,
            owner_faction: Some(lords),
        });
        let giver = world.add_actor(
            ActorProfile::new(ActorId::new(), "Count Aldric")
                .with_roles(ActorRoles {
                    is_clan_leader: true,
                    is_merchant: true,
                    has_party: true,
                    ..ActorRoles::default()
                })
                .with_faction(lords)
                .with_settlement(town)
                .with_primary_weapon("sword"),
        );
        Fixture {
            world,
            bus: BusHandle::new(),
            giver,
            town,
            lords,
            ours,
        }
    }

    fn quest(f: &Fixture, kind: TemplateKind) -> Quest {
        let catalog = TemplateCatalog::new(&SidequestConfig::default()).expect("catalog");
        let seed = catalog
            .get(kind)
            .expect("registered")
            .generate_quest(&f.world, f.giver)
            .expect("seed");
        Quest::from_seed(&f.world, IssueId::new(), f.giver, seed, CampaignTime::ZERO, 20)
    }

    fn accepted(f: &mut Fixture, kind: TemplateKind) -> Quest {
        let mut q = quest(f, kind);
        q.accept(&mut f.world, &f.bus, CampaignTime::ZERO).expect("accept");
        q
    }

    fn buy(stack: ItemStack) -> WorldEvent {
        WorldEvent::InventoryExchange {
            added: vec![stack],
            removed: Vec::new(),
            is_trading: true,
        }
    }

    #[test]
    fn accept_registers_subscriptions_and_discrete_log() {
        let mut f = fixture();
        let q = accepted(&mut f, TemplateKind::WeaponCommission);
        assert_eq!(q.state(), QuestState::Accepted);
        assert!(f.bus.is_subscribed(q.id()));
        assert_eq!(q.progress(), Some((0, 1)));
        assert_eq!(f.world.journal(q.id()).len(), 1);
    }

    #[test]
    fn accept_twice_is_invalid() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        let err = q.accept(&mut f.world, &f.bus, CampaignTime::ZERO).expect_err("second accept");
        assert!(matches!(err, QuestError::InvalidTransition { .. }));
    }

    #[test]
    fn events_before_acceptance_are_ignored() {
        let mut f = fixture();
        let mut q = quest(&f, TemplateKind::WeaponCommission);
        f.world.give_item(ItemStack::new("fine", "sword", 5000, 1));
        let outcome = q.handle_event(
            &buy(ItemStack::new("fine", "sword", 5000, 1)),
            &mut f.world,
            CampaignTime::ZERO,
        );
        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(q.progress().is_none());
    }

    #[test]
    fn purchase_reaches_requirement_without_completing() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        let stack = ItemStack::new("fine", "sword", 5000, 1);
        f.world.give_item(stack.clone());

        let outcome = q.handle_event(&buy(stack), &mut f.world, CampaignTime::ZERO);
        assert_eq!(outcome, EventOutcome::Progress(Crossing::Reached));
        assert_eq!(q.state(), QuestState::Accepted);
        assert_eq!(q.progress(), Some((1, 1)));
        assert_eq!(f.world.notifications().len(), 1);
    }

    #[test]
    fn unrelated_items_do_not_recompute() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        let outcome = q.handle_event(
            &buy(ItemStack::new("bread", "food", 5, 10)),
            &mut f.world,
            CampaignTime::ZERO,
        );
        assert_eq!(outcome, EventOutcome::Ignored);
    }

    #[test]
    fn war_cancels_without_effects() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        f.world.declare_war(f.lords, f.ours);
        let before = f.world.relation(f.giver);

        let event = WorldEvent::WarDeclared {
            faction_a: f.lords,
            faction_b: f.ours,
        };
        let outcome = q.handle_event(&event, &mut f.world, CampaignTime::ZERO);
        assert_eq!(outcome, EventOutcome::Cancelled(CancelReason::War));
        assert_eq!(q.state(), QuestState::Cancelled);
        assert!(!f.bus.is_subscribed(q.id()));
        assert_eq!(f.world.relation(f.giver), before);
        assert_eq!(q.relation_delta(), 0);
    }

    #[test]
    fn war_between_others_is_ignored() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        let event = WorldEvent::WarDeclared {
            faction_a: FactionId::new(),
            faction_b: FactionId::new(),
        };
        assert_eq!(q.handle_event(&event, &mut f.world, CampaignTime::ZERO), EventOutcome::Ignored);
    }

    #[test]
    fn raid_cancels_supply_delivery_only() {
        let mut f = fixture();
        let raid = WorldEvent::RaidCompleted {
            winner: BattleSide::Attacker,
            event: MapEventId::new(),
            settlement: f.town,
        };

        let mut weapon = accepted(&mut f, TemplateKind::WeaponCommission);
        assert_eq!(weapon.handle_event(&raid, &mut f.world, CampaignTime::ZERO), EventOutcome::Ignored);

        let mut supply = accepted(&mut f, TemplateKind::SupplyDelivery);
        assert_eq!(
            supply.handle_event(&raid, &mut f.world, CampaignTime::ZERO),
            EventOutcome::Cancelled(CancelReason::Raid)
        );
    }

    #[test]
    fn attacking_the_giver_is_coercion() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        let event = WorldEvent::MapEventStarted {
            event: MapEventId::new(),
            attacker: PartyRef {
                is_player: true,
                ..PartyRef::default()
            },
            defender: PartyRef {
                leader: Some(f.giver),
                ..PartyRef::default()
            },
        };
        assert_eq!(
            q.handle_event(&event, &mut f.world, CampaignTime::ZERO),
            EventOutcome::Cancelled(CancelReason::Coercion)
        );
    }

    #[test]
    fn lost_giver_cancels_on_any_event() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        f.world.remove_actor(f.giver);
        let outcome = q.handle_event(
            &buy(ItemStack::new("bread", "food", 5, 1)),
            &mut f.world,
            CampaignTime::ZERO,
        );
        assert_eq!(outcome, EventOutcome::Cancelled(CancelReason::ReferenceLost));
    }

    #[test]
    fn timeout_applies_penalty_once() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        let late = q.deadline();
        assert!(q.time_out(&mut f.world, late));
        assert!(!q.time_out(&mut f.world, late));
        assert_eq!(q.state(), QuestState::Failed);
        assert_eq!(f.world.relation(f.giver), -5);
        assert_eq!(q.relation_delta(), -5);
    }

    #[test]
    fn hand_over_completes_only_at_interaction_end() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::WeaponCommission);
        f.world.give_item(ItemStack::new("fine", "sword", 3500, 1));

        let view = q.open_discuss(&mut f.world, f.giver, CampaignTime::ZERO).expect("discuss");
        assert!(view.option(OPTION_HAND_OVER).expect("option").availability.is_available());

        q.choose(&mut f.world, &f.bus, OPTION_HAND_OVER, CampaignTime::ZERO)
            .expect("hand over");
        assert_eq!(q.state(), QuestState::Accepted);
        assert_eq!(q.pending(), Some(DeferredAction::CompleteOnInteractionEnd));

        let state = q.end_interaction(&mut f.world, CampaignTime::ZERO);
        assert_eq!(state, Some(QuestState::Succeeded));
        assert_eq!(f.world.gold(), 7000);
        assert_eq!(f.world.relation(f.giver), 10);
        assert!(f.world.player_inventory().is_empty());
        assert!(q.end_interaction(&mut f.world, CampaignTime::ZERO).is_none());
    }

    #[test]
    fn hand_over_is_gated_on_progress() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::SupplyDelivery);
        f.world.give_item(ItemStack::new("grain", "grain", 10, 3));

        let err = q
            .choose(&mut f.world, &f.bus, OPTION_HAND_OVER, CampaignTime::ZERO)
            .expect_err("not enough grain");
        assert!(matches!(err, QuestError::OptionUnavailable { .. }));

        let reply = q
            .choose(&mut f.world, &f.bus, OPTION_STILL_WORKING, CampaignTime::ZERO)
            .expect("stall");
        assert_eq!(reply.consequence, Consequence::None);
        assert!(q.pending().is_none());
    }

    #[test]
    fn hand_over_gate_recounts_the_inventory() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::SupplyDelivery);
        f.world.give_item(ItemStack::new("grain", "grain", 10, 20));

        q.choose(&mut f.world, &f.bus, OPTION_HAND_OVER, CampaignTime::ZERO)
            .expect("grain arrived without an event");
        assert_eq!(q.progress(), Some((20, 20)));
        assert_eq!(q.pending(), Some(DeferredAction::CompleteOnInteractionEnd));
    }

    #[test]
    fn hand_over_gate_sees_goods_sold_off() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::SupplyDelivery);
        f.world.give_item(ItemStack::new("grain", "grain", 10, 20));
        q.refresh_progress(&mut f.world, CampaignTime::ZERO);
        assert!(q.objective_met());

        f.world.take_item(&ItemId::new("grain"), 15);
        let err = q
            .choose(&mut f.world, &f.bus, OPTION_HAND_OVER, CampaignTime::ZERO)
            .expect_err("stale progress");
        assert!(matches!(err, QuestError::OptionUnavailable { .. }));
        assert_eq!(q.progress(), Some((5, 20)));
    }

    #[test]
    fn offer_flow_accepts() {
        let mut f = fixture();
        let mut q = quest(&f, TemplateKind::SupplyDelivery);
        assert!(matches!(
            q.open_offer(ActorId::new()),
            Err(QuestError::WrongPartner(_))
        ));
        let view = q.open_offer(f.giver).expect("offer");
        assert_eq!(view.options.len(), 1);
        q.choose(&mut f.world, &f.bus, OPTION_ACCEPT, CampaignTime::ZERO)
            .expect("accept");
        assert_eq!(q.state(), QuestState::Accepted);
    }

    #[test]
    fn supply_success_applies_every_effect() {
        let mut f = fixture();
        let mut q = accepted(&mut f, TemplateKind::SupplyDelivery);
        f.world.give_item(ItemStack::new("grain", "grain", 10, 25));
        q.refresh_progress(&mut f.world, CampaignTime::ZERO);
        assert!(q.objective_met());

        assert!(q.complete(&mut f.world, CampaignTime::ZERO));
        assert_eq!(f.world.gold(), 1500);
        assert_eq!(f.world.power(f.giver), 25);
        assert_eq!(f.world.settlement_counters(f.town), Some((50, 20)));
        assert_eq!(f.world.trait_xp(crate::types::TraitKind::Mercy), 50);
        assert_eq!(f.world.player_inventory()[0].count, 5);
    }

    #[test]
    fn state_names_round_trip() {
        for s in [
            QuestState::Offered,
            QuestState::Accepted,
            QuestState::Succeeded,
            QuestState::Failed,
            QuestState::Cancelled,
        ] {
            assert_eq!(QuestState::parse(s.as_str()), Some(s));
        }
    }
}
