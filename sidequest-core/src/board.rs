//! Issue board — owns every issue and quest and drives them.
//!
//! The board is the engine facade a host talks to:
//!
//! 1. [`IssueBoard::potential_issues`] evaluates a candidate for the scheduler
//! 2. [`IssueBoard::offer`] creates a `Potential` issue for the chosen template
//! 3. [`IssueBoard::take`] checks accept preconditions and spawns the quest
//! 4. dialog calls accept it, and later hand over the goods
//! 5. [`IssueBoard::dispatch`] routes world events to subscribed quests
//! 6. [`IssueBoard::advance`] runs deferred actions and deadlines
//! 7. [`IssueBoard::reevaluate`] abandons issues the world no longer supports
//!
//! Terminal quests are moved to an archive and their issue is settled:
//! Succeeded → Resolved, Failed → Expired, Cancelled → Abandoned.
//! Closed issues and archived quests are kept as a bounded history
//! (`issues.history_limit`), oldest dropped first.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::bus::BusHandle;
use crate::config::{IssueConfig, SidequestConfig};
use crate::dialog::{DialogReply, DialogView};
use crate::error::{QuestError, Result};
use crate::events::WorldEvent;
use crate::issue::{self, Issue, IssueState, PotentialIssue};
use crate::metrics::BoardCounters;
use crate::persistence::{self, BoardSnapshot, SCHEMA_VERSION};
use crate::predicate::AcceptBlocked;
use crate::quest::{CancelReason, EventOutcome, Quest, QuestState};
use crate::template::{IssueTemplate, TemplateCatalog, TemplateKind};
use crate::types::{ActorId, CampaignTime, IssueId, QuestId};
use crate::world::{Host, WorldQuery};

/// Result of trying to take an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeOutcome {
    /// The issue is active and its quest is offered.
    Taken {
        /// The new quest.
        quest: QuestId,
    },
    /// Preconditions failed; the issue stays potential.
    Blocked(AcceptBlocked),
}

/// Terminal transitions that happened during one board call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Quests handed over.
    pub succeeded: Vec<QuestId>,
    /// Quests that timed out.
    pub failed: Vec<QuestId>,
    /// Quests cancelled.
    pub cancelled: Vec<QuestId>,
    /// Issues resolved.
    pub resolved: Vec<IssueId>,
    /// Issues expired.
    pub expired: Vec<IssueId>,
    /// Issues abandoned.
    pub abandoned: Vec<IssueId>,
}

impl Settlement {
    /// Whether nothing terminated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty()
            && self.failed.is_empty()
            && self.cancelled.is_empty()
            && self.resolved.is_empty()
            && self.expired.is_empty()
            && self.abandoned.is_empty()
    }

    /// Append another call's transitions to this one.
    pub fn merge(&mut self, other: Settlement) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.cancelled.extend(other.cancelled);
        self.resolved.extend(other.resolved);
        self.expired.extend(other.expired);
        self.abandoned.extend(other.abandoned);
    }
}

/// Summary of one [`IssueBoard::dispatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Quests the event was delivered to.
    pub delivered: usize,
    /// Deliveries that recomputed progress.
    pub progressed: usize,
    /// Terminal transitions caused by the event.
    pub settled: Settlement,
}

/// A closed issue and the archived quest it ran, in closing order.
#[derive(Debug, Clone, Copy)]
struct Closed {
    issue: IssueId,
    quest: Option<QuestId>,
}

/// Registry and driver of all issues and quests.
#[derive(Debug)]
pub struct IssueBoard {
    catalog: TemplateCatalog,
    issues_config: IssueConfig,
    enabled: bool,
    bus: BusHandle,
    issues: BTreeMap<IssueId, Issue>,
    quests: BTreeMap<QuestId, Quest>,
    archive: HashMap<QuestId, Quest>,
    history: VecDeque<Closed>,
    counters: BoardCounters,
}

impl IssueBoard {
    /// A board with its own event bus.
    ///
    /// # Errors
    /// Returns `QuestError::Config` if the configuration is unusable.
    pub fn new(config: &SidequestConfig) -> Result<Self> {
        Self::with_bus(config, BusHandle::new())
    }

    /// A board registering quests on an existing bus.
    ///
    /// # Errors
    /// Returns `QuestError::Config` if the configuration is unusable.
    pub fn with_bus(config: &SidequestConfig, bus: BusHandle) -> Result<Self> {
        Ok(Self {
            catalog: TemplateCatalog::new(config)?,
            issues_config: config.issues.clone(),
            enabled: config.general.enabled,
            bus,
            issues: BTreeMap::new(),
            quests: BTreeMap::new(),
            archive: HashMap::new(),
            history: VecDeque::new(),
            counters: BoardCounters::new(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Registered templates.
    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// The bus quests register on.
    #[must_use]
    pub fn bus(&self) -> &BusHandle {
        &self.bus
    }

    /// Lifecycle counters.
    #[must_use]
    pub fn counters(&self) -> &BoardCounters {
        &self.counters
    }

    /// Look up an issue.
    #[must_use]
    pub fn issue(&self, id: IssueId) -> Option<&Issue> {
        self.issues.get(&id)
    }

    /// All issues, closed ones still in the history included.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.values()
    }

    /// Look up a live or archived quest.
    #[must_use]
    pub fn quest(&self, id: QuestId) -> Option<&Quest> {
        self.quests.get(&id).or_else(|| self.archive.get(&id))
    }

    /// Non-terminal quests.
    pub fn live_quests(&self) -> impl Iterator<Item = &Quest> {
        self.quests.values()
    }

    /// Terminal quests still in the history, oldest first.
    pub fn archived_quests(&self) -> impl Iterator<Item = &Quest> {
        self.history
            .iter()
            .filter_map(|closed| closed.quest)
            .filter_map(|id| self.archive.get(&id))
    }

    /// Open (non-terminal) issues owned by `owner`.
    pub fn issues_of(&self, owner: ActorId) -> impl Iterator<Item = &Issue> {
        self.issues
            .values()
            .filter(move |i| i.owner() == owner && !i.state().is_terminal())
    }

    // ------------------------------------------------------------------
    // Offer & take
    // ------------------------------------------------------------------

    /// Evaluate every template for a candidate. Pure; safe to call at any time.
    pub fn potential_issues<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        candidate: ActorId,
    ) -> Vec<PotentialIssue> {
        if !self.enabled {
            return Vec::new();
        }
        self.catalog
            .iter()
            .map(|template| PotentialIssue {
                candidate,
                kind: template.kind(),
                frequency: template.frequency(),
                eligible: issue::evaluate(template, world, candidate) == IssueState::Potential,
            })
            .collect()
    }

    /// Create a `Potential` issue chosen by the scheduler.
    ///
    /// # Errors
    /// `TemplateUnavailable` for an unregistered template, `NotEligible`
    /// if the candidate does not qualify right now.
    pub fn offer<W: WorldQuery + ?Sized>(
        &mut self,
        world: &W,
        candidate: ActorId,
        kind: TemplateKind,
        now: CampaignTime,
    ) -> Result<IssueId> {
        let template = self.catalog.get(kind)?;
        if !self.enabled || !template.is_eligible(world, candidate) {
            return Err(QuestError::NotEligible { candidate, kind });
        }
        let issue = Issue::new(
            template,
            world,
            candidate,
            now,
            self.issues_config.issue_duration_days,
        );
        let id = issue.id();
        info!(
            issue = %id,
            owner = %candidate,
            kind = kind.as_str(),
            deadline = %issue.deadline(),
            "Issue offered"
        );
        self.issues.insert(id, issue);
        BoardCounters::bump(&self.counters.issues_offered);
        Ok(id)
    }

    /// The player tries to take an issue.
    ///
    /// On success the issue becomes `Active` and its quest exists in the
    /// `Offered` state, waiting for the offer dialog.
    ///
    /// # Errors
    /// `IssueNotFound`, `InvalidTransition` unless potential, or
    /// `NotEligible` if the owner can no longer generate a quest (the issue
    /// is abandoned in that case).
    pub fn take<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        issue_id: IssueId,
        now: CampaignTime,
    ) -> Result<TakeOutcome> {
        let issue = self
            .issues
            .get_mut(&issue_id)
            .ok_or(QuestError::IssueNotFound(issue_id))?;
        if issue.state() != IssueState::Potential {
            return Err(QuestError::InvalidTransition {
                entity: "issue",
                from: issue.state().as_str(),
                to: IssueState::Active.as_str(),
            });
        }
        let template = self.catalog.get(issue.kind())?;
        if let Err(blocked) = template.accept_preconditions(&*host, issue.owner()) {
            info!(issue = %issue_id, reasons = %blocked, "Issue blocked at accept time");
            BoardCounters::bump(&self.counters.accepts_blocked);
            return Ok(TakeOutcome::Blocked(blocked));
        }
        let Some(seed) = template.generate_quest(&*host, issue.owner()) else {
            warn!(issue = %issue_id, "Owner can no longer generate a quest; abandoning");
            let (candidate, kind) = (issue.owner(), issue.kind());
            issue.abandon();
            BoardCounters::bump(&self.counters.issues_abandoned);
            self.close(issue_id, None);
            return Err(QuestError::NotEligible { candidate, kind });
        };
        let quest = Quest::from_seed(
            &*host,
            issue_id,
            issue.owner(),
            seed,
            now,
            self.issues_config.quest_duration_days,
        );
        let quest_id = quest.id();
        issue.activate(quest_id, quest.deadline())?;
        self.quests.insert(quest_id, quest);
        BoardCounters::bump(&self.counters.issues_taken);
        Ok(TakeOutcome::Taken { quest: quest_id })
    }

    // ------------------------------------------------------------------
    // Dialog
    // ------------------------------------------------------------------

    fn live_mut(&mut self, id: QuestId) -> Result<&mut Quest> {
        self.quests.get_mut(&id).ok_or(QuestError::QuestNotFound(id))
    }

    /// The offer flow of an offered quest.
    ///
    /// # Errors
    /// `QuestNotFound`, `WrongPartner` or `InvalidTransition`.
    pub fn open_offer(&self, quest: QuestId, partner: ActorId) -> Result<DialogView> {
        self.quests
            .get(&quest)
            .ok_or(QuestError::QuestNotFound(quest))?
            .open_offer(partner)
    }

    /// The discuss flow of an accepted quest.
    ///
    /// # Errors
    /// `QuestNotFound`, `WrongPartner` or `InvalidTransition`.
    pub fn open_discuss<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        quest: QuestId,
        partner: ActorId,
        now: CampaignTime,
    ) -> Result<DialogView> {
        self.live_mut(quest)?.open_discuss(host, partner, now)
    }

    /// Apply a dialog selection.
    ///
    /// # Errors
    /// `QuestNotFound`, or the gate's `UnknownOption` / `OptionUnavailable`.
    pub fn choose<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        quest: QuestId,
        option: &str,
        now: CampaignTime,
    ) -> Result<DialogReply> {
        let bus = &self.bus;
        let live = self
            .quests
            .get_mut(&quest)
            .ok_or(QuestError::QuestNotFound(quest))?;
        live.choose(host, bus, option, now)
    }

    /// The conversation with the giver closed; run deferred actions.
    ///
    /// # Errors
    /// `QuestNotFound` if the quest is not live.
    pub fn end_interaction<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        quest: QuestId,
        now: CampaignTime,
    ) -> Result<Settlement> {
        let mut settled = Settlement::default();
        self.live_mut(quest)?.end_interaction(host, now);
        self.settle(host, quest, &mut settled);
        Ok(settled)
    }

    // ------------------------------------------------------------------
    // Events & time
    // ------------------------------------------------------------------

    /// Deliver a world event to every quest subscribed to its kind.
    pub fn dispatch<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        event: &WorldEvent,
        now: CampaignTime,
    ) -> DispatchReport {
        BoardCounters::bump(&self.counters.events_dispatched);
        let recipients = self.bus.recipients(event.kind());
        let mut report = DispatchReport::default();
        let mut finished = Vec::new();

        for id in recipients {
            let Some(quest) = self.quests.get_mut(&id) else {
                debug!(quest = %id, "Subscriber without a live quest");
                continue;
            };
            report.delivered += 1;
            BoardCounters::bump(&self.counters.deliveries);
            match quest.handle_event(event, host, now) {
                EventOutcome::Progress(_) => report.progressed += 1,
                EventOutcome::Cancelled(_) => finished.push(id),
                EventOutcome::Ignored => {}
            }
        }

        for id in finished {
            self.settle(host, id, &mut report.settled);
        }
        debug!(
            kind = ?event.kind(),
            delivered = report.delivered,
            progressed = report.progressed,
            "Event dispatched"
        );
        report
    }

    /// Advance the campaign clock to `now`.
    ///
    /// Order matters: deferred dialog actions committed before this call
    /// run first, so a hand-over confirmed in the same tick as the deadline
    /// succeeds. Then overdue quests fail (or, if never accepted, are
    /// withdrawn), and finally overdue potential issues expire.
    pub fn advance<H: Host + ?Sized>(&mut self, host: &mut H, now: CampaignTime) -> Settlement {
        let mut settled = Settlement::default();

        let pending: Vec<QuestId> = self
            .quests
            .values()
            .filter(|q| q.pending().is_some())
            .map(Quest::id)
            .collect();
        for id in pending {
            if let Some(quest) = self.quests.get_mut(&id) {
                quest.end_interaction(host, now);
            }
            self.settle(host, id, &mut settled);
        }

        let overdue: Vec<QuestId> = self
            .quests
            .values()
            .filter(|q| q.is_overdue(now))
            .map(Quest::id)
            .collect();
        for id in overdue {
            if let Some(quest) = self.quests.get_mut(&id) {
                if quest.state() == QuestState::Offered {
                    quest.cancel(host, CancelReason::Withdrawn, now);
                } else {
                    quest.time_out(host, now);
                }
            }
            self.settle(host, id, &mut settled);
        }

        let stale: Vec<IssueId> = self
            .issues
            .values()
            .filter(|i| i.state() == IssueState::Potential && i.is_overdue(now))
            .map(Issue::id)
            .collect();
        for id in stale {
            let Some(issue) = self.issues.get_mut(&id) else {
                continue;
            };
            if !issue.expire() {
                continue;
            }
            if let Ok(template) = self.catalog.get(issue.kind()) {
                template.on_issue_timeout(host, issue.owner());
            }
            BoardCounters::bump(&self.counters.issues_expired);
            settled.expired.push(id);
            self.close(id, None);
        }

        settled
    }

    /// Re-check every open issue against the world.
    ///
    /// An issue whose owner vanished or whose template no longer keeps it
    /// alive is abandoned; a live quest under it is cancelled first.
    pub fn reevaluate<H: Host + ?Sized>(&mut self, host: &mut H, now: CampaignTime) -> Settlement {
        let mut settled = Settlement::default();
        let doomed: Vec<(IssueId, Option<QuestId>, bool)> = self
            .issues
            .values()
            .filter(|i| !i.state().is_terminal())
            .filter_map(|i| {
                let owner_gone = host.actor(i.owner()).is_none();
                let alive = !owner_gone
                    && self
                        .catalog
                        .get(i.kind())
                        .is_ok_and(|t| t.stays_alive(&*host, i.owner()));
                (!alive).then_some((i.id(), i.quest(), owner_gone))
            })
            .collect();

        for (issue_id, quest_id, owner_gone) in doomed {
            let reason = if owner_gone {
                CancelReason::ReferenceLost
            } else {
                CancelReason::Withdrawn
            };
            if let Some(quest_id) = quest_id {
                if let Some(quest) = self.quests.get_mut(&quest_id) {
                    quest.cancel(host, reason, now);
                }
                self.settle(host, quest_id, &mut settled);
            }
            if self.issues.get_mut(&issue_id).is_some_and(Issue::abandon) {
                BoardCounters::bump(&self.counters.issues_abandoned);
                settled.abandoned.push(issue_id);
                self.close(issue_id, None);
            }
        }
        settled
    }

    /// Move a terminal quest to the archive and settle its issue.
    fn settle<H: Host + ?Sized>(&mut self, host: &mut H, quest_id: QuestId, settled: &mut Settlement) {
        if !self
            .quests
            .get(&quest_id)
            .is_some_and(|q| q.state().is_terminal())
        {
            return;
        }
        let Some(quest) = self.quests.remove(&quest_id) else {
            return;
        };

        if let Some(issue) = self.issues.get_mut(&quest.issue()) {
            let issue_id = issue.id();
            match quest.state() {
                QuestState::Succeeded => {
                    if issue.resolve() {
                        BoardCounters::bump(&self.counters.issues_resolved);
                        settled.resolved.push(issue_id);
                    }
                }
                QuestState::Failed => {
                    if issue.expire() {
                        if let Ok(template) = self.catalog.get(issue.kind()) {
                            template.on_issue_timeout(host, issue.owner());
                        }
                        BoardCounters::bump(&self.counters.issues_expired);
                        settled.expired.push(issue_id);
                    }
                }
                QuestState::Cancelled => {
                    if issue.abandon() {
                        BoardCounters::bump(&self.counters.issues_abandoned);
                        settled.abandoned.push(issue_id);
                    }
                }
                QuestState::Offered | QuestState::Accepted => {}
            }
        }

        match quest.state() {
            QuestState::Succeeded => {
                BoardCounters::bump(&self.counters.quests_succeeded);
                settled.succeeded.push(quest_id);
            }
            QuestState::Failed => {
                BoardCounters::bump(&self.counters.quests_failed);
                settled.failed.push(quest_id);
            }
            QuestState::Cancelled => {
                BoardCounters::bump(&self.counters.quests_cancelled);
                settled.cancelled.push(quest_id);
            }
            QuestState::Offered | QuestState::Accepted => {}
        }
        let issue_id = quest.issue();
        self.archive.insert(quest_id, quest);
        self.close(issue_id, Some(quest_id));
    }

    /// Record a closed issue and drop the oldest history past the limit.
    fn close(&mut self, issue: IssueId, quest: Option<QuestId>) {
        self.history.push_back(Closed { issue, quest });
        self.trim_history();
    }

    fn trim_history(&mut self) {
        let limit = usize::try_from(self.issues_config.history_limit).unwrap_or(usize::MAX);
        while self.history.len() > limit {
            let Some(oldest) = self.history.pop_front() else {
                break;
            };
            self.issues.remove(&oldest.issue);
            if let Some(quest) = oldest.quest {
                self.archive.remove(&quest);
            }
            debug!(issue = %oldest.issue, "Closed issue dropped from history");
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Capture open issues, live quests and the retained history as keyed
    /// records. Closed issues follow the open ones in closing order.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        let closed = self
            .history
            .iter()
            .filter_map(|c| self.issues.get(&c.issue));
        let issues = self
            .issues
            .values()
            .filter(|i| !i.state().is_terminal())
            .chain(closed)
            .map(persistence::issue_to_record)
            .collect();
        let quests = self
            .quests
            .values()
            .chain(self.archived_quests())
            .map(persistence::quest_to_record)
            .collect();
        BoardSnapshot::new(issues, quests)
    }

    /// Rebuild a board from a snapshot, re-registering accepted quests on
    /// a fresh bus.
    ///
    /// # Errors
    /// `UnsupportedSchema` for newer saves, `TemplateUnavailable` for
    /// templates not registered by `config`, field errors for malformed
    /// records, and `Corrupt` for dangling issue/quest links.
    pub fn restore(config: &SidequestConfig, snapshot: &BoardSnapshot) -> Result<Self> {
        if snapshot.schema > SCHEMA_VERSION {
            return Err(QuestError::UnsupportedSchema {
                found: snapshot.schema,
                supported: SCHEMA_VERSION,
            });
        }
        let mut board = Self::new(config)?;
        let mut closed_order = Vec::new();

        for record in &snapshot.issues {
            let issue = persistence::issue_from_record(record)?;
            board.catalog.get(issue.kind())?;
            if issue.state().is_terminal() {
                closed_order.push(issue.id());
            }
            board.issues.insert(issue.id(), issue);
        }

        let mut archived_by_issue = HashMap::new();
        for record in &snapshot.quests {
            let mut quest = persistence::quest_from_record(record)?;
            board.catalog.get(quest.payload().kind())?;
            if quest.state().is_terminal() {
                archived_by_issue.insert(quest.issue(), quest.id());
                board.archive.insert(quest.id(), quest);
                continue;
            }
            let linked = board
                .issues
                .get(&quest.issue())
                .is_some_and(|i| i.state() == IssueState::Active && i.quest() == Some(quest.id()));
            if !linked {
                return Err(QuestError::Corrupt(format!(
                    "quest {} is not owned by an active issue",
                    quest.id()
                )));
            }
            quest.resume(&board.bus);
            board.quests.insert(quest.id(), quest);
        }

        for issue in board.issues.values() {
            if let Some(quest) = issue.quest() {
                if !board.quests.contains_key(&quest) {
                    return Err(QuestError::Corrupt(format!(
                        "issue {} references missing quest {quest}",
                        issue.id()
                    )));
                }
            }
        }

        for issue in closed_order {
            let quest = archived_by_issue.remove(&issue);
            board.history.push_back(Closed { issue, quest });
        }
        for (issue, quest) in archived_by_issue {
            board.history.push_front(Closed {
                issue,
                quest: Some(quest),
            });
        }
        board.trim_history();

        info!(
            issues = board.issues.len(),
            live_quests = board.quests.len(),
            archived = board.archive.len(),
            listeners = board.bus.listener_count(),
            "Issue board restored"
        );
        Ok(board)
    }
}
