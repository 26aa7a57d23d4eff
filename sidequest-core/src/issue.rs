//! Issue state machine.
//!
//! ```text
//!  Dormant ──eligible──▶ Potential ──taken──▶ Active ──quest succeeded──▶ Resolved
//!                           │                   │
//!                           │                   ├──deadline / quest failed──▶ Expired
//!                           └──deadline─────────┤
//!                           └──invalidated──────┴──invalidated / quest cancelled──▶ Abandoned
//! ```
//!
//! `Dormant` and `Potential` are the result of pure evaluation and are not
//! cached: a candidate may qualify on one pass and not the next. An [`Issue`]
//! value exists once the scheduler has picked a candidate; it starts out
//! `Potential` and owns at most one quest once `Active`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{QuestError, Result};
use crate::template::{IssueTemplate, TemplateKind};
use crate::types::{ActorId, CampaignTime, IssueFrequency, IssueId, QuestId};
use crate::world::WorldQuery;

/// Lifecycle state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueState {
    /// The candidate does not qualify.
    Dormant,
    /// The candidate qualifies and the issue is on offer.
    Potential,
    /// Taken; a quest exists.
    Active,
    /// The quest succeeded. Terminal.
    Resolved,
    /// The deadline passed unresolved. Terminal.
    Expired,
    /// The owner or context became invalid. Terminal.
    Abandoned,
}

impl IssueState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Expired | Self::Abandoned)
    }

    /// Stable name, used in save records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dormant => "dormant",
            Self::Potential => "potential",
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Expired => "expired",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parse the name written by [`Self::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dormant" => Some(Self::Dormant),
            "potential" => Some(Self::Potential),
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            "expired" => Some(Self::Expired),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// Evaluate a candidate against a template. Pure and uncached.
pub fn evaluate<T, W>(template: &T, world: &W, candidate: ActorId) -> IssueState
where
    T: IssueTemplate + ?Sized,
    W: WorldQuery + ?Sized,
{
    if template.is_eligible(world, candidate) {
        IssueState::Potential
    } else {
        IssueState::Dormant
    }
}

/// One row of what the scheduler may offer for a candidate.
///
/// Ineligible templates are still listed (with `eligible: false`) so the
/// scheduler sees the full picture; only eligible ones can be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotentialIssue {
    /// The candidate actor.
    pub candidate: ActorId,
    /// Template.
    pub kind: TemplateKind,
    /// Scheduler hint.
    pub frequency: IssueFrequency,
    /// Whether the eligibility predicate holds right now.
    pub eligible: bool,
}

/// An offered or committed objective owned by a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub(crate) id: IssueId,
    pub(crate) owner: ActorId,
    pub(crate) kind: TemplateKind,
    pub(crate) frequency: IssueFrequency,
    pub(crate) created_at: CampaignTime,
    pub(crate) deadline: CampaignTime,
    pub(crate) state: IssueState,
    pub(crate) quest: Option<QuestId>,
    pub(crate) title: String,
    pub(crate) description: String,
}

impl Issue {
    /// A `Potential` issue for `owner`, expiring `duration_days` from `now`.
    pub fn new<T, W>(template: &T, world: &W, owner: ActorId, now: CampaignTime, duration_days: u32) -> Self
    where
        T: IssueTemplate + ?Sized,
        W: WorldQuery + ?Sized,
    {
        Self {
            id: IssueId::new(),
            owner,
            kind: template.kind(),
            frequency: template.frequency(),
            created_at: now,
            deadline: now.plus_days(duration_days),
            state: IssueState::Potential,
            quest: None,
            title: template.title(world, owner),
            description: template.description(world, owner),
        }
    }

    /// Issue identifier.
    #[must_use]
    pub fn id(&self) -> IssueId {
        self.id
    }

    /// The candidate posing the issue.
    #[must_use]
    pub fn owner(&self) -> ActorId {
        self.owner
    }

    /// Template.
    #[must_use]
    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// Scheduler hint.
    #[must_use]
    pub fn frequency(&self) -> IssueFrequency {
        self.frequency
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> CampaignTime {
        self.created_at
    }

    /// Offer deadline while potential; the quest's deadline once active.
    #[must_use]
    pub fn deadline(&self) -> CampaignTime {
        self.deadline
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> IssueState {
        self.state
    }

    /// The live quest, if active.
    #[must_use]
    pub fn quest(&self) -> Option<QuestId> {
        self.quest
    }

    /// Title shown on the offer.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Description shown on the offer.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_overdue(&self, now: CampaignTime) -> bool {
        self.deadline.has_elapsed(now)
    }

    /// Potential → Active, adopting the quest and its deadline.
    ///
    /// # Errors
    /// `InvalidTransition` unless the issue is potential.
    pub fn activate(&mut self, quest: QuestId, quest_deadline: CampaignTime) -> Result<()> {
        if self.state != IssueState::Potential {
            return Err(QuestError::InvalidTransition {
                entity: "issue",
                from: self.state.as_str(),
                to: IssueState::Active.as_str(),
            });
        }
        self.state = IssueState::Active;
        self.quest = Some(quest);
        self.deadline = quest_deadline;
        info!(issue = %self.id, quest = %quest, "Issue active");
        Ok(())
    }

    /// Active → Resolved.
    pub fn resolve(&mut self) -> bool {
        self.finish(&[IssueState::Active], IssueState::Resolved)
    }

    /// Potential/Active → Expired.
    pub fn expire(&mut self) -> bool {
        self.finish(&[IssueState::Potential, IssueState::Active], IssueState::Expired)
    }

    /// Potential/Active → Abandoned.
    pub fn abandon(&mut self) -> bool {
        self.finish(&[IssueState::Potential, IssueState::Active], IssueState::Abandoned)
    }

    fn finish(&mut self, from: &[IssueState], to: IssueState) -> bool {
        if !from.contains(&self.state) {
            return false;
        }
        self.state = to;
        self.quest = None;
        info!(issue = %self.id, state = to.as_str(), "Issue closed");
        true
    }
}
