//! Dialog gate — the fixed interaction graph of every quest.
//!
//! Two flows exist per template:
//!
//! - **Offer**: a single giver line whose only option accepts the quest.
//! - **Discuss**: a giver prompt with "hand over" (gated on completed
//!   progress) and "still working on it" (always available).
//!
//! Nodes are stateless templates built from a template's [`DialogLines`].
//! Gate evaluation takes the owning quest's completion flag, so the same
//! node serves every instance. Selecting "hand over" does not complete the
//! quest: it schedules [`DeferredAction::CompleteOnInteractionEnd`], which
//! the interaction-end hook consumes.

use serde::{Deserialize, Serialize};

use crate::error::{QuestError, Result};
use crate::types::QuestId;

/// Option id of the offer flow's accept choice.
pub const OPTION_ACCEPT: &str = "accept";
/// Option id of the gated hand-over choice.
pub const OPTION_HAND_OVER: &str = "hand_over";
/// Option id of the always-available stall choice.
pub const OPTION_STILL_WORKING: &str = "still_working";

/// Which of the two flows a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    /// Taking the quest on.
    Offer,
    /// Talking to the giver while the quest runs.
    Discuss,
}

/// A named action run when the current interaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredAction {
    /// Complete the quest successfully once the conversation closes.
    CompleteOnInteractionEnd,
}

impl DeferredAction {
    /// Stable name, used in save records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompleteOnInteractionEnd => "complete_on_interaction_end",
        }
    }

    /// Parse the name written by [`Self::as_str`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "complete_on_interaction_end" => Some(Self::CompleteOnInteractionEnd),
            _ => None,
        }
    }
}

/// When an option may be chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Always selectable.
    Always,
    /// Selectable only once the objective is met.
    RequiresCompletion {
        /// Reason shown while the option is disabled.
        unmet: String,
    },
}

/// What choosing an option does to the quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consequence {
    /// Nothing; the conversation continues.
    None,
    /// Offered → Accepted, immediately.
    AcceptQuest,
    /// Schedule an action for when the interaction ends.
    Defer(DeferredAction),
}

/// One player choice in a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogOption {
    /// Stable id used by the host to report the selection.
    pub id: &'static str,
    /// Player line.
    pub text: String,
    /// Availability rule.
    pub gate: Gate,
    /// Effect on the quest.
    pub consequence: Consequence,
    /// Giver reply after the choice.
    pub reply: String,
}

/// A node of the interaction graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogNode {
    /// Flow this node belongs to.
    pub flow: FlowKind,
    /// Giver line.
    pub prompt: String,
    /// Player choices.
    pub options: Vec<DialogOption>,
}

/// Template texts for both flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogLines {
    /// Giver line when the quest is accepted.
    pub offer: String,
    /// Player line closing the offer.
    pub accept: String,
    /// Giver prompt when discussing the running quest.
    pub discuss_prompt: String,
    /// Player line handing the goods over.
    pub hand_over: String,
    /// Player line asking for more time.
    pub still_working: String,
    /// Giver reply to a hand-over.
    pub thanks: String,
    /// Giver reply to a request for more time.
    pub waiting: String,
    /// Disabled reason for the hand-over option.
    pub missing_items: String,
}

/// Whether a presented option can be clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Clickable.
    Available,
    /// Shown but disabled, with a reason for the player.
    Disabled {
        /// Human-readable reason.
        reason: String,
    },
}

impl Availability {
    /// Whether the option is clickable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// An option as the host should render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedOption {
    /// Option id.
    pub id: &'static str,
    /// Player line.
    pub text: String,
    /// Gate result.
    pub availability: Availability,
}

/// A node evaluated for one quest instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogView {
    /// The quest being discussed.
    pub quest: QuestId,
    /// Flow shown.
    pub flow: FlowKind,
    /// Giver line.
    pub prompt: String,
    /// Options with their availability.
    pub options: Vec<PresentedOption>,
}

impl DialogView {
    /// Look up a presented option.
    #[must_use]
    pub fn option(&self, id: &str) -> Option<&PresentedOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// The giver's answer to a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogReply {
    /// Giver line.
    pub line: String,
    /// What the selection did.
    pub consequence: Consequence,
}

impl DialogNode {
    /// The offer flow for a template.
    #[must_use]
    pub fn offer(lines: &DialogLines) -> Self {
        Self {
            flow: FlowKind::Offer,
            prompt: lines.offer.clone(),
            options: vec![DialogOption {
                id: OPTION_ACCEPT,
                text: lines.accept.clone(),
                gate: Gate::Always,
                consequence: Consequence::AcceptQuest,
                reply: String::new(),
            }],
        }
    }

    /// The discuss flow for a template.
    #[must_use]
    pub fn discuss(lines: &DialogLines) -> Self {
        Self {
            flow: FlowKind::Discuss,
            prompt: lines.discuss_prompt.clone(),
            options: vec![
                DialogOption {
                    id: OPTION_HAND_OVER,
                    text: lines.hand_over.clone(),
                    gate: Gate::RequiresCompletion {
                        unmet: lines.missing_items.clone(),
                    },
                    consequence: Consequence::Defer(DeferredAction::CompleteOnInteractionEnd),
                    reply: lines.thanks.clone(),
                },
                DialogOption {
                    id: OPTION_STILL_WORKING,
                    text: lines.still_working.clone(),
                    gate: Gate::Always,
                    consequence: Consequence::None,
                    reply: lines.waiting.clone(),
                },
            ],
        }
    }

    /// Evaluate every gate for a quest whose objective is (`complete`) or is not met.
    #[must_use]
    pub fn present(&self, quest: QuestId, complete: bool) -> DialogView {
        DialogView {
            quest,
            flow: self.flow,
            prompt: self.prompt.clone(),
            options: self
                .options
                .iter()
                .map(|o| PresentedOption {
                    id: o.id,
                    text: o.text.clone(),
                    availability: o.availability(complete),
                })
                .collect(),
        }
    }

    /// Resolve a selection against the gates.
    ///
    /// # Errors
    /// `UnknownOption` if the id is not in this node, `OptionUnavailable`
    /// if its gate is closed.
    pub fn select(&self, id: &str, complete: bool) -> Result<&DialogOption> {
        let option = self
            .options
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| QuestError::UnknownOption(id.to_string()))?;
        match option.availability(complete) {
            Availability::Available => Ok(option),
            Availability::Disabled { reason } => Err(QuestError::OptionUnavailable { reason }),
        }
    }
}

impl DialogOption {
    fn availability(&self, complete: bool) -> Availability {
        match &self.gate {
            Gate::Always => Availability::Available,
            Gate::RequiresCompletion { .. } if complete => Availability::Available,
            Gate::RequiresCompletion { unmet } => Availability::Disabled {
                reason: unmet.clone(),
            },
        }
    }
}
