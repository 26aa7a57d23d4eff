//! Conversation sessions.
//!
//! A [`ConversationSession`] lives for one host conversation with a quest
//! giver. It picks the flow from the quest state (offer while offered,
//! discuss while accepted), renders lines for the host, forwards the
//! player's selection and, on close, runs whatever the conversation left
//! pending.
//!
//! Host writers may supply their own lines through [`LineOverrides`]. Any
//! line may use two tokens:
//!
//! | Token       | Replaced with                                 |
//! |-------------|-----------------------------------------------|
//! | `{GIVER}`   | the giver's display name                      |
//! | `{ADDRESS}` | how the giver addresses the player ("friend") |

use std::collections::HashMap;

use sidequest_core::board::{IssueBoard, Settlement};
use sidequest_core::dialog::{DialogReply, DialogView, FlowKind};
use sidequest_core::error::QuestError;
use sidequest_core::quest::QuestState;
use sidequest_core::types::{ActorId, CampaignTime, QuestId};
use sidequest_core::world::Host;
use tracing::debug;

use crate::error::Result;

/// Values substituted into rendered lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineContext {
    /// Giver display name.
    pub giver: String,
    /// Form of address for the player.
    pub address: String,
}

impl LineContext {
    /// Replace `{GIVER}` and `{ADDRESS}` in `line`.
    #[must_use]
    pub fn render(&self, line: &str) -> String {
        line.replace("{GIVER}", &self.giver)
            .replace("{ADDRESS}", &self.address)
    }
}

/// Host-authored replacements for engine lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOverrides {
    /// Giver prompt per flow.
    pub prompts: HashMap<FlowKind, String>,
    /// Player line per option id.
    pub options: HashMap<String, String>,
    /// Giver reply per option id.
    pub replies: HashMap<String, String>,
}

/// One open conversation about one quest.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    quest: QuestId,
    partner: ActorId,
    view: DialogView,
    context: LineContext,
    overrides: LineOverrides,
}

impl ConversationSession {
    /// Open a conversation with `partner` about `quest`.
    ///
    /// # Errors
    /// `QuestNotFound`, `WrongPartner`, or `InvalidTransition` when the
    /// quest is already terminal.
    pub fn open<H: Host + ?Sized>(
        board: &mut IssueBoard,
        host: &mut H,
        quest: QuestId,
        partner: ActorId,
        context: LineContext,
        now: CampaignTime,
    ) -> Result<Self> {
        let state = board
            .quest(quest)
            .ok_or(QuestError::QuestNotFound(quest))?
            .state();
        let view = match state {
            QuestState::Offered => board.open_offer(quest, partner)?,
            QuestState::Accepted => board.open_discuss(host, quest, partner, now)?,
            other => {
                return Err(QuestError::InvalidTransition {
                    entity: "quest",
                    from: other.as_str(),
                    to: "conversation",
                }
                .into());
            }
        };
        debug!(quest = %quest, flow = ?view.flow, "Conversation opened");
        Ok(Self {
            quest,
            partner,
            view,
            context,
            overrides: LineOverrides::default(),
        })
    }

    /// Use host-authored lines where provided.
    #[must_use]
    pub fn with_overrides(mut self, overrides: LineOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// The quest under discussion.
    #[must_use]
    pub fn quest(&self) -> QuestId {
        self.quest
    }

    /// The giver being talked to.
    #[must_use]
    pub fn partner(&self) -> ActorId {
        self.partner
    }

    /// The open flow with every line rendered.
    #[must_use]
    pub fn view(&self) -> DialogView {
        let mut view = self.view.clone();
        if let Some(prompt) = self.overrides.prompts.get(&view.flow) {
            view.prompt.clone_from(prompt);
        }
        view.prompt = self.context.render(&view.prompt);
        for option in &mut view.options {
            if let Some(text) = self.overrides.options.get(option.id) {
                option.text.clone_from(text);
            }
            option.text = self.context.render(&option.text);
        }
        view
    }

    /// Apply the player's choice and return the giver's rendered reply.
    ///
    /// # Errors
    /// The gate's `UnknownOption` / `OptionUnavailable`, or `QuestNotFound`.
    pub fn select<H: Host + ?Sized>(
        &mut self,
        board: &mut IssueBoard,
        host: &mut H,
        option: &str,
        now: CampaignTime,
    ) -> Result<DialogReply> {
        let mut reply = board.choose(host, self.quest, option, now)?;
        if let Some(line) = self.overrides.replies.get(option) {
            reply.line.clone_from(line);
        }
        reply.line = self.context.render(&reply.line);
        Ok(reply)
    }

    /// The host closed the conversation; run deferred actions.
    ///
    /// # Errors
    /// `QuestNotFound` if the quest left the board meanwhile.
    pub fn close<H: Host + ?Sized>(
        self,
        board: &mut IssueBoard,
        host: &mut H,
        now: CampaignTime,
    ) -> Result<Settlement> {
        debug!(quest = %self.quest, "Conversation closed");
        Ok(board.end_interaction(host, self.quest, now)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidequest_core::SidequestConfig;
    use sidequest_core::board::TakeOutcome;
    use sidequest_core::dialog::{OPTION_ACCEPT, OPTION_HAND_OVER, OPTION_STILL_WORKING};
    use sidequest_core::template::TemplateKind;
    use sidequest_core::types::{FactionId, ItemStack, SettlementId};
    use sidequest_core::world::sandbox::SandboxWorld;
    use sidequest_core::world::{ActorProfile, ActorRoles, SettlementProfile};

    use crate::error::CampaignError;

    fn context() -> LineContext {
        LineContext {
            giver: "Orela".into(),
            address: "friend".into(),
        }
    }

    fn offered() -> (IssueBoard, SandboxWorld, QuestId, ActorId) {
        let mut world = SandboxWorld::new();
        world.set_player_faction(Some(FactionId::new()));
        let town = world.add_settlement(SettlementProfile {
            id: SettlementId::new(),
            name: "Epicrotea".into(),
            is_town: true,
            is_starving: true,
            owner_faction: Some(FactionId::new()),
        });
        let merchant = world.add_actor(
            ActorProfile::new(ActorId::new(), "Orela")
                .with_roles(ActorRoles {
                    is_merchant: true,
                    ..ActorRoles::default()
                })
                .with_settlement(town),
        );
        let mut board = IssueBoard::new(&SidequestConfig::default()).expect("board");
        let issue = board
            .offer(&world, merchant, TemplateKind::SupplyDelivery, CampaignTime::ZERO)
            .expect("offer");
        let TakeOutcome::Taken { quest } =
            board.take(&mut world, issue, CampaignTime::ZERO).expect("take")
        else {
            panic!("blocked");
        };
        (board, world, quest, merchant)
    }

    #[test]
    fn tokens_are_rendered() {
        assert_eq!(
            context().render("Well met, {ADDRESS}. {GIVER} remembers you."),
            "Well met, friend. Orela remembers you."
        );
    }

    #[test]
    fn offered_quest_opens_the_offer_flow() {
        let (mut board, mut world, quest, merchant) = offered();
        let session =
            ConversationSession::open(&mut board, &mut world, quest, merchant, context(), CampaignTime::ZERO)
                .expect("open");
        let view = session.view();
        assert_eq!(view.flow, FlowKind::Offer);
        assert!(view.option(OPTION_ACCEPT).is_some());
    }

    #[test]
    fn overrides_replace_and_render() {
        let (mut board, mut world, quest, merchant) = offered();
        let mut overrides = LineOverrides::default();
        overrides
            .prompts
            .insert(FlowKind::Offer, "{ADDRESS}, {GIVER} begs you.".into());
        overrides
            .replies
            .insert(OPTION_ACCEPT.to_string(), "Thank you, {ADDRESS}.".into());

        let mut session =
            ConversationSession::open(&mut board, &mut world, quest, merchant, context(), CampaignTime::ZERO)
                .expect("open")
                .with_overrides(overrides);
        assert_eq!(session.view().prompt, "friend, Orela begs you.");

        let reply = session
            .select(&mut board, &mut world, OPTION_ACCEPT, CampaignTime::ZERO)
            .expect("accept");
        assert_eq!(reply.line, "Thank you, friend.");
        assert_eq!(board.quest(quest).expect("quest").state(), QuestState::Accepted);
    }

    #[test]
    fn hand_over_completes_on_close() {
        let (mut board, mut world, quest, merchant) = offered();
        board
            .choose(&mut world, quest, OPTION_ACCEPT, CampaignTime::ZERO)
            .expect("accept");
        world.give_item(ItemStack::new("grain", "grain", 8, 20));

        let now = CampaignTime::from_days(2);
        let mut session =
            ConversationSession::open(&mut board, &mut world, quest, merchant, context(), now).expect("open");
        assert_eq!(session.view().flow, FlowKind::Discuss);
        session
            .select(&mut board, &mut world, OPTION_HAND_OVER, now)
            .expect("hand over");
        let settled = session.close(&mut board, &mut world, now).expect("close");
        assert_eq!(settled.succeeded, vec![quest]);
    }

    #[test]
    fn stalling_leaves_the_quest_running() {
        let (mut board, mut world, quest, merchant) = offered();
        board
            .choose(&mut world, quest, OPTION_ACCEPT, CampaignTime::ZERO)
            .expect("accept");
        let now = CampaignTime::from_days(1);
        let mut session =
            ConversationSession::open(&mut board, &mut world, quest, merchant, context(), now).expect("open");
        let view = session.view();
        assert!(!view.option(OPTION_HAND_OVER).expect("present").availability.is_available());
        session
            .select(&mut board, &mut world, OPTION_STILL_WORKING, now)
            .expect("stall");
        assert!(session.close(&mut board, &mut world, now).expect("close").is_empty());
        assert_eq!(board.quest(quest).expect("quest").state(), QuestState::Accepted);
    }

    #[test]
    fn strangers_cannot_open_the_conversation() {
        let (mut board, mut world, quest, _) = offered();
        let err = ConversationSession::open(
            &mut board,
            &mut world,
            quest,
            ActorId::new(),
            context(),
            CampaignTime::ZERO,
        )
        .expect_err("wrong partner");
        assert!(matches!(err, CampaignError::Quest(QuestError::WrongPartner(_))));
    }
}
