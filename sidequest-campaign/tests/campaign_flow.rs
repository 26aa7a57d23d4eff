//! Host-style flows: native callbacks through hooks, the campaign rule,
//! conversations and the SQLite snapshot store.

use sidequest_campaign::hooks::{self, NativeParty, RosterElement};
use sidequest_campaign::{
    CampaignConfig, CampaignError, CampaignRule, ConversationSession, LineContext, SnapshotStore,
};
use sidequest_core::board::TakeOutcome;
use sidequest_core::config::PersistenceConfig;
use sidequest_core::dialog::{OPTION_ACCEPT, OPTION_HAND_OVER};
use sidequest_core::events::BattleSide;
use sidequest_core::quest::QuestState;
use sidequest_core::template::TemplateKind;
use sidequest_core::world::sandbox::SandboxWorld;
use sidequest_core::world::{ActorProfile, ActorRoles, SettlementProfile};
use sidequest_core::{CampaignTime, IssueState, QuestId};

const PLAYER_KINGDOM: u64 = 1;
const TOWN_KINGDOM: u64 = 2;
const MERCHANT: u64 = 11;
const TOWN: &str = "town_A1";

struct Host {
    world: SandboxWorld,
    rule: CampaignRule,
}

fn host() -> Host {
    let mut rule = CampaignRule::new(CampaignConfig::default()).expect("rule");
    let mut world = SandboxWorld::new();
    let ids = rule.ids_mut();
    world.set_player_faction(Some(ids.faction(PLAYER_KINGDOM)));
    let lords = ids.faction(TOWN_KINGDOM);
    let town = world.add_settlement(SettlementProfile {
        id: ids.settlement(TOWN),
        name: "Danustica".into(),
        is_town: true,
        is_starving: true,
        owner_faction: Some(lords),
    });
    world.add_actor(
        ActorProfile::new(ids.actor(MERCHANT), "Sela")
            .with_roles(ActorRoles {
                is_merchant: true,
                ..ActorRoles::default()
            })
            .with_faction(lords)
            .with_settlement(town),
    );
    Host { world, rule }
}

fn context() -> LineContext {
    LineContext {
        giver: "Sela".into(),
        address: "traveller".into(),
    }
}

fn take_and_accept(h: &mut Host) -> QuestId {
    let issue = h
        .rule
        .on_issue_selected(&h.world, MERCHANT, TemplateKind::SupplyDelivery, CampaignTime::ZERO)
        .expect("select");
    let TakeOutcome::Taken { quest } = h
        .rule
        .on_player_takes_issue(&mut h.world, issue, CampaignTime::ZERO)
        .expect("take")
    else {
        panic!("blocked");
    };
    let giver = h.rule.ids().known_actor(MERCHANT).expect("merchant");
    let mut session = ConversationSession::open(
        h.rule.board_mut(),
        &mut h.world,
        quest,
        giver,
        context(),
        CampaignTime::ZERO,
    )
    .expect("open offer");
    session
        .select(h.rule.board_mut(), &mut h.world, OPTION_ACCEPT, CampaignTime::ZERO)
        .expect("accept");
    session
        .close(h.rule.board_mut(), &mut h.world, CampaignTime::ZERO)
        .expect("close");
    quest
}

fn buy_grain(h: &mut Host, count: i32, now: CampaignTime) {
    let row = RosterElement {
        item_id: "grain".into(),
        category: "grain".into(),
        value: 8,
        amount: count,
    };
    h.world.give_item(sidequest_core::ItemStack::new(
        "grain",
        "grain",
        8,
        count.unsigned_abs(),
    ));
    let event = hooks::on_roster_exchange(&[row], &[], true);
    h.rule.on_event(&mut h.world, &event, now);
}

fn hand_over(h: &mut Host, quest: QuestId, now: CampaignTime) -> sidequest_core::board::Settlement {
    let giver = h.rule.ids().known_actor(MERCHANT).expect("merchant");
    let mut session =
        ConversationSession::open(h.rule.board_mut(), &mut h.world, quest, giver, context(), now)
            .expect("open discuss");
    session
        .select(h.rule.board_mut(), &mut h.world, OPTION_HAND_OVER, now)
        .expect("hand over");
    session.close(h.rule.board_mut(), &mut h.world, now).expect("close")
}

#[test]
fn delivery_through_native_callbacks() {
    let mut h = host();
    let quest = take_and_accept(&mut h);

    buy_grain(&mut h, 12, CampaignTime::from_days(1));
    assert_eq!(h.rule.board().quest(quest).expect("quest").progress(), Some((12, 20)));
    buy_grain(&mut h, 8, CampaignTime::from_days(2));
    assert!(h.rule.board().quest(quest).expect("quest").objective_met());

    let settled = hand_over(&mut h, quest, CampaignTime::from_days(3));
    assert_eq!(settled.succeeded, vec![quest]);
    assert_eq!(settled.resolved.len(), 1);
    assert_eq!(h.rule.board().bus().listener_count(), 0);
}

#[test]
fn raid_on_the_town_cancels_the_delivery() {
    let mut h = host();
    let quest = take_and_accept(&mut h);

    let raiders = NativeParty {
        leader: Some(77),
        faction: Some(9),
        settlement: None,
        is_player: false,
    };
    let villagers = NativeParty {
        settlement: Some(TOWN.into()),
        ..NativeParty::default()
    };
    let started = hooks::on_map_event_started(h.rule.ids_mut(), 500, &raiders, &villagers);
    let report = h.rule.on_event(&mut h.world, &started, CampaignTime::from_days(1));
    assert!(report.settled.is_empty());

    let finished = hooks::on_raid_completed(h.rule.ids_mut(), BattleSide::Attacker, 500, TOWN);
    let report = h.rule.on_event(&mut h.world, &finished, CampaignTime::from_days(1));
    assert_eq!(report.settled.cancelled, vec![quest]);
    assert_eq!(
        h.rule.board().quest(quest).expect("quest").state(),
        QuestState::Cancelled
    );
    assert_eq!(h.rule.ids().running_map_events(), 0);
}

#[test]
fn war_between_kingdoms_cancels_the_quest() {
    let mut h = host();
    let quest = take_and_accept(&mut h);
    let (ours, theirs) = (
        h.rule.ids_mut().faction(PLAYER_KINGDOM),
        h.rule.ids_mut().faction(TOWN_KINGDOM),
    );
    h.world.declare_war(theirs, ours);

    let event = hooks::on_war_declared(h.rule.ids_mut(), TOWN_KINGDOM, PLAYER_KINGDOM);
    let report = h.rule.on_event(&mut h.world, &event, CampaignTime::from_days(4));
    assert_eq!(report.settled.cancelled, vec![quest]);
}

#[test]
fn player_attacking_the_town_is_coercion() {
    let mut h = host();
    let quest = take_and_accept(&mut h);
    let player = NativeParty {
        leader: Some(1),
        faction: Some(PLAYER_KINGDOM),
        settlement: None,
        is_player: true,
    };
    let caravan = NativeParty {
        settlement: Some(TOWN.into()),
        faction: Some(TOWN_KINGDOM),
        ..NativeParty::default()
    };
    let event = hooks::on_map_event_started(h.rule.ids_mut(), 42, &player, &caravan);
    let report = h.rule.on_event(&mut h.world, &event, CampaignTime::from_days(2));
    assert_eq!(report.settled.cancelled, vec![quest]);
}

#[test]
fn campaign_resumes_from_an_earlier_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("snapshots.db");
    let persistence = PersistenceConfig::default();

    let mut h = host();
    let quest = take_and_accept(&mut h);
    buy_grain(&mut h, 5, CampaignTime::from_days(1));

    let store = SnapshotStore::open(&path, &persistence).expect("store");
    let early = h.rule.save_to(&store, CampaignTime::from_days(1)).expect("save");
    buy_grain(&mut h, 15, CampaignTime::from_days(2));
    let settled = hand_over(&mut h, quest, CampaignTime::from_days(2));
    assert_eq!(settled.succeeded, vec![quest]);
    h.rule.save_to(&store, CampaignTime::from_days(2)).expect("save");
    drop(store);

    let store = SnapshotStore::open(&path, &persistence).expect("reopen");
    let newest = CampaignRule::load_from(CampaignConfig::default(), &store).expect("load");
    assert_eq!(newest.board().live_quests().count(), 0);

    h.rule = CampaignRule::load_version(CampaignConfig::default(), &store, early).expect("load");
    assert_eq!(
        h.rule.board().quest(quest).expect("quest").progress(),
        Some((5, 20))
    );
    assert!(h.rule.board().bus().is_subscribed(quest));

    buy_grain(&mut h, 20, CampaignTime::from_days(3));
    let settled = hand_over(&mut h, quest, CampaignTime::from_days(3));
    assert_eq!(settled.succeeded, vec![quest]);
}

#[test]
fn deadline_passes_on_the_daily_tick() {
    let mut h = host();
    let quest = take_and_accept(&mut h);
    let issue = h.rule.board().quest(quest).expect("quest").issue();

    let mut failed = Vec::new();
    for day in 1..=20 {
        let tick = h.rule.on_tick(&mut h.world, CampaignTime::from_days(day));
        failed.extend(tick.settled.failed);
    }
    assert_eq!(failed, vec![quest]);
    assert_eq!(
        h.rule.board().issue(issue).expect("issue").state(),
        IssueState::Expired
    );
}

#[test]
fn empty_store_is_reported() {
    let store = SnapshotStore::open_in_memory(&PersistenceConfig::default()).expect("store");
    let err = CampaignRule::load_from(CampaignConfig::default(), &store).expect_err("empty");
    assert!(matches!(err, CampaignError::NoSnapshot(campaign) if campaign == "sidequest"));
}
