use std::sync::Arc;

use time::macros::date;

use season_engine::{
    db::{seed, SqliteStore},
    logic::{
        calendar::{
            action::{ActionQueueEntry, ActionType},
            handlers::HandlerTable,
            notify::LogSink,
            outcome::TierWeightedOutcome,
            CalendarScheduler, StopReason,
        },
        competition::{cup::Cup, Competition},
        competitor::Competitor,
        config::EngineConfig,
        email::Email,
        error::EngineError,
        storage::{DayChanges, Storage},
        transfer::{OfferResponse, OfferStatus, Player, TransferOffer},
    },
};

async fn store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:", date!(2025-07-01)).await.unwrap()
}

#[tokio::test]
async fn today_is_kept_in_the_database() {
    let store = store().await;
    assert_eq!(store.today().await.unwrap(), date!(2025-07-01));
    store.set_today(date!(2025-07-02)).await.unwrap();
    assert_eq!(store.today().await.unwrap(), date!(2025-07-02));
}

#[tokio::test]
async fn action_queue_round_trip() {
    let store = store().await;
    let ids = store.insert_actions(&[
        ActionQueueEntry::season_check(1, date!(2025-07-03)),
        ActionQueueEntry::competition_start(1, date!(2025-07-01)),
        ActionQueueEntry::email(4, date!(2025-07-01)),
    ]).await.unwrap();
    assert_eq!(ids, vec![1, 2, 3]);

    let due = store.due_actions(date!(2025-07-02)).await.unwrap();
    let due_ids: Vec<u32> = due.iter().map(|e| e.id).collect();
    assert_eq!(due_ids, vec![2, 3]);
    assert_eq!(due[0].action_type, ActionType::CompetitionStart);
    assert_eq!(due[1], ActionQueueEntry { id: 3, ..ActionQueueEntry::email(4, date!(2025-07-01)) });

    store.mark_completed(&[2]).await.unwrap();
    assert!(store.action(2).await.unwrap().completed);
    assert_eq!(store.due_actions(date!(2025-07-03)).await.unwrap().len(), 2);
    assert!(matches!(store.action(9).await, Err(EngineError::NotFound { .. })));
}

#[tokio::test]
async fn competitions_are_stored_as_snapshots() {
    let store = store().await;
    let competitors = (1..=5).map(|i| Competitor::build(i, &format!("Team {i}"))).collect();
    let mut cup = Competition::Cup(Cup::build("Open Cup", competitors).unwrap());
    let id = store.insert_competition(&mut cup).await.unwrap();
    assert_eq!(cup.id(), id);
    assert_eq!(store.competition_ids().await.unwrap(), vec![id]);

    let mut loaded = store.competition(id).await.unwrap();
    assert_eq!(loaded, cup);

    if let Competition::Cup(c) = &mut loaded {
        c.season = 2;
    }
    store.save_competition(&loaded).await.unwrap();
    assert_eq!(store.competition(id).await.unwrap().season(), 2);
}

#[tokio::test]
async fn emails_and_transfers() {
    let store = store().await;
    let mut email = Email::build("Board", "Welcome", "", date!(2025-07-01));
    let email_id = store.insert_email(&mut email).await.unwrap();
    assert!(email.deliver());
    store.save_email(&email).await.unwrap();
    assert_eq!(store.email(email_id).await.unwrap(), email);

    let mut player = Player::build("kaapo", Some(3), 50_000);
    store.insert_player(&mut player).await.unwrap();
    let mut offer = TransferOffer::build(&player, 1, 60_000);
    let offer_id = store.insert_offer(&mut offer).await.unwrap();
    assert_eq!(store.offer(offer_id).await.unwrap().status, OfferStatus::Pending);

    offer.respond(OfferResponse::Accept).unwrap();
    offer.finalize(&mut player).unwrap();
    store.save_offer(&offer).await.unwrap();
    store.save_player(&player).await.unwrap();
    assert_eq!(store.offer(offer_id).await.unwrap().status, OfferStatus::Finalized);
    assert_eq!(store.player(player.id).await.unwrap().team_id, Some(1));
}

#[tokio::test]
async fn calendar_runs_on_sqlite() {
    let store = Arc::new(store().await);
    let config = EngineConfig { seed: Some(5), max_iterations: 5, ..Default::default() };
    assert!(seed::initialise(store.as_ref(), &config).await.unwrap());

    let outcome = Arc::new(TierWeightedOutcome::build(config.seed));
    let mut scheduler = CalendarScheduler::new(store.clone(), HandlerTable::with_defaults(), outcome, Arc::new(LogSink), config);
    let summary = scheduler.run().await.unwrap();
    assert_eq!(summary.stop_reason, StopReason::IterationLimit);
    assert_eq!(store.today().await.unwrap(), date!(2025-07-06));

    // Both competitions have started and their openers are queued.
    for id in store.competition_ids().await.unwrap() {
        assert!(store.competition(id).await.unwrap().is_started());
    }
    assert!(store.due_actions(date!(2025-12-31)).await.unwrap().iter()
        .any(|e| e.action_type == ActionType::MatchdayNpc));
}

#[tokio::test]
async fn day_changes_are_written_in_one_transaction() {
    let store = store().await;
    store.insert_actions(&[ActionQueueEntry::season_check(1, date!(2025-07-01))]).await.unwrap();
    let mut player = Player::build("kaapo", Some(3), 50_000);
    store.insert_player(&mut player).await.unwrap();
    player.team_id = Some(1);

    // The second player does not exist, so the first one is not saved either.
    let mut ghost = Player::build("ghost", None, 1);
    ghost.id = 99;
    let changes = DayChanges {
        players: vec![player.clone(), ghost],
        new_actions: vec![ActionQueueEntry::season_check(1, date!(2025-07-02))],
        completed: vec![1],
        today: Some(date!(2025-07-02)),
        ..Default::default()
    };
    assert!(matches!(store.commit_changes(changes).await, Err(EngineError::NotFound { kind: "player", id: 99 })));
    assert_eq!(store.player(player.id).await.unwrap().team_id, Some(3));
    assert!(!store.action(1).await.unwrap().completed);
    assert!(matches!(store.action(2).await, Err(EngineError::NotFound { .. })));
    assert_eq!(store.today().await.unwrap(), date!(2025-07-01));

    let changes = DayChanges {
        players: vec![player.clone()],
        new_emails: vec![(Email::build("Transfers", "Welcome kaapo", "", date!(2025-07-01)), date!(2025-07-03))],
        completed: vec![1],
        today: Some(date!(2025-07-02)),
        ..Default::default()
    };
    store.commit_changes(changes).await.unwrap();
    assert_eq!(store.player(player.id).await.unwrap().team_id, Some(1));
    assert!(store.action(1).await.unwrap().completed);
    assert_eq!(store.action(2).await.unwrap(), ActionQueueEntry { id: 2, ..ActionQueueEntry::email(1, date!(2025-07-03)) });
    assert_eq!(store.email(1).await.unwrap().subject, "Welcome kaapo");
    assert_eq!(store.today().await.unwrap(), date!(2025-07-02));
}
