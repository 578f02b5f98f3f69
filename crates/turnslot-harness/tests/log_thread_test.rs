//! Turn log behavior through the full coordinator.
//!
//! Covers sub-surface discovery (reuse before create), bounded summary
//! rewriting, unbounded per-entry messages, recovery when the log
//! sub-surface disappears, and entries whose first write failed.

use std::{sync::Arc, time::Duration};

use turnslot_core::{Control, CoordinatorConfig, SurfaceId, UserId};
use turnslot_harness::{FaultyStore, SimEnv, StoreOp};
use turnslot_server::{
    ActionEvent, Coordinator, InboundEvent, MemoryStore, MessageStore, StoreError,
};

const ME: UserId = UserId(7);
const CHANNEL: SurfaceId = SurfaceId(1);

async fn ready(store: &Arc<MemoryStore>, config: CoordinatorConfig) -> Coordinator<MemoryStore, SimEnv> {
    let mut coordinator = Coordinator::new(Arc::clone(store), SimEnv::new(), config);
    let _ = coordinator.handle_event(InboundEvent::Ready { self_id: ME }).await;
    coordinator.settle().await;
    coordinator
}

/// `user` takes the slot and gives it back.
async fn turn(store: &MemoryStore, coordinator: &mut Coordinator<MemoryStore, SimEnv>, user: u64) {
    for control in [Control::Start, Control::Release] {
        let panel = store.latest_with_controls(CHANNEL).await.expect("panel");
        let event = InboundEvent::Action(ActionEvent {
            surface: CHANNEL,
            origin: panel.id,
            actor: UserId(user),
            control_id: control.id().to_string(),
        });
        let _ = coordinator.handle_event(event).await;
    }
    coordinator.settle().await;
}

#[tokio::test]
async fn bounded_log_rewrites_one_summary() {
    let store = Arc::new(MemoryStore::new(ME));
    let mut coordinator = ready(&store, CoordinatorConfig::for_surface(CHANNEL)).await;

    turn(&store, &mut coordinator, 1).await;
    turn(&store, &mut coordinator, 2).await;

    let thread = coordinator.surface(CHANNEL).expect("surface").log_thread().await.expect("thread");
    let messages = store.messages(thread).await;
    assert_eq!(messages.len(), 1);

    let lines: Vec<&str> = messages[0].content.lines().collect();
    assert_eq!(lines[0], "**Turn log** (last 50, newest first)");
    assert!(lines[1].ends_with("<@2> finished searching"));
    assert!(lines[2].ends_with("<@1> finished searching"));
    assert!(messages[0].controls.is_empty());
}

#[tokio::test]
async fn bounded_log_keeps_only_the_tail() {
    let store = Arc::new(MemoryStore::new(ME));
    let config =
        CoordinatorConfig { log_retention: Some(2), ..CoordinatorConfig::for_surface(CHANNEL) };
    let mut coordinator = ready(&store, config).await;

    for user in 1..=3 {
        turn(&store, &mut coordinator, user).await;
    }

    let handle = coordinator.surface(CHANNEL).expect("surface");
    assert_eq!(handle.log_book().await.len(), 2);
    let thread = handle.log_thread().await.expect("thread");
    let summary = &store.messages(thread).await[0].content;
    assert!(summary.contains("<@3>") && summary.contains("<@2>"));
    assert!(!summary.contains("<@1>"));
}

#[tokio::test]
async fn unbounded_log_posts_each_entry() {
    let store = Arc::new(MemoryStore::new(ME));
    let config = CoordinatorConfig { log_retention: None, ..CoordinatorConfig::for_surface(CHANNEL) };
    let mut coordinator = ready(&store, config).await;

    for user in 1..=3 {
        turn(&store, &mut coordinator, user).await;
    }

    let thread = coordinator.surface(CHANNEL).expect("surface").log_thread().await.expect("thread");
    let contents: Vec<String> =
        store.messages(thread).await.into_iter().map(|message| message.content).collect();
    assert_eq!(contents.len(), 3);
    for (user, content) in (1..=3).zip(&contents) {
        assert!(content.ends_with(&format!("<@{user}> finished searching")), "{content}");
    }
}

#[tokio::test]
async fn archived_thread_is_reused() {
    let store = Arc::new(MemoryStore::new(ME));
    let existing = store.create_sub_surface(CHANNEL, "turnslot-log").await.expect("thread");
    store.archive(CHANNEL, existing.id).await;

    let coordinator = ready(&store, CoordinatorConfig::for_surface(CHANNEL)).await;

    let handle = coordinator.surface(CHANNEL).expect("surface");
    assert_eq!(handle.log_thread().await, Some(existing.id));
    assert_eq!(store.sub_surfaces(CHANNEL).await.len(), 1);
}

#[tokio::test]
async fn active_thread_wins_over_archived() {
    let store = Arc::new(MemoryStore::new(ME));
    let archived = store.create_sub_surface(CHANNEL, "turnslot-log").await.expect("thread");
    store.archive(CHANNEL, archived.id).await;
    let active = store.create_sub_surface(CHANNEL, "turnslot-log").await.expect("thread");
    store.create_sub_surface(CHANNEL, "general").await.expect("thread");

    let coordinator = ready(&store, CoordinatorConfig::for_surface(CHANNEL)).await;

    let handle = coordinator.surface(CHANNEL).expect("surface");
    assert_eq!(handle.log_thread().await, Some(active.id));
}

#[tokio::test]
async fn second_ready_does_not_create_another_thread() {
    let store = Arc::new(MemoryStore::new(ME));
    let mut coordinator = ready(&store, CoordinatorConfig::for_surface(CHANNEL)).await;

    let _ = coordinator.handle_event(InboundEvent::Ready { self_id: ME }).await;
    coordinator.settle().await;

    assert_eq!(store.sub_surfaces(CHANNEL).await.len(), 1);
    assert_eq!(store.panels(CHANNEL).await.len(), 1);
}

#[tokio::test]
async fn deleted_thread_is_recreated_on_next_entry() {
    let store = Arc::new(MemoryStore::new(ME));
    let mut coordinator = ready(&store, CoordinatorConfig::for_surface(CHANNEL)).await;
    turn(&store, &mut coordinator, 1).await;

    let old = coordinator.surface(CHANNEL).expect("surface").log_thread().await.expect("thread");
    store.delete_sub_surface(CHANNEL, old).await;

    turn(&store, &mut coordinator, 2).await;

    let new = coordinator.surface(CHANNEL).expect("surface").log_thread().await.expect("thread");
    assert_ne!(new, old);
    let summary = &store.messages(new).await[0].content;
    // The in-memory book survives, so the new summary has both turns.
    assert!(summary.contains("<@1>") && summary.contains("<@2>"));
}

#[tokio::test]
async fn disabled_log_creates_nothing() {
    let store = Arc::new(MemoryStore::new(ME));
    let config = CoordinatorConfig { log_enabled: false, ..CoordinatorConfig::for_surface(CHANNEL) };
    let mut coordinator = ready(&store, config).await;

    turn(&store, &mut coordinator, 1).await;

    let handle = coordinator.surface(CHANNEL).expect("surface");
    assert!(store.sub_surfaces(CHANNEL).await.is_empty());
    assert_eq!(handle.log_thread().await, None);
    assert_eq!(handle.log_book().await.len(), 1);
}

type FaultyCoordinator = Coordinator<FaultyStore<MemoryStore>, SimEnv>;

async fn ready_faulty(store: &Arc<FaultyStore<MemoryStore>>) -> FaultyCoordinator {
    let config = CoordinatorConfig { log_retention: None, ..CoordinatorConfig::for_surface(CHANNEL) };
    let mut coordinator = Coordinator::new(Arc::clone(store), SimEnv::new(), config);
    let _ = coordinator.handle_event(InboundEvent::Ready { self_id: ME }).await;
    coordinator.settle().await;
    coordinator
}

async fn press(memory: &MemoryStore, coordinator: &mut FaultyCoordinator, user: u64, control: Control) {
    let panel = memory.latest_with_controls(CHANNEL).await.expect("panel");
    let event = InboundEvent::Action(ActionEvent {
        surface: CHANNEL,
        origin: panel.id,
        actor: UserId(user),
        control_id: control.id().to_string(),
    });
    let _ = coordinator.handle_event(event).await;
    coordinator.settle().await;
}

async fn thread_lines(memory: &MemoryStore, coordinator: &FaultyCoordinator) -> Vec<String> {
    let thread = coordinator.surface(CHANNEL).expect("surface").log_thread().await.expect("thread");
    memory
        .messages(thread)
        .await
        .into_iter()
        .map(|message| message.content.split_once(' ').map(|(_, rest)| rest.to_string()).unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn unposted_entry_goes_out_before_the_next_one() {
    let memory = Arc::new(MemoryStore::new(ME));
    let store = Arc::new(FaultyStore::new(Arc::clone(&memory)));
    let mut coordinator = ready_faulty(&store).await;

    press(&memory, &mut coordinator, 1, Control::Start).await;
    store.fail_next(StoreOp::Send, StoreError::Transient("reset".into()));
    press(&memory, &mut coordinator, 99, Control::ForceRelease).await;
    assert!(thread_lines(&memory, &coordinator).await.is_empty());

    press(&memory, &mut coordinator, 2, Control::Start).await;
    press(&memory, &mut coordinator, 2, Control::Release).await;

    assert_eq!(
        thread_lines(&memory, &coordinator).await,
        vec!["<@99> force-released <@1>".to_string(), "<@2> finished searching".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn unposted_entry_is_retried_without_further_presses() {
    let memory = Arc::new(MemoryStore::new(ME));
    let store = Arc::new(FaultyStore::new(Arc::clone(&memory)));
    let mut coordinator = ready_faulty(&store).await;

    press(&memory, &mut coordinator, 1, Control::Start).await;
    store.fail_times(StoreOp::Send, &StoreError::Transient("reset".into()), 2);
    press(&memory, &mut coordinator, 99, Control::ForceRelease).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    coordinator.settle().await;

    assert_eq!(thread_lines(&memory, &coordinator).await, vec!["<@99> force-released <@1>".to_string()]);
    assert_eq!(coordinator.surface(CHANNEL).expect("surface").log_book().await.len(), 1);
}
