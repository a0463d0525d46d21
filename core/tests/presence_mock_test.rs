use std::sync::Arc;

use minion_core::{
    Action, ActionEvent, ActionExecutor, ActionQueue, ActionResult, AgentRegistry, AvatarKind, BlockPos,
    EntityKind, MemoryWorld, OwnerId, OwnerPresence, Position, Presence, ReadExecutor,
    ReadOutcome, ReadQuery, WorldDirectory,
};
use mockall::mock;
use tokio::sync::oneshot;

mock! {
    pub Players {}

    impl Presence for Players {
        fn online_by_id(&self, id: OwnerId) -> Option<OwnerPresence>;
        fn online_by_name(&self, name: &str) -> Option<OwnerPresence>;
        fn send_message(&self, id: OwnerId, message: &str) -> bool;
        fn broadcast(&self, message: &str);
    }
}

fn online(id: OwnerId, name: &str, cell: BlockPos) -> OwnerPresence {
    OwnerPresence {
        id,
        name: name.to_string(),
        world: "world".to_string(),
        position: Position::anchored(cell),
    }
}

fn setup(players: MockPlayers, owner: OwnerId, name: Option<&str>) -> Arc<AgentRegistry> {
    let worlds = WorldDirectory::new().with(Arc::new(MemoryWorld::flat("world", 4)));
    let registry = Arc::new(AgentRegistry::new(Arc::new(players)));
    registry
        .spawn(&worlds, owner, name, "world", BlockPos::new(0, 5, 0), AvatarKind::Hover)
        .unwrap();
    registry
}

fn chat(owner: OwnerId, text: &str, public: bool) -> (ActionEvent, oneshot::Receiver<ActionResult>) {
    ActionEvent::channel(
        owner,
        Some(1),
        Action::Chat {
            text: text.to_string(),
            public,
        },
    )
}

#[tokio::test]
async fn private_chat_is_prefixed_and_sent_to_owner() {
    let owner = OwnerId::new_v4();
    let mut players = MockPlayers::new();
    players
        .expect_send_message()
        .withf(move |id, message| *id == owner && message == "[My Robot -> Me] hello")
        .times(1)
        .returning(|_, _| true);
    let registry = setup(players, owner, None);

    let queue = Arc::new(ActionQueue::new());
    let executor = ActionExecutor::new(registry, queue.clone());
    let (event, rx) = chat(owner, "hello", false);
    queue.enqueue(event);
    executor.run_once();

    assert!(rx.await.unwrap().success);
}

#[tokio::test]
async fn private_chat_to_offline_owner_fails() {
    let owner = OwnerId::new_v4();
    let mut players = MockPlayers::new();
    players.expect_send_message().returning(|_, _| false);
    let registry = setup(players, owner, None);

    let queue = Arc::new(ActionQueue::new());
    let executor = ActionExecutor::new(registry, queue.clone());
    let (event, rx) = chat(owner, "anyone?", false);
    queue.enqueue(event);
    executor.run_once();

    assert!(!rx.await.unwrap().success);
}

#[tokio::test]
async fn public_chat_uses_current_owner_name() {
    let owner = OwnerId::new_v4();
    let mut players = MockPlayers::new();
    players
        .expect_online_by_id()
        .returning(move |id| Some(online(id, "carol", BlockPos::new(0, 5, 0))));
    players
        .expect_broadcast()
        .withf(|message| message == "<carol's Robot> hi all")
        .times(1)
        .return_const(());
    // Spawned under an older name
    let registry = setup(players, owner, Some("caroline"));

    let queue = Arc::new(ActionQueue::new());
    let executor = ActionExecutor::new(registry.clone(), queue.clone());
    let (event, rx) = chat(owner, "hi all", true);
    queue.enqueue(event);
    executor.run_once();

    assert!(rx.await.unwrap().success);
    assert_eq!(registry.name_of(owner).as_deref(), Some("carol"));
}

#[test]
fn names_resolve_through_live_presence_first() {
    let owner = OwnerId::new_v4();
    let impostor = OwnerId::new_v4();
    let mut players = MockPlayers::new();
    players
        .expect_online_by_name()
        .withf(|name| name == "dave")
        .returning(move |_| Some(online(impostor, "dave", BlockPos::new(0, 5, 0))));
    let registry = setup(players, owner, Some("dave"));

    // The name now belongs to someone else who has no agent
    assert_eq!(registry.resolve_name("dave"), Some(impostor));
    assert!(registry.lookup_name("dave").is_none());
}

#[test]
fn owner_location_comes_from_presence() {
    let owner = OwnerId::new_v4();
    let mut players = MockPlayers::new();
    players
        .expect_online_by_id()
        .returning(move |id| Some(online(id, "erin", BlockPos::new(7, 5, -3))));
    let registry = setup(players, owner, None);

    let reads = ReadExecutor::new(registry);
    let outcome = reads
        .execute(owner, ReadQuery::LocateEntity(EntityKind::Owner))
        .unwrap();
    assert_eq!(outcome, ReadOutcome::Locations(vec![BlockPos::new(7, 5, -3)]));
}
