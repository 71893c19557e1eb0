use super::*;
use crate::services::room::Phase;

fn tx() -> mpsc::Sender<Frame> {
    mpsc::channel(8).0
}

fn registry() -> RoomRegistry {
    RoomRegistry::new(Duration::from_secs(300), Duration::from_secs(60))
}

#[test]
fn generated_codes_use_the_safe_alphabet() {
    for _ in 0..100 {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "unexpected char in {code}");
    }
}

#[tokio::test]
async fn create_and_get_round_trip() {
    let registry = registry();
    let host = Uuid::new_v4();
    let (room_id, handle) = registry.create(host, "alice", tx()).await;

    assert_eq!(room_id.len(), CODE_LEN);
    assert_eq!(registry.len().await, 1);

    let fetched = registry.get(&room_id).await.expect("room resolves");
    assert!(Arc::ptr_eq(&fetched, &handle));
    assert_eq!(fetched.lock().await.id(), room_id);
}

#[tokio::test]
async fn get_unknown_room_is_not_found() {
    let registry = registry();
    let err = registry.get("zzzzzz").await.unwrap_err();
    assert_eq!(err, RegistryError::NotFound("zzzzzz".into()));
}

#[tokio::test]
async fn list_joinable_excludes_started_rooms() {
    let registry = registry();
    let (waiting_id, _) = registry.create(Uuid::new_v4(), "alice", tx()).await;
    let (started_id, started) = registry.create(Uuid::new_v4(), "bob", tx()).await;
    started
        .lock()
        .await
        .connect(Uuid::new_v4(), "carol", tx())
        .expect("guest joins");

    let joinable = registry.list_joinable().await;
    assert_eq!(joinable.len(), 1);
    assert_eq!(joinable[0].room_id, waiting_id);
    assert_eq!(joinable[0].host_name, "alice");
    assert_eq!(joinable[0].phase, Phase::Waiting);
    assert!(joinable.iter().all(|s| s.room_id != started_id));
}

#[tokio::test]
async fn sweep_removes_only_eligible_rooms() {
    let idle = Duration::from_secs(300);
    let waiting_idle = Duration::from_secs(60);
    let registry = RoomRegistry::new(idle, waiting_idle);

    let host_a = Uuid::new_v4();
    let (dead_id, dead) = registry.create(host_a, "alice", tx()).await;
    dead.lock().await.disconnect(host_a);

    let (live_id, _) = registry.create(Uuid::new_v4(), "bob", tx()).await;

    let removed = registry.sweep(Instant::now() + waiting_idle).await;
    assert_eq!(removed, vec![dead_id.clone()]);
    assert_eq!(registry.len().await, 1);
    assert!(registry.get(&live_id).await.is_ok());

    // Destruction is irreversible: the swept id no longer resolves.
    assert!(matches!(registry.get(&dead_id).await, Err(RegistryError::NotFound(_))));
}

#[tokio::test]
async fn sweep_with_no_eligible_rooms_removes_nothing() {
    let registry = registry();
    registry.create(Uuid::new_v4(), "alice", tx()).await;
    let removed = registry.sweep(Instant::now()).await;
    assert!(removed.is_empty());
    assert_eq!(registry.len().await, 1);
}
