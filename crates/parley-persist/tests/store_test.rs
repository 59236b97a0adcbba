use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_persist::{
    ChatStore, MemoryPersistenceClient, PersistError, PersistenceClient, Result, Thread, TitleFill, Turn,
    TurnState,
};

fn store() -> ChatStore {
    ChatStore::new(Arc::new(MemoryPersistenceClient::new()))
}

#[tokio::test]
async fn test_concurrent_appends_all_land() {
    let store = store();
    let thread = store.create_thread("alice", None).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        let thread_id = thread.id.clone();
        handles.push(tokio::spawn(async move {
            store
                .append_user_turn("alice", &thread_id, &format!("message {}", i), None)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let turns = store.list_turns("alice", Some(&thread.id), None).await.unwrap();
    assert_eq!(turns.len(), 10);
    assert!(turns.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn test_stale_reply_lands_in_current_version() {
    let store = store();
    let thread = store.create_thread("alice", None).await.unwrap();
    let turn = store.append_user_turn("alice", &thread.id, "Hello", None).await.unwrap();
    store.attach_assistant_reply("alice", &thread.id, &turn.id, "Hi", None).await.unwrap();

    // An edit happens while a retry of version 0 is still in flight
    store.edit_user_turn("alice", &thread.id, &turn.id, "Hello again").await.unwrap();
    let turn = store
        .attach_assistant_reply("alice", &thread.id, &turn.id, "late retry", None)
        .await
        .unwrap();

    assert_eq!(turn.versions[0].assistant_content.as_deref(), Some("Hi"));
    assert_eq!(turn.versions[1].assistant_content.as_deref(), Some("late retry"));
    assert_eq!(turn.state(), TurnState::Complete);
}

#[tokio::test]
async fn test_version_navigation_round_trip() {
    let store = store();
    let thread = store.create_thread("alice", None).await.unwrap();
    let turn = store.append_user_turn("alice", &thread.id, "v0", None).await.unwrap();

    for i in 1..4 {
        store
            .edit_user_turn("alice", &thread.id, &turn.id, &format!("v{}", i))
            .await
            .unwrap();
    }

    for index in [2, 0, 3, 1] {
        let turn = store.switch_version("alice", &thread.id, &turn.id, index).await.unwrap();
        assert_eq!(turn.versions.len(), 4);
        assert_eq!(turn.current_version, index as usize);
        assert_eq!(turn.user_content, format!("v{}", index));
    }

    assert!(matches!(
        store.switch_version("alice", &thread.id, &turn.id, -1).await,
        Err(PersistError::OutOfRange { .. })
    ));
}

#[tokio::test]
async fn test_list_turns_without_thread_spans_threads() {
    let store = store();
    let a = store.create_thread("alice", None).await.unwrap();
    let b = store.create_thread("alice", None).await.unwrap();
    store.append_user_turn("alice", &a.id, "in a", None).await.unwrap();
    store.append_user_turn("alice", &b.id, "in b", None).await.unwrap();

    let turns = store.list_turns("alice", None, Some(500)).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].user_content, "in a");
}

/// Memory backend that renames the thread right after every turn write,
/// standing in for a rename request that lands mid-operation
struct RenameDuringTurnWrites {
    inner: MemoryPersistenceClient,
    title: &'static str,
}

impl RenameDuringTurnWrites {
    async fn rename(&self, user_id: &str, thread_id: &str) -> Result<()> {
        if let Some(mut thread) = self.inner.get_thread(user_id, thread_id).await? {
            thread.title = self.title.to_string();
            self.inner.save_thread(&thread).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceClient for RenameDuringTurnWrites {
    fn new_id(&self) -> String {
        self.inner.new_id()
    }

    async fn insert_thread(&self, thread: &Thread) -> Result<()> {
        self.inner.insert_thread(thread).await
    }

    async fn get_thread(&self, user_id: &str, thread_id: &str) -> Result<Option<Thread>> {
        self.inner.get_thread(user_id, thread_id).await
    }

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<Thread>> {
        self.inner.list_threads(user_id, limit).await
    }

    async fn save_thread(&self, thread: &Thread) -> Result<bool> {
        self.inner.save_thread(thread).await
    }

    async fn touch_thread(
        &self,
        user_id: &str,
        thread_id: &str,
        updated_at: DateTime<Utc>,
        title: Option<TitleFill<'_>>,
    ) -> Result<bool> {
        self.inner.touch_thread(user_id, thread_id, updated_at, title).await
    }

    async fn delete_thread(&self, user_id: &str, thread_id: &str) -> Result<bool> {
        self.inner.delete_thread(user_id, thread_id).await
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<()> {
        self.inner.insert_turn(turn).await?;
        self.rename(&turn.user_id, &turn.thread_id).await
    }

    async fn get_turn(&self, user_id: &str, thread_id: &str, turn_id: &str) -> Result<Option<Turn>> {
        self.inner.get_turn(user_id, thread_id, turn_id).await
    }

    async fn save_turn(&self, turn: &Turn) -> Result<bool> {
        let saved = self.inner.save_turn(turn).await?;
        self.rename(&turn.user_id, &turn.thread_id).await?;
        Ok(saved)
    }

    async fn list_turns(&self, user_id: &str, thread_id: Option<&str>, limit: usize) -> Result<Vec<Turn>> {
        self.inner.list_turns(user_id, thread_id, limit).await
    }

    async fn list_turns_until(
        &self,
        user_id: &str,
        thread_id: &str,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Turn>> {
        self.inner.list_turns_until(user_id, thread_id, until, limit).await
    }

    async fn delete_turns(&self, user_id: &str, thread_id: &str) -> Result<u64> {
        self.inner.delete_turns(user_id, thread_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn test_rename_during_turn_writes_survives() {
    let store = ChatStore::new(Arc::new(RenameDuringTurnWrites {
        inner: MemoryPersistenceClient::new(),
        title: "Renamed by user",
    }));
    let thread = store.create_thread("alice", Some("Original")).await.unwrap();

    let turn = store.append_user_turn("alice", &thread.id, "Hello", None).await.unwrap();
    assert_eq!(store.get_thread("alice", &thread.id).await.unwrap().title, "Renamed by user");

    store.attach_assistant_reply("alice", &thread.id, &turn.id, "Hi", None).await.unwrap();
    store.edit_user_turn("alice", &thread.id, &turn.id, "Hello again").await.unwrap();
    store.switch_version("alice", &thread.id, &turn.id, 0).await.unwrap();

    let reloaded = store.get_thread("alice", &thread.id).await.unwrap();
    assert_eq!(reloaded.title, "Renamed by user");
    assert!(reloaded.updated_at >= turn.created_at);
}

#[tokio::test]
async fn test_rename_before_first_message_is_not_overwritten() {
    let store = ChatStore::new(Arc::new(RenameDuringTurnWrites {
        inner: MemoryPersistenceClient::new(),
        title: "Picked by user",
    }));
    let thread = store.create_thread("alice", None).await.unwrap();

    store.append_user_turn("alice", &thread.id, "What is Rust?", None).await.unwrap();

    let reloaded = store.get_thread("alice", &thread.id).await.unwrap();
    assert_eq!(reloaded.title, "Picked by user");
}
