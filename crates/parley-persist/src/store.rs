use std::sync::Arc;

use chrono::Utc;

use crate::error::{PersistError, Result};
use crate::models::{title_from_content, Thread, TitleFill, Turn};
use crate::trait_client::PersistenceClient;

/// Most threads returned by a single listing
pub const THREAD_LIST_LIMIT: usize = 100;
pub const DEFAULT_TURN_LIMIT: usize = 100;
pub const MAX_TURN_LIMIT: usize = 200;

/// Thread and turn operations on top of a persistence backend
///
/// Each turn mutation is a read-modify-write of one document: load it scoped
/// to the caller, apply the model transition, replace it. Concurrent writers
/// are last-write-wins. The owning thread is only touched in place, so a
/// rename racing a turn write survives.
#[derive(Clone)]
pub struct ChatStore {
    pub(crate) client: Arc<dyn PersistenceClient>,
}

impl ChatStore {
    pub fn new(client: Arc<dyn PersistenceClient>) -> Self {
        Self { client }
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    pub async fn create_thread(&self, user_id: &str, title: Option<&str>) -> Result<Thread> {
        let thread = Thread::new(self.client.new_id(), user_id, title, Utc::now());
        self.client.insert_thread(&thread).await?;

        tracing::debug!(thread_id = %thread.id, user_id, "Thread created");
        Ok(thread)
    }

    pub async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>> {
        self.client.list_threads(user_id, THREAD_LIST_LIMIT).await
    }

    pub async fn get_thread(&self, user_id: &str, thread_id: &str) -> Result<Thread> {
        self.client
            .get_thread(user_id, thread_id)
            .await?
            .ok_or_else(PersistError::thread_not_found)
    }

    pub async fn rename_thread(&self, user_id: &str, thread_id: &str, title: &str) -> Result<Thread> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PersistError::InvalidArgument("title is required".to_string()));
        }

        let mut thread = self.get_thread(user_id, thread_id).await?;
        thread.title = title.to_string();
        thread.touch(Utc::now());
        self.save_thread(&thread).await?;

        Ok(thread)
    }

    /// Delete a thread and every turn in it; returns the number of turns removed
    pub async fn delete_thread(&self, user_id: &str, thread_id: &str) -> Result<u64> {
        self.get_thread(user_id, thread_id).await?;

        let removed = self.client.delete_turns(user_id, thread_id).await?;
        if !self.client.delete_thread(user_id, thread_id).await? {
            return Err(PersistError::thread_not_found());
        }

        tracing::debug!(thread_id, user_id, turns = removed, "Thread deleted");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------

    /// Start a new exchange with the user's message
    pub async fn append_user_turn(
        &self,
        user_id: &str,
        thread_id: &str,
        content: &str,
        model: Option<String>,
    ) -> Result<Turn> {
        require_content(content)?;
        self.get_thread(user_id, thread_id).await?;

        let now = Utc::now();
        let turn = Turn::new(self.client.new_id(), user_id, thread_id, content, model, now);
        self.client.insert_turn(&turn).await?;

        let title = title_from_content(content);
        self.touch_thread(user_id, thread_id, now, Some(TitleFill::IfPlaceholder(&title)))
            .await?;

        tracing::debug!(turn_id = %turn.id, thread_id, "User turn appended");
        Ok(turn)
    }

    /// Write the assistant reply into the turn's current version
    ///
    /// On a turn that already has a reply this is a retry: the content is
    /// replaced and no version is created.
    pub async fn attach_assistant_reply(
        &self,
        user_id: &str,
        thread_id: &str,
        turn_id: &str,
        content: &str,
        model: Option<String>,
    ) -> Result<Turn> {
        require_content(content)?;
        self.update_turn(user_id, thread_id, turn_id, None, |turn, now| {
            turn.attach_reply(content, model, now);
            Ok(())
        })
        .await
    }

    /// Branch a new version from an edited user message
    pub async fn edit_user_turn(
        &self,
        user_id: &str,
        thread_id: &str,
        turn_id: &str,
        content: &str,
    ) -> Result<Turn> {
        require_content(content)?;
        let title = title_from_content(content);
        self.update_turn(user_id, thread_id, turn_id, Some(TitleFill::IfEmpty(&title)), |turn, now| {
            turn.push_version(content, now);
            Ok(())
        })
        .await
    }

    /// Make a historical version current; `OutOfRange` leaves the turn as is
    pub async fn switch_version(
        &self,
        user_id: &str,
        thread_id: &str,
        turn_id: &str,
        version: i64,
    ) -> Result<Turn> {
        self.update_turn(user_id, thread_id, turn_id, None, |turn, now| {
            turn.select_version(version, now)
        })
        .await
    }

    pub async fn get_turn(&self, user_id: &str, thread_id: &str, turn_id: &str) -> Result<Turn> {
        self.client
            .get_turn(user_id, thread_id, turn_id)
            .await?
            .ok_or_else(PersistError::turn_not_found)
    }

    /// Turns oldest first; a limit of zero or none means the default
    pub async fn list_turns(
        &self,
        user_id: &str,
        thread_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Turn>> {
        if let Some(thread_id) = thread_id {
            self.get_thread(user_id, thread_id).await?;
        }

        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_TURN_LIMIT)
            .min(MAX_TURN_LIMIT);

        self.client.list_turns(user_id, thread_id, limit).await
    }

    async fn update_turn<F>(
        &self,
        user_id: &str,
        thread_id: &str,
        turn_id: &str,
        title: Option<TitleFill<'_>>,
        apply: F,
    ) -> Result<Turn>
    where
        F: FnOnce(&mut Turn, chrono::DateTime<Utc>) -> Result<()>,
    {
        self.get_thread(user_id, thread_id).await?;
        let mut turn = self.get_turn(user_id, thread_id, turn_id).await?;

        let now = Utc::now();
        apply(&mut turn, now)?;

        if !self.client.save_turn(&turn).await? {
            return Err(PersistError::turn_not_found());
        }
        self.touch_thread(user_id, thread_id, now, title).await?;

        tracing::debug!(
            turn_id,
            thread_id,
            current_version = turn.current_version,
            versions = turn.versions.len(),
            "Turn updated"
        );
        Ok(turn)
    }

    async fn touch_thread(
        &self,
        user_id: &str,
        thread_id: &str,
        now: chrono::DateTime<Utc>,
        title: Option<TitleFill<'_>>,
    ) -> Result<()> {
        if self.client.touch_thread(user_id, thread_id, now, title).await? {
            Ok(())
        } else {
            Err(PersistError::thread_not_found())
        }
    }

    async fn save_thread(&self, thread: &Thread) -> Result<()> {
        if self.client.save_thread(thread).await? {
            Ok(())
        } else {
            Err(PersistError::thread_not_found())
        }
    }
}

fn require_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(PersistError::InvalidArgument("content is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbs::MemoryPersistenceClient;
    use crate::models::{TurnState, DEFAULT_THREAD_TITLE};

    fn store() -> ChatStore {
        ChatStore::new(Arc::new(MemoryPersistenceClient::new()))
    }

    #[tokio::test]
    async fn test_versioning_scenario() {
        let store = store();
        let thread = store.create_thread("alice", None).await.unwrap();

        let turn = store.append_user_turn("alice", &thread.id, "Hello", None).await.unwrap();
        assert_eq!(turn.versions.len(), 1);
        assert_eq!(turn.current_version, 0);

        store
            .attach_assistant_reply("alice", &thread.id, &turn.id, "Hi", None)
            .await
            .unwrap();

        let edited = store
            .edit_user_turn("alice", &thread.id, &turn.id, "Hello there")
            .await
            .unwrap();
        assert_eq!(edited.versions.len(), 2);
        assert_eq!(edited.current_version, 1);
        assert_eq!(edited.assistant_content, None);

        let answered = store
            .attach_assistant_reply("alice", &thread.id, &turn.id, "Hi there", None)
            .await
            .unwrap();
        assert_eq!(answered.versions[1].assistant_content.as_deref(), Some("Hi there"));

        let switched = store.switch_version("alice", &thread.id, &turn.id, 0).await.unwrap();
        assert_eq!(switched.user_content, "Hello");
        assert_eq!(switched.assistant_content.as_deref(), Some("Hi"));
        assert_eq!(switched.state(), TurnState::Complete);

        let stored = store.get_turn("alice", &thread.id, &turn.id).await.unwrap();
        assert_eq!(stored, switched);
    }

    #[tokio::test]
    async fn test_first_message_names_thread() {
        let store = store();
        let thread = store.create_thread("alice", Some("")).await.unwrap();
        assert_eq!(thread.title, DEFAULT_THREAD_TITLE);

        let long = "x".repeat(80);
        store.append_user_turn("alice", &thread.id, &long, None).await.unwrap();
        store.append_user_turn("alice", &thread.id, "second", None).await.unwrap();

        let thread = store.get_thread("alice", &thread.id).await.unwrap();
        assert_eq!(thread.title, "x".repeat(60));
    }

    #[tokio::test]
    async fn test_named_thread_keeps_title() {
        let store = store();
        let thread = store.create_thread("alice", Some("Recipes")).await.unwrap();
        store.append_user_turn("alice", &thread.id, "pasta?", None).await.unwrap();

        assert_eq!(store.get_thread("alice", &thread.id).await.unwrap().title, "Recipes");
    }

    #[tokio::test]
    async fn test_turn_writes_bump_thread() {
        let store = store();
        let thread = store.create_thread("alice", None).await.unwrap();
        let turn = store.append_user_turn("alice", &thread.id, "hi", None).await.unwrap();

        let bumped = store.get_thread("alice", &thread.id).await.unwrap();
        assert!(bumped.updated_at >= thread.updated_at);
        assert_eq!(bumped.updated_at, turn.created_at);
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let store = store();
        let thread = store.create_thread("alice", None).await.unwrap();

        let err = store.append_user_turn("alice", &thread.id, "  ", None).await.unwrap_err();
        assert!(matches!(err, PersistError::InvalidArgument(_)));

        let turn = store.append_user_turn("alice", &thread.id, "hi", None).await.unwrap();
        let err = store
            .attach_assistant_reply("alice", &thread.id, &turn.id, "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_switch_out_of_range_is_not_persisted() {
        let store = store();
        let thread = store.create_thread("alice", None).await.unwrap();
        let turn = store.append_user_turn("alice", &thread.id, "hi", None).await.unwrap();

        let err = store.switch_version("alice", &thread.id, &turn.id, 5).await.unwrap_err();
        assert!(matches!(err, PersistError::OutOfRange { index: 5, len: 1 }));
        assert_eq!(store.get_turn("alice", &thread.id, &turn.id).await.unwrap(), turn);
    }

    #[tokio::test]
    async fn test_other_owner_sees_not_found() {
        let store = store();
        let thread = store.create_thread("alice", None).await.unwrap();
        let turn = store.append_user_turn("alice", &thread.id, "hi", None).await.unwrap();

        assert!(matches!(
            store.get_thread("bob", &thread.id).await,
            Err(PersistError::NotFound(_))
        ));
        assert!(matches!(
            store.append_user_turn("bob", &thread.id, "hi", None).await,
            Err(PersistError::NotFound(_))
        ));
        assert!(matches!(
            store.attach_assistant_reply("bob", &thread.id, &turn.id, "x", None).await,
            Err(PersistError::NotFound(_))
        ));
        assert!(matches!(
            store.list_turns("bob", Some(&thread.id), None).await,
            Err(PersistError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_thread("bob", &thread.id).await,
            Err(PersistError::NotFound(_))
        ));
        assert!(store.list_threads("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_turn_of_other_thread_is_not_found() {
        let store = store();
        let a = store.create_thread("alice", None).await.unwrap();
        let b = store.create_thread("alice", None).await.unwrap();
        let turn = store.append_user_turn("alice", &a.id, "hi", None).await.unwrap();

        assert!(matches!(
            store.edit_user_turn("alice", &b.id, &turn.id, "edit").await,
            Err(PersistError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_only_to_owned_thread() {
        let store = store();
        let doomed = store.create_thread("alice", None).await.unwrap();
        let kept = store.create_thread("alice", None).await.unwrap();
        let other = store.create_thread("bob", None).await.unwrap();

        store.append_user_turn("alice", &doomed.id, "one", None).await.unwrap();
        store.append_user_turn("alice", &doomed.id, "two", None).await.unwrap();
        store.append_user_turn("alice", &kept.id, "stay", None).await.unwrap();
        store.append_user_turn("bob", &other.id, "mine", None).await.unwrap();

        assert_eq!(store.delete_thread("alice", &doomed.id).await.unwrap(), 2);

        assert!(store.get_thread("alice", &doomed.id).await.is_err());
        let remaining = store.list_turns("alice", None, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].thread_id, kept.id);
        assert_eq!(store.list_turns("bob", None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_threads_newest_activity_first() {
        let store = store();
        let older = store.create_thread("alice", Some("older")).await.unwrap();
        let newer = store.create_thread("alice", Some("newer")).await.unwrap();

        let listed = store.list_threads("alice").await.unwrap();
        assert_eq!(listed[0].id, newer.id);

        store.append_user_turn("alice", &older.id, "bump", None).await.unwrap();
        let listed = store.list_threads("alice").await.unwrap();
        assert_eq!(listed[0].id, older.id);
    }

    #[tokio::test]
    async fn test_list_turns_limits() {
        let store = store();
        let thread = store.create_thread("alice", None).await.unwrap();
        for i in 0..5 {
            store
                .append_user_turn("alice", &thread.id, &format!("m{}", i), None)
                .await
                .unwrap();
        }

        let two = store.list_turns("alice", Some(&thread.id), Some(2)).await.unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].user_content, "m0");

        let all = store.list_turns("alice", Some(&thread.id), Some(0)).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[4].user_content, "m4");
    }

    #[tokio::test]
    async fn test_rename_requires_title() {
        let store = store();
        let thread = store.create_thread("alice", None).await.unwrap();

        assert!(matches!(
            store.rename_thread("alice", &thread.id, " ").await,
            Err(PersistError::InvalidArgument(_))
        ));
        let renamed = store.rename_thread("alice", &thread.id, "Plans").await.unwrap();
        assert_eq!(renamed.title, "Plans");
    }
}
