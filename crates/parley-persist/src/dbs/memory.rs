use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Thread, TitleFill, Turn};
use crate::trait_client::PersistenceClient;

/// Process-local backend for tests and local development
///
/// Documents live in insertion order so ties on timestamps keep a stable
/// ordering.
#[derive(Debug, Default)]
pub struct MemoryPersistenceClient {
    threads: RwLock<Vec<Thread>>,
    turns: RwLock<Vec<Turn>>,
}

impl MemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceClient for MemoryPersistenceClient {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    async fn insert_thread(&self, thread: &Thread) -> Result<()> {
        self.threads.write().await.push(thread.clone());
        Ok(())
    }

    async fn get_thread(&self, user_id: &str, thread_id: &str) -> Result<Option<Thread>> {
        let threads = self.threads.read().await;
        Ok(threads
            .iter()
            .find(|t| t.id == thread_id && t.user_id == user_id)
            .cloned())
    }

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<Thread>> {
        let threads = self.threads.read().await;
        let mut owned: Vec<Thread> = threads
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Later insertions win ties so the newest thread comes first
        owned.reverse();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn save_thread(&self, thread: &Thread) -> Result<bool> {
        let mut threads = self.threads.write().await;
        match threads
            .iter_mut()
            .find(|t| t.id == thread.id && t.user_id == thread.user_id)
        {
            Some(slot) => {
                *slot = thread.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_thread(
        &self,
        user_id: &str,
        thread_id: &str,
        updated_at: DateTime<Utc>,
        title: Option<TitleFill<'_>>,
    ) -> Result<bool> {
        let mut threads = self.threads.write().await;
        let Some(slot) = threads
            .iter_mut()
            .find(|t| t.id == thread_id && t.user_id == user_id)
        else {
            return Ok(false);
        };

        slot.touch(updated_at);
        if let Some(fill) = title {
            fill.apply(slot);
        }
        Ok(true)
    }

    async fn delete_thread(&self, user_id: &str, thread_id: &str) -> Result<bool> {
        let mut threads = self.threads.write().await;
        let before = threads.len();
        threads.retain(|t| !(t.id == thread_id && t.user_id == user_id));
        Ok(threads.len() < before)
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<()> {
        self.turns.write().await.push(turn.clone());
        Ok(())
    }

    async fn get_turn(&self, user_id: &str, thread_id: &str, turn_id: &str) -> Result<Option<Turn>> {
        let turns = self.turns.read().await;
        Ok(turns
            .iter()
            .find(|t| t.id == turn_id && t.user_id == user_id && t.thread_id == thread_id)
            .cloned())
    }

    async fn save_turn(&self, turn: &Turn) -> Result<bool> {
        let mut turns = self.turns.write().await;
        match turns
            .iter_mut()
            .find(|t| t.id == turn.id && t.user_id == turn.user_id)
        {
            Some(slot) => {
                *slot = turn.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_turns(&self, user_id: &str, thread_id: Option<&str>, limit: usize) -> Result<Vec<Turn>> {
        let turns = self.turns.read().await;
        let mut owned: Vec<Turn> = turns
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| thread_id.map_or(true, |id| t.thread_id == id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn list_turns_until(
        &self,
        user_id: &str,
        thread_id: &str,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Turn>> {
        let turns = self.turns.read().await;
        let mut owned: Vec<Turn> = turns
            .iter()
            .filter(|t| t.user_id == user_id && t.thread_id == thread_id)
            .filter(|t| t.created_at <= until)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let skip = owned.len().saturating_sub(limit);
        owned.drain(..skip);
        Ok(owned)
    }

    async fn delete_turns(&self, user_id: &str, thread_id: &str) -> Result<u64> {
        let mut turns = self.turns.write().await;
        let before = turns.len();
        turns.retain(|t| !(t.thread_id == thread_id && t.user_id == user_id));
        Ok((before - turns.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
