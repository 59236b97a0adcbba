use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Thread, TitleFill, Turn};

/// Trait for database persistence operations
///
/// Every lookup is scoped by owner; a document belonging to someone else is
/// reported as absent. Writes replace whole documents, except thread touches which only set
/// the activity timestamp and a missing title.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Fresh document id in the backend's native format
    fn new_id(&self) -> String;

    async fn insert_thread(&self, thread: &Thread) -> Result<()>;

    async fn get_thread(&self, user_id: &str, thread_id: &str) -> Result<Option<Thread>>;

    /// Threads of a user, most recently updated first
    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<Thread>>;

    /// Replace a stored thread; false when it no longer exists
    async fn save_thread(&self, thread: &Thread) -> Result<bool>;

    /// Bump `updated_at` in place, filling the title when `title` allows it;
    /// false when the thread no longer exists
    async fn touch_thread(
        &self,
        user_id: &str,
        thread_id: &str,
        updated_at: DateTime<Utc>,
        title: Option<TitleFill<'_>>,
    ) -> Result<bool>;

    async fn delete_thread(&self, user_id: &str, thread_id: &str) -> Result<bool>;

    async fn insert_turn(&self, turn: &Turn) -> Result<()>;

    async fn get_turn(&self, user_id: &str, thread_id: &str, turn_id: &str) -> Result<Option<Turn>>;

    /// Replace a stored turn; false when it no longer exists
    async fn save_turn(&self, turn: &Turn) -> Result<bool>;

    /// Turns of a user (optionally one thread), oldest first
    async fn list_turns(&self, user_id: &str, thread_id: Option<&str>, limit: usize) -> Result<Vec<Turn>>;

    /// The newest `limit` turns of a thread created at or before `until`,
    /// oldest first
    async fn list_turns_until(
        &self,
        user_id: &str,
        thread_id: &str,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Turn>>;

    /// Delete every turn of a thread; returns how many were removed
    async fn delete_turns(&self, user_id: &str, thread_id: &str) -> Result<u64>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;
}
