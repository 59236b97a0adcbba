use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::ClientOptions;
use mongodb::Client;

use crate::dbs::mongo::models::{parse_object_id, MongoThread, MongoTurn};
use crate::dbs::mongo::repositories::{MongoThreadRepository, MongoTurnRepository};
use crate::error::{PersistError, Result};
use crate::models::{Thread, TitleFill, Turn};
use crate::trait_client::PersistenceClient;

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub max_pool_size: u32,
    pub timeout: Duration,
}

pub struct MongoPersistenceClient {
    client: Client,
    database: String,
    thread_repo: MongoThreadRepository,
    turn_repo: MongoTurnRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create indexes
    ///
    /// Call once at startup and share the result; the driver pools
    /// connections internally.
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        options.app_name = Some("parley".to_string());
        options.max_pool_size = Some(config.max_pool_size);
        options.connect_timeout = Some(config.timeout);
        options.server_selection_timeout = Some(config.timeout);

        let client = Client::with_options(options).map_err(|e| PersistError::Connection(e.to_string()))?;

        let thread_repo = MongoThreadRepository::new(&client, &config.database);
        let turn_repo = MongoTurnRepository::new(&client, &config.database);

        thread_repo.ensure_indexes().await?;
        turn_repo.ensure_indexes().await?;

        tracing::info!(database = %config.database, "Connected to MongoDB");

        Ok(Self {
            client,
            database: config.database.clone(),
            thread_repo,
            turn_repo,
        })
    }
}

#[async_trait]
impl PersistenceClient for MongoPersistenceClient {
    fn new_id(&self) -> String {
        ObjectId::new().to_hex()
    }

    async fn insert_thread(&self, thread: &Thread) -> Result<()> {
        self.thread_repo.insert(&MongoThread::try_from(thread)?).await
    }

    async fn get_thread(&self, user_id: &str, thread_id: &str) -> Result<Option<Thread>> {
        let object_id = parse_object_id(thread_id)?;
        let thread = self.thread_repo.find_owned(user_id, object_id).await?;
        Ok(thread.map(Thread::from))
    }

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<Thread>> {
        let threads = self.thread_repo.list(user_id, limit as i64).await?;
        Ok(threads.into_iter().map(Thread::from).collect())
    }

    async fn save_thread(&self, thread: &Thread) -> Result<bool> {
        self.thread_repo.replace(&MongoThread::try_from(thread)?).await
    }

    async fn touch_thread(
        &self,
        user_id: &str,
        thread_id: &str,
        updated_at: DateTime<Utc>,
        title: Option<TitleFill<'_>>,
    ) -> Result<bool> {
        let object_id = parse_object_id(thread_id)?;
        self.thread_repo.touch(user_id, object_id, updated_at, title).await
    }

    async fn delete_thread(&self, user_id: &str, thread_id: &str) -> Result<bool> {
        let object_id = parse_object_id(thread_id)?;
        self.thread_repo.delete(user_id, object_id).await
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<()> {
        self.turn_repo.insert(&MongoTurn::try_from(turn)?).await
    }

    async fn get_turn(&self, user_id: &str, thread_id: &str, turn_id: &str) -> Result<Option<Turn>> {
        let object_id = parse_object_id(turn_id)?;
        let turn = self.turn_repo.find_owned(user_id, thread_id, object_id).await?;
        Ok(turn.map(Turn::from))
    }

    async fn save_turn(&self, turn: &Turn) -> Result<bool> {
        self.turn_repo.replace(&MongoTurn::try_from(turn)?).await
    }

    async fn list_turns(&self, user_id: &str, thread_id: Option<&str>, limit: usize) -> Result<Vec<Turn>> {
        let turns = self.turn_repo.list(user_id, thread_id, limit as i64).await?;
        Ok(turns.into_iter().map(Turn::from).collect())
    }

    async fn list_turns_until(
        &self,
        user_id: &str,
        thread_id: &str,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Turn>> {
        let turns = self
            .turn_repo
            .list_until(user_id, thread_id, until, limit as i64)
            .await?;
        Ok(turns.into_iter().map(Turn::from).collect())
    }

    async fn delete_turns(&self, user_id: &str, thread_id: &str) -> Result<u64> {
        self.turn_repo.delete_for_thread(user_id, thread_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}
