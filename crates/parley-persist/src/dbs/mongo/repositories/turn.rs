use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId};
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::models::MongoTurn;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoTurnRepository {
    collection: Collection<MongoTurn>,
}

impl MongoTurnRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("chats");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user": 1, "threadId": 1, "createdAt": 1 })
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn insert(&self, turn: &MongoTurn) -> Result<()> {
        self.collection.insert_one(turn).await?;
        Ok(())
    }

    pub async fn find_owned(&self, user: &str, thread_id: &str, turn_id: ObjectId) -> Result<Option<MongoTurn>> {
        let filter = doc! { "_id": turn_id, "user": user, "threadId": thread_id };
        Ok(self.collection.find_one(filter).await?)
    }

    /// Turns in creation order, optionally narrowed to one thread
    pub async fn list(&self, user: &str, thread_id: Option<&str>, limit: i64) -> Result<Vec<MongoTurn>> {
        let mut filter = doc! { "user": user };
        if let Some(thread_id) = thread_id {
            filter.insert("threadId", thread_id);
        }

        let turns = self
            .collection
            .find(filter)
            .sort(doc! { "createdAt": 1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(turns)
    }

    /// Newest turns of a thread up to `until`, returned oldest first
    pub async fn list_until(
        &self,
        user: &str,
        thread_id: &str,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MongoTurn>> {
        let filter = doc! {
            "user": user,
            "threadId": thread_id,
            "createdAt": { "$lte": bson::DateTime::from_chrono(until) },
        };

        let mut turns: Vec<MongoTurn> = self
            .collection
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        turns.reverse();
        Ok(turns)
    }

    pub async fn replace(&self, turn: &MongoTurn) -> Result<bool> {
        let filter = doc! { "_id": turn.id, "user": turn.user.as_str() };
        let result = self.collection.replace_one(filter, turn).await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete_for_thread(&self, user: &str, thread_id: &str) -> Result<u64> {
        let filter = doc! { "user": user, "threadId": thread_id };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}
