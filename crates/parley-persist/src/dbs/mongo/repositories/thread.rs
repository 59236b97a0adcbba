use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId};
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::models::MongoThread;
use crate::error::Result;
use crate::models::TitleFill;

#[derive(Clone)]
pub struct MongoThreadRepository {
    collection: Collection<MongoThread>,
}

impl MongoThreadRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("threads");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user": 1, "updatedAt": -1 })
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn insert(&self, thread: &MongoThread) -> Result<()> {
        self.collection.insert_one(thread).await?;
        Ok(())
    }

    /// Get thread by ID, scoped to its owner
    pub async fn find_owned(&self, user: &str, thread_id: ObjectId) -> Result<Option<MongoThread>> {
        let filter = doc! { "_id": thread_id, "user": user };
        Ok(self.collection.find_one(filter).await?)
    }

    /// List threads for a user, newest activity first
    pub async fn list(&self, user: &str, limit: i64) -> Result<Vec<MongoThread>> {
        let threads = self
            .collection
            .find(doc! { "user": user })
            .sort(doc! { "updatedAt": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    pub async fn replace(&self, thread: &MongoThread) -> Result<bool> {
        let filter = doc! { "_id": thread.id, "user": thread.user.as_str() };
        let result = self.collection.replace_one(filter, thread).await?;
        Ok(result.matched_count > 0)
    }

    /// Set `updatedAt` and, when the stored title is unset, the filled title
    ///
    /// One pipeline update so a rename landing in between is never undone.
    pub async fn touch(
        &self,
        user: &str,
        thread_id: ObjectId,
        updated_at: DateTime<Utc>,
        title: Option<TitleFill<'_>>,
    ) -> Result<bool> {
        let mut set = doc! { "updatedAt": bson::DateTime::from_chrono(updated_at) };
        if let Some(fill) = title {
            let replaceable: Vec<&str> = fill.replaceable().to_vec();
            set.insert(
                "title",
                doc! {
                    "$cond": [
                        { "$in": [ { "$ifNull": ["$title", ""] }, replaceable ] },
                        { "$literal": fill.title() },
                        "$title"
                    ]
                },
            );
        }

        let filter = doc! { "_id": thread_id, "user": user };
        let result = self
            .collection
            .update_one(filter, vec![doc! { "$set": set }])
            .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete(&self, user: &str, thread_id: ObjectId) -> Result<bool> {
        let filter = doc! { "_id": thread_id, "user": user };
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }
}
