use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};
use crate::models::{Thread, Turn, TurnVersion};

/// MongoDB-specific Thread document (uses ObjectId)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoThread {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoTurnVersion {
    pub user_content: String,
    #[serde(default)]
    pub assistant_content: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// MongoDB-specific Turn document, stored in the `chats` collection
///
/// `threadId` is kept as a hex string, matching documents written by
/// earlier deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoTurn {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: String,
    pub thread_id: String,
    pub user_content: String,
    #[serde(default)]
    pub assistant_content: Option<String>,
    #[serde(default)]
    pub versions: Vec<MongoTurnVersion>,
    #[serde(default)]
    pub current_version: i64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

pub fn parse_object_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| PersistError::InvalidObjectId(id.to_string()))
}

// Conversions between database-agnostic and MongoDB-specific models

impl TryFrom<&Thread> for MongoThread {
    type Error = PersistError;

    fn try_from(thread: &Thread) -> Result<Self> {
        Ok(Self {
            id: parse_object_id(&thread.id)?,
            user: thread.user_id.clone(),
            title: Some(thread.title.clone()),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        })
    }
}

impl From<MongoThread> for Thread {
    fn from(thread: MongoThread) -> Self {
        Self {
            id: thread.id.to_hex(),
            user_id: thread.user,
            title: thread.title.unwrap_or_default(),
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}

impl From<&TurnVersion> for MongoTurnVersion {
    fn from(version: &TurnVersion) -> Self {
        Self {
            user_content: version.user_content.clone(),
            assistant_content: version.assistant_content.clone(),
            created_at: version.created_at,
        }
    }
}

impl From<MongoTurnVersion> for TurnVersion {
    fn from(version: MongoTurnVersion) -> Self {
        Self {
            user_content: version.user_content,
            assistant_content: version.assistant_content,
            created_at: version.created_at,
        }
    }
}

impl TryFrom<&Turn> for MongoTurn {
    type Error = PersistError;

    fn try_from(turn: &Turn) -> Result<Self> {
        Ok(Self {
            id: parse_object_id(&turn.id)?,
            user: turn.user_id.clone(),
            thread_id: turn.thread_id.clone(),
            user_content: turn.user_content.clone(),
            assistant_content: turn.assistant_content.clone(),
            versions: turn.versions.iter().map(MongoTurnVersion::from).collect(),
            current_version: i64::try_from(turn.current_version)
                .map_err(|_| PersistError::Internal("Version index overflow".to_string()))?,
            model: turn.model.clone(),
            created_at: turn.created_at,
            updated_at: turn.updated_at,
        })
    }
}

impl From<MongoTurn> for Turn {
    fn from(turn: MongoTurn) -> Self {
        Turn {
            id: turn.id.to_hex(),
            user_id: turn.user,
            thread_id: turn.thread_id,
            user_content: turn.user_content,
            assistant_content: turn.assistant_content,
            versions: turn.versions.into_iter().map(TurnVersion::from).collect(),
            current_version: usize::try_from(turn.current_version).unwrap_or(0),
            model: turn.model,
            created_at: turn.created_at,
            updated_at: turn.updated_at,
        }
        .normalized()
    }
}
