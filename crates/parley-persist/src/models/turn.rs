use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};

/// Immutable snapshot of one branch of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnVersion {
    pub user_content: String,
    pub assistant_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingAssistant,
    Complete,
}

/// One user/assistant exchange with its edit history
///
/// `versions` only ever grows. `current_version` points into it and the
/// top-level `user_content` / `assistant_content` mirror that entry after
/// every transition below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    pub thread_id: String,
    pub user_content: String,
    pub assistant_content: Option<String>,
    #[serde(default)]
    pub versions: Vec<TurnVersion>,
    #[serde(default)]
    pub current_version: usize,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        thread_id: impl Into<String>,
        user_content: impl Into<String>,
        model: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let user_content = user_content.into();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            versions: vec![TurnVersion {
                user_content: user_content.clone(),
                assistant_content: None,
                created_at: now,
            }],
            user_content,
            assistant_content: None,
            current_version: 0,
            model,
            created_at: now,
            updated_at: now,
        }
    }

    /// Repair documents written before versioning existed
    ///
    /// An empty history is seeded from the top-level fields and a dangling
    /// index is clamped to the last version.
    pub fn normalized(mut self) -> Self {
        if self.versions.is_empty() {
            self.versions.push(TurnVersion {
                user_content: self.user_content.clone(),
                assistant_content: self.assistant_content.clone(),
                created_at: self.created_at,
            });
        }
        if self.current_version >= self.versions.len() {
            self.current_version = self.versions.len() - 1;
        }
        self.sync_top_level();
        self
    }

    pub fn current(&self) -> &TurnVersion {
        &self.versions[self.current_version]
    }

    pub fn state(&self) -> TurnState {
        match self.current().assistant_content {
            Some(_) => TurnState::Complete,
            None => TurnState::AwaitingAssistant,
        }
    }

    /// Fill (or replace, on retry) the assistant reply of the current version
    pub fn attach_reply(&mut self, content: impl Into<String>, model: Option<String>, now: DateTime<Utc>) {
        let index = self.current_version;
        self.versions[index].assistant_content = Some(content.into());
        self.model = model;
        self.updated_at = now;
        self.sync_top_level();
    }

    /// Branch a new version from an edited user message
    pub fn push_version(&mut self, user_content: impl Into<String>, now: DateTime<Utc>) {
        self.versions.push(TurnVersion {
            user_content: user_content.into(),
            assistant_content: None,
            created_at: now,
        });
        self.current_version = self.versions.len() - 1;
        self.updated_at = now;
        self.sync_top_level();
    }

    /// Repoint the active version; the turn is untouched on error
    pub fn select_version(&mut self, index: i64, now: DateTime<Utc>) -> Result<()> {
        let len = self.versions.len();
        let target = usize::try_from(index)
            .ok()
            .filter(|i| *i < len)
            .ok_or(PersistError::OutOfRange { index, len })?;

        self.current_version = target;
        self.updated_at = now;
        self.sync_top_level();
        Ok(())
    }

    fn sync_top_level(&mut self) {
        let current = &self.versions[self.current_version];
        self.user_content = current.user_content.clone();
        self.assistant_content = current.assistant_content.clone();
    }
}
