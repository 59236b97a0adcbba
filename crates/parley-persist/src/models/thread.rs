use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder title until the first message names the thread
pub const DEFAULT_THREAD_TITLE: &str = "New conversation";

const TITLE_MAX_CHARS: usize = 60;

/// Database-agnostic thread model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, title: Option<&str>, now: DateTime<Utc>) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_THREAD_TITLE);

        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Title a thread touch writes only when the stored one is unset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleFill<'a> {
    /// Replace an empty title
    IfEmpty(&'a str),
    /// Replace an empty title or the placeholder
    IfPlaceholder(&'a str),
}

impl<'a> TitleFill<'a> {
    pub fn title(&self) -> &'a str {
        match self {
            TitleFill::IfEmpty(title) | TitleFill::IfPlaceholder(title) => title,
        }
    }

    /// Stored titles this fill is allowed to overwrite
    pub fn replaceable(&self) -> &'static [&'static str] {
        match self {
            TitleFill::IfEmpty(_) => &[""],
            TitleFill::IfPlaceholder(_) => &["", DEFAULT_THREAD_TITLE],
        }
    }

    pub fn apply(&self, thread: &mut Thread) {
        if self.replaceable().contains(&thread.title.as_str()) {
            thread.title = self.title().to_string();
        }
    }
}

/// Thread title derived from a message: its first 60 characters
pub fn title_from_content(content: &str) -> String {
    content.chars().take(TITLE_MAX_CHARS).collect()
}
