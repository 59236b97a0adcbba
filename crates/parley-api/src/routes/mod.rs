pub mod health;
pub mod threads;
pub mod chat_history;
pub mod completion;
pub mod upload;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement body for updates
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}
