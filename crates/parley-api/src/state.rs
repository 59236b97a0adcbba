use std::sync::Arc;

use parley_llm::CompletionGateway;
use parley_persist::ChatStore;

use crate::config::Config;
use crate::uploads::ObjectStorage;

/// Shared application state passed to all handlers
///
/// Built once at startup; the store wraps the process-wide database handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: ChatStore,
    pub gateway: Arc<CompletionGateway>,
    pub uploads: Option<Arc<dyn ObjectStorage>>,
}

impl AppState {
    pub fn new(config: Config, store: ChatStore, gateway: CompletionGateway) -> Self {
        Self {
            config: Arc::new(config),
            store,
            gateway: Arc::new(gateway),
            uploads: None,
        }
    }

    pub fn with_uploads(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.uploads = Some(storage);
        self
    }
}
