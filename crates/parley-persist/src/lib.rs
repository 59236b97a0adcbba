pub mod models;
pub mod trait_client;
pub mod dbs;
pub mod store;
pub mod context;
pub mod error;

pub use models::{title_from_content, Thread, TitleFill, Turn, TurnState, TurnVersion, DEFAULT_THREAD_TITLE};
pub use trait_client::PersistenceClient;
pub use dbs::MemoryPersistenceClient;
#[cfg(feature = "mongodb")]
pub use dbs::{MongoConfig, MongoPersistenceClient};
pub use store::{ChatStore, DEFAULT_TURN_LIMIT, MAX_TURN_LIMIT, THREAD_LIST_LIMIT};
pub use error::{PersistError, Result};
