use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("BSON serialization error: {0}")]
    BsonSerialization(String),

    #[error("BSON deserialization error: {0}")]
    BsonDeserialization(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Version {index} out of range (turn has {len} versions)")]
    OutOfRange { index: i64, len: usize },

    #[error("Invalid object ID: {0}")]
    InvalidObjectId(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PersistError {
    pub fn thread_not_found() -> Self {
        Self::NotFound("Thread".to_string())
    }

    pub fn turn_not_found() -> Self {
        Self::NotFound("Turn".to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for PersistError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<bson::ser::Error> for PersistError {
    fn from(err: bson::ser::Error) -> Self {
        Self::BsonSerialization(err.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<bson::de::Error> for PersistError {
    fn from(err: bson::de::Error) -> Self {
        Self::BsonDeserialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
