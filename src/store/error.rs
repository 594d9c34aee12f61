use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("{field} must be 1 to {max} characters")]
    InvalidLength { field: &'static str, max: usize },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: &'static str, value: String },

    #[error("role {0} does not exist")]
    UnknownRole(u64),
}
