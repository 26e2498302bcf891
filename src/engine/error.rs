use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    UnknownProperty(String),
    BookingNotFound(String),
    AlreadyExists(String),
    PersistenceUnavailable(String),
    InvalidQuery(String),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownProperty(name) => write!(f, "unknown property: {name}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "booking already exists: {id}"),
            EngineError::PersistenceUnavailable(e) => write!(f, "persistence unavailable: {e}"),
            EngineError::InvalidQuery(msg) => write!(f, "invalid query: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::BookingNotFound(id),
            StoreError::AlreadyExists(id) => EngineError::AlreadyExists(id),
            StoreError::PageTooLarge(_) => EngineError::LimitExceeded("store page too large"),
            e @ StoreError::TableMismatch { .. } => EngineError::InvalidQuery(e.to_string()),
            StoreError::Unavailable(msg) => EngineError::PersistenceUnavailable(msg),
            StoreError::Io(e) => EngineError::PersistenceUnavailable(e.to_string()),
        }
    }
}
