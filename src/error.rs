use thiserror::Error;

/// Failure taxonomy shared by the domain layer and the storage layer.
///
/// `Validation` aborts an operation before any storage call is made.
/// `NotFound` means a referenced entity vanished; callers reconcile local
/// state (drop the dangling reference, narrow the scope selection) instead of
/// treating it as fatal. `External` wraps storage failures; local state is
/// never mutated optimistically, so the operation can simply be retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("storage failure: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Error::NotFound { kind, id }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::External(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::External(anyhow::Error::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::External(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::External(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::External(anyhow::Error::new(err))
    }
}
