use std::fmt;

/// Failure of a read against the external profile/post store.
///
/// "Not found" is not an error: lookups return `Ok(None)` for that.
#[derive(Debug)]
pub enum LookupError {
    /// The store could not be reached (lock poisoned, file unavailable).
    Unavailable(String),
    /// The query itself failed.
    Query(String),
    /// The blocking task running the query panicked or was cancelled.
    Task(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            LookupError::Query(msg) => write!(f, "Lookup query failed: {}", msg),
            LookupError::Task(msg) => write!(f, "Lookup task failed: {}", msg),
        }
    }
}

impl std::error::Error for LookupError {}

impl From<rusqlite::Error> for LookupError {
    fn from(err: rusqlite::Error) -> Self {
        LookupError::Query(err.to_string())
    }
}

impl From<tokio::task::JoinError> for LookupError {
    fn from(err: tokio::task::JoinError) -> Self {
        LookupError::Task(err.to_string())
    }
}

/// A handshake that did not assert a user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRejected;

impl fmt::Display for HandshakeRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing user identity")
    }
}

impl std::error::Error for HandshakeRejected {}

/// Errors raised while opening the lookup database at start-up.
#[derive(Debug)]
pub enum DbError {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    Migration(rusqlite_migration::Error),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Io(e) => write!(f, "Data directory error: {}", e),
            DbError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            DbError::Migration(e) => write!(f, "Migration failed: {}", e),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Io(e) => Some(e),
            DbError::Sqlite(e) => Some(e),
            DbError::Migration(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io(err)
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Sqlite(err)
    }
}

impl From<rusqlite_migration::Error> for DbError {
    fn from(err: rusqlite_migration::Error) -> Self {
        DbError::Migration(err)
    }
}
