//! What repos report upward.
use thiserror::Error;

// Postgres unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum RepoError {
    /// A row with the same key already exists.
    #[error("duplicate key")]
    Conflict,
    #[error("database unreachable: {0}")]
    Unavailable(sqlx::Error),
    #[error("database error: {0}")]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(dbe) if dbe.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                RepoError::Conflict
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepoError::Unavailable(e)
            }
            _ => RepoError::Db(e),
        }
    }
}
