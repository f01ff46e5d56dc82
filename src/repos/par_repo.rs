use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::repos::error::RepoError;

/// DB access for pushed authorization requests.
///
/// Notes:
/// - Schema: `migrations/0001_pushed_authorization_requests.sql`
///   - pushed_authorization_requests.request_uri (text, primary key)
///   - pushed_authorization_requests.expires_at_utc (timestamptz)
///   - pushed_authorization_requests.parameters (text, JSON array of pairs)
/// - A row is consumed by deleting it; there is no "used" flag.
#[derive(Clone, Debug)]
pub struct ParRepo {
    pool: PgPool,
}

impl ParRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new pushed request. A duplicate handle is `RepoError::Conflict`.
    pub async fn insert(
        &self,
        request_uri: &str,
        expires_at_utc: DateTime<Utc>,
        parameters: &str,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO pushed_authorization_requests (request_uri, expires_at_utc, parameters)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(request_uri)
        .bind(expires_at_utc)
        .bind(parameters)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the row and return it, only if it has not expired.
    ///
    /// Runs in a transaction: if the future is dropped before commit the
    /// transaction rolls back and the row stays consumable.
    pub async fn consume(
        &self,
        request_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ParRow>, RepoError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ParRow>(
            r#"
            DELETE FROM pushed_authorization_requests
            WHERE request_uri = $1
            RETURNING request_uri, expires_at_utc, parameters
            "#,
        )
        .bind(request_uri)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        // An expired row is deleted all the same; it just isn't returned.
        Ok(row.filter(|r| r.expires_at_utc > now))
    }

    /// Delete expired rows. Returns the number deleted.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepoError> {
        let done = sqlx::query(
            r#"
            DELETE FROM pushed_authorization_requests
            WHERE expires_at_utc <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParRow {
    pub request_uri: String,
    pub expires_at_utc: DateTime<Utc>,
    pub parameters: String,
}
