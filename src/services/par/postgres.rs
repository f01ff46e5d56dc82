use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::repos::par_repo::ParRepo;
use crate::services::par::store::{ParStore, ParStoreError, PushedAuthorizationRequest};

/// `ParStore` over the Postgres repo.
#[derive(Clone, Debug)]
pub struct PostgresParStore {
    repo: ParRepo,
}

impl PostgresParStore {
    pub fn new(repo: ParRepo) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ParStore for PostgresParStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn store(
        &self,
        request: &PushedAuthorizationRequest,
        _now: DateTime<Utc>,
    ) -> Result<(), ParStoreError> {
        self.repo
            .insert(
                &request.request_uri,
                request.expires_at_utc,
                &request.parameters,
            )
            .await?;
        Ok(())
    }

    async fn consume(
        &self,
        request_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PushedAuthorizationRequest>, ParStoreError> {
        let row = self.repo.consume(request_uri, now).await?;
        Ok(row.map(|r| PushedAuthorizationRequest {
            request_uri: r.request_uri,
            expires_at_utc: r.expires_at_utc,
            parameters: r.parameters,
        }))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, ParStoreError> {
        Ok(self.repo.delete_expired(now).await?)
    }
}
