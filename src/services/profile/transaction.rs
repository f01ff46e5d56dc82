//! Adds `transaction_id` from a parsed `transaction:<id>` scope.
use async_trait::async_trait;

use crate::services::claims::{Claims, claim_types};
use crate::services::profile::{ProfileCaller, ProfileDataRequest, ProfileError, ProfileService};

pub const TRANSACTION_SCOPE: &str = "transaction";

#[derive(Debug, Clone)]
pub struct TransactionClaimProfileService<P> {
    inner: P,
}

impl<P: ProfileService> TransactionClaimProfileService<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: ProfileService> ProfileService for TransactionClaimProfileService<P> {
    async fn get_profile_data(&self, request: &ProfileDataRequest) -> Result<Claims, ProfileError> {
        let mut claims = self.inner.get_profile_data(request).await?;

        let transaction = request
            .requested_scopes
            .iter()
            .find(|s| s.parsed_name == TRANSACTION_SCOPE)
            .and_then(|s| s.parsed_parameter.as_deref());
        if let Some(id) = transaction {
            claims.add(claim_types::TRANSACTION_ID, id);
        }

        Ok(claims)
    }

    async fn is_active(
        &self,
        subject_id: &str,
        caller: ProfileCaller,
    ) -> Result<bool, ProfileError> {
        self.inner.is_active(subject_id, caller).await
    }
}
