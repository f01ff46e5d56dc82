//! Builds the UserInfo response body for a validated request.
use std::sync::Arc;

use crate::services::auth::access_jwt::TokenValidationError;
use crate::services::authorize::scope::ScopeParser;
use crate::services::claims::claim_types;
use crate::services::profile::{ProfileCaller, ProfileDataRequest, ProfileService};
use crate::services::userinfo::validator::{UserInfoError, UserInfoRequestValidationResult};

/// Claim types released by each standard identity scope (OIDC Core §5.4).
pub fn identity_scope_claims(scope: &str) -> &'static [&'static str] {
    match scope {
        "openid" => &["sub"],
        "profile" => &[
            "name",
            "family_name",
            "given_name",
            "middle_name",
            "nickname",
            "preferred_username",
            "profile",
            "picture",
            "website",
            "gender",
            "birthdate",
            "zoneinfo",
            "locale",
            "updated_at",
        ],
        "email" => &["email", "email_verified"],
        "address" => &["address"],
        "phone" => &["phone_number", "phone_number_verified"],
        _ => &[],
    }
}

#[derive(Clone)]
pub struct UserInfoResponseGenerator {
    profile: Arc<dyn ProfileService>,
    scope_parser: ScopeParser,
}

impl std::fmt::Debug for UserInfoResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInfoResponseGenerator")
            .field("scope_parser", &self.scope_parser)
            .finish_non_exhaustive()
    }
}

impl UserInfoResponseGenerator {
    pub fn new(profile: Arc<dyn ProfileService>, scope_parser: ScopeParser) -> Self {
        Self {
            profile,
            scope_parser,
        }
    }

    pub async fn process(
        &self,
        validated: &UserInfoRequestValidationResult,
    ) -> Result<serde_json::Map<String, serde_json::Value>, UserInfoError> {
        let token = &validated.token_validation_result;
        let subject_id = validated.subject_id().to_string();

        let requested_scopes = self
            .scope_parser
            .parse(&token.scopes.join(" "))
            .map_err(|e| {
                tracing::warn!(error = %e, "token carries an unparseable scope");
                UserInfoError::Token(TokenValidationError::invalid_token(e.to_string()))
            })?;

        let mut requested_claim_types: Vec<String> = Vec::new();
        for scope in &requested_scopes {
            for claim_type in identity_scope_claims(&scope.parsed_name) {
                if !requested_claim_types.iter().any(|t| t == claim_type) {
                    requested_claim_types.push((*claim_type).to_string());
                }
            }
        }

        let request = ProfileDataRequest {
            subject_id: subject_id.clone(),
            client_id: token.client_id.clone(),
            caller: ProfileCaller::UserInfoEndpoint,
            requested_claim_types,
            requested_scopes,
        };
        let mut claims = self.profile.get_profile_data(&request).await?;

        match claims.first(claim_types::SUBJECT) {
            None => claims.add(claim_types::SUBJECT, subject_id.clone()),
            Some(returned) if returned != subject_id => {
                tracing::error!(
                    expected = %subject_id,
                    returned = %returned,
                    "profile service returned a different sub"
                );
                return Err(UserInfoError::SubjectMismatch {
                    expected: subject_id,
                    returned: returned.to_string(),
                });
            }
            Some(_) => {}
        }

        Ok(claims.to_json_object())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::access_jwt::TokenValidationResult;
    use crate::services::claims::{Claims, Principal};
    use crate::services::profile::{
        DirectoryProfileService, InMemoryUserDirectory, TransactionClaimProfileService,
    };

    fn validated(scopes: &[&str]) -> UserInfoRequestValidationResult {
        UserInfoRequestValidationResult {
            subject: Principal::from_subject("UserInfo", "alice"),
            token_validation_result: TokenValidationResult {
                claims: Claims::new(),
                client_id: Some("web".into()),
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
                cnf_jkt: None,
                has_confirmation: false,
                jti: None,
            },
        }
    }

    fn generator() -> UserInfoResponseGenerator {
        let directory = InMemoryUserDirectory::from_json_str(
            r#"[{"subject_id": "alice", "claims": {"name": "Alice", "email": "alice@example.com"}}]"#,
        )
        .unwrap();
        let profile = TransactionClaimProfileService::new(DirectoryProfileService::new(
            Arc::new(directory),
        ));
        UserInfoResponseGenerator::new(Arc::new(profile), ScopeParser::default())
    }

    #[tokio::test]
    async fn scopes_select_claims() {
        let body = generator()
            .process(&validated(&["openid", "profile"]))
            .await
            .unwrap();

        assert_eq!(body["sub"], "alice");
        assert_eq!(body["name"], "Alice");
        assert!(!body.contains_key("email"));
    }

    #[tokio::test]
    async fn sub_is_always_present() {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let g = UserInfoResponseGenerator::new(
            Arc::new(DirectoryProfileService::new(directory)),
            ScopeParser::default(),
        );

        let body = g.process(&validated(&["openid"])).await.unwrap();
        assert_eq!(body["sub"], "alice");
    }

    #[tokio::test]
    async fn transaction_scope_reaches_userinfo() {
        let body = generator()
            .process(&validated(&["openid", "transaction:tx-9"]))
            .await
            .unwrap();
        assert_eq!(body["transaction_id"], "tx-9");
    }
}
