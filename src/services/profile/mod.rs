//! Profile capability: claim resolution and subject activity.
//!
//! The UserInfo pipeline, the authorize validator and the resource endpoints
//! only see the `ProfileService` trait. The default implementation sits on an
//! in-memory user directory; `TransactionClaimProfileService` shows how extra
//! claims are layered on by decoration.
use async_trait::async_trait;
use std::fmt;

use crate::services::authorize::scope::ParsedScope;
use crate::services::claims::Claims;

pub mod directory;
pub mod transaction;

pub use directory::{DirectoryProfileService, InMemoryUserDirectory, UserRecord};
pub use transaction::TransactionClaimProfileService;

/// Who is asking. Implementations may answer differently per caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileCaller {
    UserInfoRequestValidation,
    UserInfoEndpoint,
    AuthorizeEndpoint,
    ProtectedResource,
}

impl ProfileCaller {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserInfoRequestValidation => "UserInfoRequestValidation",
            Self::UserInfoEndpoint => "UserInfoEndpoint",
            Self::AuthorizeEndpoint => "AuthorizeEndpoint",
            Self::ProtectedResource => "ProtectedResource",
        }
    }
}

impl fmt::Display for ProfileCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ProfileDataRequest {
    pub subject_id: String,
    pub client_id: Option<String>,
    pub caller: ProfileCaller,
    pub requested_claim_types: Vec<String>,
    pub requested_scopes: Vec<ParsedScope>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile source unavailable: {0}")]
    Unavailable(String),
    #[error("user directory could not be loaded: {0}")]
    Load(String),
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Claims of `request.subject_id` restricted to the requested types.
    /// An unknown subject yields an empty set.
    async fn get_profile_data(&self, request: &ProfileDataRequest) -> Result<Claims, ProfileError>;

    /// Whether the subject may still use tokens and sessions issued earlier.
    async fn is_active(&self, subject_id: &str, caller: ProfileCaller)
    -> Result<bool, ProfileError>;
}
