//! In-memory user directory and the profile service over it.
use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashMap, path::Path, sync::Arc, sync::RwLock};

use crate::services::claims::{Claims, claim_types};
use crate::services::profile::{ProfileCaller, ProfileDataRequest, ProfileError, ProfileService};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub subject_id: String,
    pub active: bool,
    pub claims: Claims,
}

// File shape: `[{"subject_id": "...", "active": true, "claims": {"name": "..."}}]`
#[derive(Debug, Deserialize)]
struct UserRecordFile {
    subject_id: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    claims: serde_json::Map<String, serde_json::Value>,
}

fn default_active() -> bool {
    true
}

impl From<UserRecordFile> for UserRecord {
    fn from(raw: UserRecordFile) -> Self {
        let mut claims = Claims::new();
        claims.add(claim_types::SUBJECT, raw.subject_id.clone());
        claims.extend(
            Claims::from_json_object(&raw.claims)
                .into_iter()
                .filter(|c| c.claim_type != claim_types::SUBJECT),
        );
        Self {
            subject_id: raw.subject_id,
            active: raw.active,
            claims,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProfileError> {
        let raw: Vec<UserRecordFile> =
            serde_json::from_str(json).map_err(|e| ProfileError::Load(e.to_string()))?;

        let directory = Self::new();
        for record in raw {
            directory.insert(record.into());
        }
        Ok(directory)
    }

    pub fn load_json_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ProfileError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn insert(&self, record: UserRecord) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(record.subject_id.clone(), record);
    }

    /// Flip the activity flag. Returns false if the subject is unknown.
    pub fn set_active(&self, subject_id: &str, active: bool) -> bool {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        match users.get_mut(subject_id) {
            Some(user) => {
                user.active = active;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, subject_id: &str) -> Option<UserRecord> {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(subject_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryProfileService {
    directory: Arc<InMemoryUserDirectory>,
}

impl DirectoryProfileService {
    pub fn new(directory: Arc<InMemoryUserDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<InMemoryUserDirectory> {
        &self.directory
    }
}

#[async_trait]
impl ProfileService for DirectoryProfileService {
    async fn get_profile_data(&self, request: &ProfileDataRequest) -> Result<Claims, ProfileError> {
        tracing::debug!(
            subject = %request.subject_id,
            caller = %request.caller,
            client_id = ?request.client_id,
            requested = ?request.requested_claim_types,
            "profile data requested"
        );

        if request.requested_claim_types.is_empty() {
            return Ok(Claims::new());
        }
        let Some(user) = self.directory.get(&request.subject_id) else {
            return Ok(Claims::new());
        };

        let issued = user.claims.filter_types(&request.requested_claim_types);
        tracing::debug!(
            subject = %request.subject_id,
            issued = issued.len(),
            "profile data issued"
        );
        Ok(issued)
    }

    async fn is_active(
        &self,
        subject_id: &str,
        caller: ProfileCaller,
    ) -> Result<bool, ProfileError> {
        tracing::debug!(subject = %subject_id, caller = %caller, "is_active called");
        Ok(self.directory.get(subject_id).is_some_and(|u| u.active))
    }
}
