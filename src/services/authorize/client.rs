//! Registered clients and the store contract used by authorize validation.
use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Client {
    pub client_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
    #[serde(default = "default_response_types")]
    pub allowed_response_types: Vec<String>,
    #[serde(default = "default_true")]
    pub require_pkce: bool,
    #[serde(default)]
    pub allow_plain_text_pkce: bool,
    // Front-channel authorize requests must come through PAR.
    #[serde(default)]
    pub require_pushed_authorization: bool,
}

fn default_true() -> bool {
    true
}

fn default_response_types() -> Vec<String> {
    vec!["code".to_string()]
}

#[derive(Debug, thiserror::Error)]
pub enum ClientStoreError {
    #[error("client store unavailable: {0}")]
    Unavailable(String),
    #[error("client list could not be loaded: {0}")]
    Load(String),
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// `None` for unknown and disabled clients alike.
    async fn find_enabled_client_by_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Client>, ClientStoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryClientStore {
    clients: HashMap<String, Client>,
}

impl InMemoryClientStore {
    pub fn new(clients: Vec<Client>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClientStoreError> {
        let clients: Vec<Client> =
            serde_json::from_str(json).map_err(|e| ClientStoreError::Load(e.to_string()))?;
        Ok(Self::new(clients))
    }

    pub fn load_json_file(path: impl AsRef<Path>) -> Result<Self, ClientStoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ClientStoreError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn find_enabled_client_by_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Client>, ClientStoreError> {
        Ok(self.clients.get(client_id).filter(|c| c.enabled).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_clients_are_not_found() {
        let store = InMemoryClientStore::from_json_str(
            r#"[
                {"client_id": "web", "redirect_uris": ["https://app/cb"], "allowed_scopes": ["openid"]},
                {"client_id": "old", "enabled": false}
            ]"#,
        )
        .unwrap();

        let web = store.find_enabled_client_by_id("web").await.unwrap().unwrap();
        assert!(web.require_pkce);
        assert_eq!(web.allowed_response_types, vec!["code"]);
        assert!(store.find_enabled_client_by_id("old").await.unwrap().is_none());
        assert!(store.find_enabled_client_by_id("nope").await.unwrap().is_none());
    }
}
