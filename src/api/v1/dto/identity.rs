use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    // "Bearer" or "DPoP"
    pub token_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jkt: Option<String>,
    pub claims: serde_json::Map<String, serde_json::Value>,
}
