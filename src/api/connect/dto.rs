use serde::Serialize;

use crate::services::par::PushedRequestHandle;

/// RFC 9126 §2.2 success response.
#[derive(Debug, Serialize)]
pub struct ParResponse {
    pub request_uri: String,
    pub expires_in: u64,
}

impl From<PushedRequestHandle> for ParResponse {
    fn from(handle: PushedRequestHandle) -> Self {
        Self {
            request_uri: handle.request_uri,
            expires_in: handle.expires_in,
        }
    }
}
