//! Pushed Authorization Requests (RFC 9126).
//!
//! `ParStore` is the storage contract; `PushedRequestService` owns handle
//! generation, expiry and the single-use semantics on top of it.
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;
pub mod valkey;

pub use memory::InMemoryParStore;
pub use postgres::PostgresParStore;
pub use service::{ParError, PushedRequestHandle, PushedRequestService};
pub use store::{ParStore, ParStoreError, PushedAuthorizationRequest};
pub use valkey::ValkeyParStore;

/// Prefix of every handle this server issues.
pub const REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";
