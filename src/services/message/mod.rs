//! Authorize parameters parked while the user is on the login or consent page.
//!
//! The return URL carries only the message id (`authzId`). Unlike a pushed
//! request a message is read, not consumed: the pages look it up and the
//! callback resumes from it, as often as needed until it expires.
pub mod memory;
pub mod service;
pub mod store;
pub mod valkey;

pub use memory::InMemoryMessageStore;
pub use service::{AuthorizationMessageService, MessageError, ResumedParameters};
pub use store::{AuthorizationMessage, AuthorizationMessageStore, MessageStoreError};
pub use valkey::ValkeyMessageStore;

/// Return-URL parameter that names a parked message.
pub const MESSAGE_ID_PARAMETER: &str = "authzId";
