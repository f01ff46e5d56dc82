//! Validation core of an OAuth2/OpenID Connect authorization server.
//!
//! - return-URL guarding and authorize-request reconstruction
//! - pushed authorization requests (single-use, TTL-bound handles)
//! - DPoP proof validation with replay protection
//! - UserInfo token validation and claim release
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
