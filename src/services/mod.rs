pub mod auth;
pub mod authorize;
pub mod cache;
pub mod claims;
pub mod clock;
pub mod message;
pub mod par;
pub mod profile;
pub mod sweeper;
pub mod userinfo;
