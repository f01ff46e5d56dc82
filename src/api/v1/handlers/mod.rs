pub mod authorization_context;
pub mod health;
pub mod identity;
