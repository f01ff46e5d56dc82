pub mod authorization_context;
pub mod identity;
