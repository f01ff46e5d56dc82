pub mod connect;
pub mod v1;
