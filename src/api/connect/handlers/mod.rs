pub mod authorize;
pub mod par;
pub mod userinfo;
