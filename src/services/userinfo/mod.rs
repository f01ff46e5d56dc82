//! UserInfo endpoint pipeline: request validation, then claim resolution.
pub mod response;
pub mod validator;

pub use response::UserInfoResponseGenerator;
pub use validator::{UserInfoError, UserInfoRequestValidationResult, UserInfoRequestValidator};
