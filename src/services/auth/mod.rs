pub mod access_jwt;
pub mod dpop;
pub mod replay;
pub mod sender;

pub use access_jwt::{
    JwtAccessTokenValidator, ProtectedResourceError, TokenValidationError, TokenValidationResult,
    TokenValidator,
};
pub use sender::{AuthScheme, PresentedToken, SenderConstraint, SenderError};
