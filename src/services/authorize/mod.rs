//! Authorize request handling: parameters, validation, return URLs, resumption.
pub mod assembler;
pub mod client;
pub mod interactive;
pub mod parameters;
pub mod request;
pub mod return_url;
pub mod scope;
pub mod validator;

pub use assembler::{AuthorizationRequestAssembler, RequestContext, ResolveError};
pub use client::{Client, ClientStore, ClientStoreError, InMemoryClientStore};
pub use interactive::{InteractivePage, InteractivePageRedirect};
pub use parameters::AuthorizationParameters;
pub use request::AuthorizationRequest;
pub use return_url::ReturnUrlGuard;
pub use scope::{ParsedScope, ScopeParser};
pub use validator::{
    AuthorizeContext, AuthorizeError, AuthorizeRequestValidator, AuthorizeValidationError,
    BasicAuthorizeRequestValidator, RedirectableError,
};
