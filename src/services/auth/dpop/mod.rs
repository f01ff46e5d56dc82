pub mod core;
pub mod thumbprint;
pub mod types;

pub use core::{DpopError, DpopErrorKind, DpopPolicy, DpopValidator};
pub use types::{BoundAccessToken, VerifiedDpop};
