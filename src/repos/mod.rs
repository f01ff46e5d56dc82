pub mod error;
pub mod par_repo;
