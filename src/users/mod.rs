//! Credential store: user records, password hashes, verification and disable state.

pub mod models;
pub mod password;
pub mod repo;

pub use models::User;
pub use repo::{CreateUserOutcome, UserRepo};
