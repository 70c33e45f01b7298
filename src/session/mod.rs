//! Session ledger: revocable refresh-token grants persisted per device.

pub mod models;
pub mod repo;

pub use models::{RevokeReason, Session};
pub use repo::{CreateSessionOutcome, SessionRepo, SessionValidation};
