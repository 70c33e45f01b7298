//! Append-only audit trail for login attempts and admin actions.
//!
//! Rows are inserted and read back, never updated or deleted. Writes are
//! fire-and-forget: a failed insert is logged locally and the surrounding
//! flow carries on.

pub mod models;
pub mod repo;

pub use models::{FailureReason, LoginLog};
pub use repo::AuditRepo;
