//! One-time code challenges: short lived, attempt limited, single use.

pub mod models;
pub mod repo;
pub mod service;

pub use models::{OtpChallenge, OtpPurpose};
pub use service::{OtpService, OtpVerifyOutcome};
