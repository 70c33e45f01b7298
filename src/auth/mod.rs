//! The orchestrator: every authentication flow starts here and fans out to
//! the user, session, token, otp and audit modules.

pub mod error;
pub mod service;

pub use error::AuthError;
pub use service::{
    AuthService, LoginOutcome, Principal, RefreshedTokens, Registration, SignedIn,
};
