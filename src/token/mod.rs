//! Stateless bearer token signing and verification.

pub mod codec;

pub use codec::{TokenCodec, TokenClaims, TokenKind};
