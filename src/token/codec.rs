//! HS256 token codec for access and refresh tokens.
//!
//! The codec is purely cryptographic: it never touches the database. Callers
//! must cross-check the embedded `session_id` against the session ledger
//! before trusting a decoded claim.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a token authorizes API calls or mints new access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by every signed token.
///
/// `sub` and `session_id` are mandatory; a token missing either fails
/// decoding. `email` and `scope` are optional extras (`scope` marks admin
/// tokens, which are not session backed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub session_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a short-lived access token bound to a session.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn sign_access_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        email: Option<&str>,
        scope: Option<&str>,
        ttl_minutes: i64,
    ) -> Result<String> {
        self.sign(
            TokenKind::Access,
            user_id,
            session_id,
            email,
            scope,
            Duration::minutes(ttl_minutes),
        )
    }

    /// Sign a long-lived refresh token bound to a session.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn sign_refresh_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        email: Option<&str>,
        ttl_days: i64,
    ) -> Result<String> {
        self.sign(
            TokenKind::Refresh,
            user_id,
            session_id,
            email,
            None,
            Duration::days(ttl_days),
        )
    }

    fn sign(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        session_id: Uuid,
        email: Option<&str>,
        scope: Option<&str>,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id,
            session_id,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            email: email.map(str::to_string),
            scope: scope.map(str::to_string),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to sign token")
    }

    /// Decode and validate a token, expecting a specific kind.
    ///
    /// Any failure (bad signature, expiry, kind mismatch, missing claims)
    /// yields `None`; callers map that to an unauthorized response without
    /// distinguishing the cause.
    #[must_use]
    pub fn decode(&self, token: &str, expected: TokenKind) -> Option<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).ok()?;
        (data.claims.kind == expected).then_some(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SecretString::from("unit-test-secret-0123456789abcdef"))
    }

    #[test]
    fn access_token_round_trip() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let token = codec
            .sign_access_token(user_id, session_id, Some("alice@example.com"), None, 15)
            .unwrap();

        let claims = codec.decode(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.session_id, session_id);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.scope, None);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn refresh_token_round_trip() {
        let codec = codec();
        let token = codec
            .sign_refresh_token(Uuid::new_v4(), Uuid::new_v4(), None, 30)
            .unwrap();
        let claims = codec.decode(&token, TokenKind::Refresh).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let codec = codec();
        let access = codec
            .sign_access_token(Uuid::new_v4(), Uuid::new_v4(), None, None, 15)
            .unwrap();
        assert!(codec.decode(&access, TokenKind::Refresh).is_none());

        let refresh = codec
            .sign_refresh_token(Uuid::new_v4(), Uuid::new_v4(), None, 30)
            .unwrap();
        assert!(codec.decode(&refresh, TokenKind::Access).is_none());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = codec();
        let token = codec
            .sign_access_token(Uuid::new_v4(), Uuid::new_v4(), None, None, 15)
            .unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');
        assert!(codec.decode(&tampered, TokenKind::Access).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        // Well past the default decoding leeway.
        let token = codec
            .sign_access_token(Uuid::new_v4(), Uuid::new_v4(), None, None, -10)
            .unwrap();
        assert!(codec.decode(&token, TokenKind::Access).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = codec()
            .sign_access_token(Uuid::new_v4(), Uuid::new_v4(), None, None, 15)
            .unwrap();
        let other = TokenCodec::new(&SecretString::from("a-different-secret-0123456789abc"));
        assert!(other.decode(&token, TokenKind::Access).is_none());
    }

    #[test]
    fn scope_claim_round_trip() {
        let codec = codec();
        let token = codec
            .sign_access_token(Uuid::new_v4(), Uuid::new_v4(), None, Some("admin"), 15)
            .unwrap();
        let claims = codec.decode(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.scope.as_deref(), Some("admin"));
    }

    #[test]
    fn wire_type_field_is_lowercase() {
        let codec = codec();
        let token = codec
            .sign_access_token(Uuid::new_v4(), Uuid::new_v4(), None, None, 15)
            .unwrap();
        // Claims sit in the second dot-separated JWT segment.
        let payload = token.split('.').nth(1).unwrap();
        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            payload.as_bytes(),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "access");
    }
}
