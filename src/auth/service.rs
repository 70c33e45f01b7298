use crate::{
    admin::{AdminRepo, AdminUser},
    api::handlers::auth::AuthConfig,
    audit::{AuditRepo, FailureReason, LoginLog, repo::LoginAttempt},
    auth::error::AuthError,
    email::Mailer,
    otp::{OtpPurpose, OtpService, OtpVerifyOutcome, repo::OtpRepo},
    session::{CreateSessionOutcome, RevokeReason, Session, SessionRepo, SessionValidation},
    token::{TokenCodec, TokenKind},
    users::{
        CreateUserOutcome, User, UserRepo, password,
        repo::{PendingVerification, verification_expired},
    },
    utils::{generate_verification_token, hash_token},
};
use anyhow::anyhow;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Scope claim carried by admin tokens. Regular tokens have no scope.
const ADMIN_SCOPE: &str = "admin";

/// How many times a session insert is retried when the refresh-token hash
/// collides with an existing row.
const SESSION_CREATE_RETRIES: usize = 3;

/// Authenticated caller, resolved from a bearer access token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
}

/// A user together with a freshly minted token pair.
#[derive(Debug)]
pub struct SignedIn {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration result. The raw verification token is populated only
/// outside production, for out-of-band delivery during development.
#[derive(Debug)]
pub struct Registration {
    pub signed_in: SignedIn,
    pub verification_token: Option<String>,
}

/// A password login either completes or parks at the OTP step.
#[derive(Debug)]
pub enum LoginOutcome {
    SignedIn(SignedIn),
    OtpRequired { otp_id: Uuid },
}

/// Result of a refresh. The refresh token is present only when rotation
/// is enabled.
#[derive(Debug)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    codec: TokenCodec,
    config: AuthConfig,
    mailer: Mailer,
    otp: OtpService,
}

impl AuthService {
    #[must_use]
    pub fn new(pool: PgPool, config: AuthConfig, mailer: Mailer) -> Self {
        let codec = TokenCodec::new(config.jwt_secret());
        let otp = OtpService::new(
            pool.clone(),
            config.otp_code_length(),
            config.otp_ttl_minutes(),
            config.otp_max_attempts(),
        );

        Self {
            pool,
            codec,
            config,
            mailer,
            otp,
        }
    }

    /// Registers a new account and signs it in.
    ///
    /// The caller must pass an already normalized email. The user row and
    /// its pending verification token land in one transaction.
    ///
    /// # Errors
    /// `Conflict` when the email is taken; `Internal` on store or signing
    /// failures.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        ip_address: &str,
        device_info: Option<&str>,
    ) -> Result<Registration, AuthError> {
        // 1. Hash the password before touching the database
        let password_hash = password::hash_password(password, self.config.password_params())?;

        // 2. Create the user, plus a pending verification token unless
        //    accounts are auto-verified
        let auto_verify = self.config.auto_verify();
        let raw_verification = if auto_verify {
            None
        } else {
            Some(generate_verification_token()?)
        };
        let pending = raw_verification.as_deref().map(|token| PendingVerification {
            token,
            ttl_hours: self.config.verification_ttl_hours(),
        });

        let outcome =
            UserRepo::create(&self.pool, email, &password_hash, auto_verify, pending).await?;
        let user = match outcome {
            CreateUserOutcome::Created { user, .. } => user,
            CreateUserOutcome::Conflict => {
                return Err(AuthError::Conflict("email_already_registered"));
            }
        };

        // 3. First session and token pair
        let signed_in = self.issue_session(&user, ip_address, device_info).await?;

        // 4. Verification email
        if let Some(token) = raw_verification.as_deref() {
            self.mailer.send_verification_email(&user.email, token)?;
        }

        // 5. The raw token rides the response only outside production
        let verification_token =
            raw_verification.filter(|_| !self.config.is_production());

        Ok(Registration {
            signed_in,
            verification_token,
        })
    }

    /// Consumes an email verification token and marks the user verified.
    ///
    /// # Errors
    /// `NotFound` for an unknown or already consumed token; `Expired` for a
    /// stale one (the row is deleted on sight).
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let Some(verification) = UserRepo::find_verification_by_token(&self.pool, token).await?
        else {
            return Err(AuthError::NotFound("verification_token_not_found"));
        };

        if verification_expired(&verification, Utc::now()) {
            UserRepo::delete_verification(&self.pool, verification.id).await?;
            return Err(AuthError::Expired("verification_token_expired"));
        }

        let Some(user) =
            UserRepo::consume_verification(&self.pool, verification.id, verification.user_id)
                .await?
        else {
            return Err(AuthError::NotFound("user_not_found"));
        };

        Ok(user)
    }

    /// Password login. Unknown email, wrong password and disabled account
    /// all answer the same 401 so the response leaks nothing; the audit row
    /// keeps the distinction.
    ///
    /// # Errors
    /// `Unauthorized`, `Forbidden` (unverified email), or `Internal`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip_address: &str,
        device_info: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        // 1. Resolve and check credentials
        let Some(user) = UserRepo::find_by_email(&self.pool, email).await? else {
            self.audit_login_failure(
                email,
                None,
                FailureReason::InvalidCredentials,
                ip_address,
                device_info,
            )
            .await;
            return Err(AuthError::Unauthorized("invalid_credentials"));
        };

        if !password::verify_password(password, &user.password_hash) {
            self.audit_login_failure(
                email,
                Some(user.id),
                FailureReason::InvalidCredentials,
                ip_address,
                device_info,
            )
            .await;
            return Err(AuthError::Unauthorized("invalid_credentials"));
        }

        if !user.is_active() {
            self.audit_login_failure(
                email,
                Some(user.id),
                FailureReason::AccountDisabled,
                ip_address,
                device_info,
            )
            .await;
            return Err(AuthError::Unauthorized("invalid_credentials"));
        }

        // 2. Verification gate
        if self.config.verification_required() && !user.email_verified {
            self.audit_login_failure(
                email,
                Some(user.id),
                FailureReason::EmailNotVerified,
                ip_address,
                device_info,
            )
            .await;
            return Err(AuthError::Forbidden("email_not_verified"));
        }

        // 3. Either park at the OTP step or complete the login
        if self.config.otp_on_login() {
            let (challenge, code) = self
                .otp
                .issue(user.id, OtpPurpose::Login, Some(ip_address), device_info)
                .await?;
            self.mailer.send_otp_email(&user.email, &code)?;
            return Ok(LoginOutcome::OtpRequired {
                otp_id: challenge.id,
            });
        }

        let signed_in = self.complete_login(user, ip_address, device_info).await?;
        Ok(LoginOutcome::SignedIn(signed_in))
    }

    /// Second step of an OTP login: checks the code and, on success, issues
    /// the session exactly as a plain password login would.
    ///
    /// # Errors
    /// Maps the OTP outcome onto the taxonomy: unknown id → `NotFound`,
    /// spent → `AlreadyUsed`, stale → `Expired`, cap hit →
    /// `AttemptsExceeded`, wrong code → `Unauthorized`.
    pub async fn verify_login_otp(
        &self,
        otp_id: Uuid,
        code: &str,
        ip_address: &str,
        device_info: Option<&str>,
    ) -> Result<SignedIn, AuthError> {
        // 1. Check the code; the challenge itself never touches sessions
        let outcome = self.otp.verify_challenge(otp_id, code).await?;

        let challenge = match outcome {
            OtpVerifyOutcome::Verified(challenge) => challenge,
            OtpVerifyOutcome::NotFound => {
                return Err(AuthError::NotFound("challenge_not_found"));
            }
            failure => {
                self.audit_otp_failure(otp_id, ip_address, device_info).await;
                return Err(match failure {
                    OtpVerifyOutcome::AlreadyUsed => AuthError::AlreadyUsed("code_already_used"),
                    OtpVerifyOutcome::Expired => AuthError::Expired("code_expired"),
                    OtpVerifyOutcome::AttemptsExceeded => {
                        AuthError::AttemptsExceeded("attempts_exceeded")
                    }
                    _ => AuthError::Unauthorized("invalid_code"),
                });
            }
        };

        // 2. The account must still exist and be enabled
        let Some(user) = UserRepo::find_by_id(&self.pool, challenge.user_id).await? else {
            return Err(AuthError::NotFound("user_not_found"));
        };

        if !user.is_active() {
            self.audit_login_failure(
                &user.email,
                Some(user.id),
                FailureReason::AccountDisabled,
                ip_address,
                device_info,
            )
            .await;
            return Err(AuthError::Unauthorized("invalid_credentials"));
        }

        // 3. Session issuance is the orchestrator's follow-up step
        self.complete_login(user, ip_address, device_info).await
    }

    /// Exchanges a refresh token for a new access token (and a new refresh
    /// token when rotation is enabled).
    ///
    /// # Errors
    /// `Unauthorized` for anything wrong with the token or its session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
        // 1. Cryptographic check before any database work
        let Some(claims) = self.codec.decode(refresh_token, TokenKind::Refresh) else {
            return Err(AuthError::Unauthorized("invalid_refresh_token"));
        };

        // 2. The ledger has the final say
        let validation = SessionRepo::validate(&self.pool, claims.session_id, refresh_token).await?;
        let SessionValidation::Valid(session) = validation else {
            return Err(AuthError::Unauthorized("invalid_refresh_token"));
        };

        // 3. The owning account must still be enabled
        let user = UserRepo::find_by_id(&self.pool, session.user_id).await?;
        let Some(user) = user.filter(User::is_active) else {
            return Err(AuthError::Unauthorized("invalid_refresh_token"));
        };

        // 4. Mint the new pair
        let access_token = self.codec.sign_access_token(
            user.id,
            session.id,
            Some(&user.email),
            None,
            self.config.access_ttl_minutes(),
        )?;

        let rotated = if self.config.rotate_refresh_tokens() {
            let new_refresh = self.codec.sign_refresh_token(
                user.id,
                session.id,
                Some(&user.email),
                self.config.refresh_ttl_days(),
            )?;
            SessionRepo::rotate_refresh_hash(
                &self.pool,
                session.id,
                &hash_token(&new_refresh),
                self.config.refresh_ttl_days(),
            )
            .await?;
            Some(new_refresh)
        } else {
            SessionRepo::touch(&self.pool, session.id).await?;
            None
        };

        Ok(RefreshedTokens {
            access_token,
            refresh_token: rotated,
        })
    }

    /// Resolves a bearer access token to a live principal. Every failure
    /// collapses into the same 401.
    ///
    /// # Errors
    /// `Unauthorized` when the token, its session, or its user is not valid.
    pub async fn authenticate(&self, access_token: &str) -> Result<Principal, AuthError> {
        let Some(claims) = self.codec.decode(access_token, TokenKind::Access) else {
            return Err(AuthError::Unauthorized("invalid_token"));
        };

        // Admin tokens are scoped and session-less; they never authenticate
        // as a regular principal
        if claims.scope.is_some() {
            return Err(AuthError::Unauthorized("invalid_token"));
        }

        let Some(session) = SessionRepo::find_by_id(&self.pool, claims.session_id).await? else {
            return Err(AuthError::Unauthorized("invalid_token"));
        };

        if session.user_id != claims.sub || !session.is_active_at(Utc::now()) {
            return Err(AuthError::Unauthorized("invalid_token"));
        }

        let user = UserRepo::find_by_id(&self.pool, claims.sub).await?;
        let Some(user) = user.filter(User::is_active) else {
            return Err(AuthError::Unauthorized("invalid_token"));
        };

        Ok(Principal {
            user_id: user.id,
            session_id: session.id,
            email: user.email,
        })
    }

    /// Revokes the caller's current session. Idempotent.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn logout(&self, principal: &Principal) -> Result<(), AuthError> {
        SessionRepo::revoke(&self.pool, principal.session_id, RevokeReason::Logout).await?;
        Ok(())
    }

    /// Revokes every active session of the caller and returns how many
    /// were live.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn logout_all(&self, principal: &Principal) -> Result<u64, AuthError> {
        let revoked =
            SessionRepo::revoke_all(&self.pool, principal.user_id, RevokeReason::LogoutAll)
                .await?;
        info!("Revoked {revoked} sessions for user {}", principal.user_id);
        Ok(revoked)
    }

    /// Active sessions of the caller, newest first.
    ///
    /// # Errors
    /// `Internal` on store failure.
    pub async fn list_sessions(&self, principal: &Principal) -> Result<Vec<Session>, AuthError> {
        let sessions = SessionRepo::list_active_for_user(&self.pool, principal.user_id).await?;
        Ok(sessions)
    }

    /// Admin credential check. Admin tokens carry a scope claim and are not
    /// backed by a session row, so there is no refresh for them.
    ///
    /// # Errors
    /// `Unauthorized` on unknown email, wrong password, or disabled account.
    pub async fn admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(AdminUser, String), AuthError> {
        let Some(admin) = AdminRepo::find_by_email(&self.pool, email).await? else {
            return Err(AuthError::Unauthorized("invalid_credentials"));
        };

        if admin.disabled || !password::verify_password(password, &admin.password_hash) {
            return Err(AuthError::Unauthorized("invalid_credentials"));
        }

        // The random id only identifies the token in logs
        let token = self.codec.sign_access_token(
            admin.id,
            Uuid::new_v4(),
            Some(&admin.email),
            Some(ADMIN_SCOPE),
            self.config.admin_ttl_minutes(),
        )?;

        AdminRepo::touch_last_login(&self.pool, admin.id).await?;

        Ok((admin, token))
    }

    /// Resolves a bearer token to an admin account.
    ///
    /// # Errors
    /// `Unauthorized` unless the token carries the admin scope and the
    /// account is live.
    pub async fn authenticate_admin(&self, access_token: &str) -> Result<AdminUser, AuthError> {
        let Some(claims) = self.codec.decode(access_token, TokenKind::Access) else {
            return Err(AuthError::Unauthorized("invalid_token"));
        };

        if claims.scope.as_deref() != Some(ADMIN_SCOPE) {
            return Err(AuthError::Unauthorized("invalid_token"));
        }

        let Some(admin) = AdminRepo::find_by_id(&self.pool, claims.sub).await? else {
            return Err(AuthError::Unauthorized("invalid_token"));
        };

        if admin.disabled {
            return Err(AuthError::Unauthorized("invalid_token"));
        }

        Ok(admin)
    }

    /// Soft-disables a user. Their sessions stay in the ledger and fail
    /// validation through the user check.
    ///
    /// # Errors
    /// `NotFound` when the target does not exist.
    pub async fn admin_disable_user(
        &self,
        admin: &AdminUser,
        target_id: Uuid,
        reason: &str,
        ip_address: &str,
    ) -> Result<(), AuthError> {
        let disabled = UserRepo::disable(&self.pool, target_id, reason).await?;
        if !disabled {
            return Err(AuthError::NotFound("user_not_found"));
        }

        AuditRepo::record_admin_action(
            &self.pool,
            admin.id,
            "disable_user",
            Some(target_id),
            Some(reason),
            ip_address,
        )
        .await;

        Ok(())
    }

    /// Revokes every active session of the target user.
    ///
    /// # Errors
    /// `NotFound` when the target does not exist.
    pub async fn admin_revoke_sessions(
        &self,
        admin: &AdminUser,
        target_id: Uuid,
        ip_address: &str,
    ) -> Result<u64, AuthError> {
        if UserRepo::find_by_id(&self.pool, target_id).await?.is_none() {
            return Err(AuthError::NotFound("user_not_found"));
        }

        let revoked =
            SessionRepo::revoke_all(&self.pool, target_id, RevokeReason::AdminAction).await?;

        let details = format!("revoked {revoked} sessions");
        AuditRepo::record_admin_action(
            &self.pool,
            admin.id,
            "revoke_sessions",
            Some(target_id),
            Some(&details),
            ip_address,
        )
        .await;

        Ok(revoked)
    }

    /// Login history of the target user, for support and abuse review.
    ///
    /// # Errors
    /// `NotFound` when the target does not exist.
    pub async fn admin_list_login_logs(
        &self,
        admin: &AdminUser,
        target_id: Uuid,
        limit: i64,
        ip_address: &str,
    ) -> Result<Vec<LoginLog>, AuthError> {
        if UserRepo::find_by_id(&self.pool, target_id).await?.is_none() {
            return Err(AuthError::NotFound("user_not_found"));
        }

        let logs = AuditRepo::list_login_logs_for_user(&self.pool, target_id, limit).await?;

        AuditRepo::record_admin_action(
            &self.pool,
            admin.id,
            "view_logs",
            Some(target_id),
            None,
            ip_address,
        )
        .await;

        Ok(logs)
    }

    /// Issues a session row plus its token pair. The refresh JWT is signed
    /// first so its hash can land in the unique column; a hash collision
    /// retries with a fresh session id.
    async fn issue_session(
        &self,
        user: &User,
        ip_address: &str,
        device_info: Option<&str>,
    ) -> Result<SignedIn, AuthError> {
        for _ in 0..SESSION_CREATE_RETRIES {
            let session_id = Uuid::new_v4();
            let refresh_token = self.codec.sign_refresh_token(
                user.id,
                session_id,
                Some(&user.email),
                self.config.refresh_ttl_days(),
            )?;

            let outcome = SessionRepo::create(
                &self.pool,
                session_id,
                user.id,
                &hash_token(&refresh_token),
                device_info,
                Some(ip_address),
                self.config.refresh_ttl_days(),
            )
            .await?;

            match outcome {
                CreateSessionOutcome::Created(_) => {
                    let access_token = self.codec.sign_access_token(
                        user.id,
                        session_id,
                        Some(&user.email),
                        None,
                        self.config.access_ttl_minutes(),
                    )?;

                    return Ok(SignedIn {
                        user: user.clone(),
                        access_token,
                        refresh_token,
                    });
                }
                CreateSessionOutcome::Conflict => {}
            }
        }

        Err(AuthError::Internal(anyhow!(
            "could not allocate a unique session"
        )))
    }

    /// Shared tail of password and OTP logins: session, `last_login_at`,
    /// new-device alert, success audit.
    async fn complete_login(
        &self,
        user: User,
        ip_address: &str,
        device_info: Option<&str>,
    ) -> Result<SignedIn, AuthError> {
        // Device history is read before the new session lands so the alert
        // only fires for genuinely unseen devices
        let history = SessionRepo::device_history(&self.pool, user.id, device_info).await?;

        let signed_in = self.issue_session(&user, ip_address, device_info).await?;

        UserRepo::touch_last_login(&self.pool, user.id).await?;

        if history.has_sessions && !history.device_seen {
            self.mailer.send_new_device_alert(
                &user.email,
                device_info.unwrap_or("unknown device"),
                ip_address,
            )?;
        }

        AuditRepo::record_login(
            &self.pool,
            LoginAttempt {
                email: &user.email,
                user_id: Some(user.id),
                success: true,
                failure_reason: None,
                ip_address,
                device_info,
            },
        )
        .await;

        Ok(signed_in)
    }

    async fn audit_login_failure(
        &self,
        email: &str,
        user_id: Option<Uuid>,
        reason: FailureReason,
        ip_address: &str,
        device_info: Option<&str>,
    ) {
        AuditRepo::record_login(
            &self.pool,
            LoginAttempt {
                email,
                user_id,
                success: false,
                failure_reason: Some(reason),
                ip_address,
                device_info,
            },
        )
        .await;
    }

    /// Attributes a failed code entry to its user for the audit trail.
    /// Lookup failures are swallowed the same way audit writes are.
    async fn audit_otp_failure(&self, otp_id: Uuid, ip_address: &str, device_info: Option<&str>) {
        let Ok(Some(challenge)) = OtpRepo::find(&self.pool, otp_id).await else {
            return;
        };
        let Ok(Some(user)) = UserRepo::find_by_id(&self.pool, challenge.user_id).await else {
            return;
        };

        self.audit_login_failure(
            &user.email,
            Some(user.id),
            FailureReason::OtpFailed,
            ip_address,
            device_info,
        )
        .await;
    }
}
