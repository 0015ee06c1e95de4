//! Account flows: sign-up, sign-in, sign-out, token refresh.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::cache::{CacheCoordinator, QueryKey};
use crate::domain::entities::UserRecord;
use crate::domain::validate;

use super::error::AppError;
use super::session::{Session, SessionHandle};
use super::sources::{AuthSource, AuthTokens, CreateProfileParams, UsersSource};

/// Input for the sign-up form.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub handle: String,
    pub display_name: String,
    pub timezone: Option<chrono_tz::Tz>,
}

pub struct AuthService {
    cache: Arc<CacheCoordinator>,
    auth: Arc<dyn AuthSource>,
    users: Arc<dyn UsersSource>,
    session: Arc<SessionHandle>,
}

impl AuthService {
    pub fn new(
        cache: Arc<CacheCoordinator>,
        auth: Arc<dyn AuthSource>,
        users: Arc<dyn UsersSource>,
        session: Arc<SessionHandle>,
    ) -> Self {
        Self {
            cache,
            auth,
            users,
            session,
        }
    }

    /// Create an account and its profile, then sign in.
    ///
    /// Validation failures block the submission before any request goes out.
    /// The session is installed as soon as the account exists, so the
    /// profile write carries the new user's token; if that write fails the
    /// session stays and the caller may retry it.
    pub async fn sign_up(&self, form: SignUpForm) -> Result<UserRecord, AppError> {
        validate::email(&form.email)?;
        validate::password(&form.password, &form.password_confirmation)?;
        validate::handle(&form.handle)?;

        let tokens = self.auth.sign_up(form.email.trim(), &form.password).await?;
        self.session
            .sign_in(session_from(&tokens, form.email.trim()));

        let display_name = if form.display_name.trim().is_empty() {
            form.handle.clone()
        } else {
            form.display_name.trim().to_string()
        };
        let profile = self
            .users
            .create_profile(CreateProfileParams {
                user_id: tokens.user_id,
                handle: form.handle,
                display_name,
                timezone: form.timezone,
            })
            .await?;

        self.cache
            .write_confirmed(QueryKey::User(profile.id), profile.clone());
        Ok(profile)
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserRecord, AppError> {
        validate::email(email)?;

        let tokens = self.auth.sign_in(email.trim(), password).await?;
        self.session.sign_in(session_from(&tokens, email.trim()));

        let profile = self.users.fetch_user(tokens.user_id).await?;
        self.cache
            .write_confirmed(QueryKey::User(profile.id), profile.clone());
        Ok(profile)
    }

    /// Sign out and drop all viewer-scoped cache state.
    ///
    /// The remote revocation is best-effort: the local session is cleared
    /// either way.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        if let Some(session) = self.session.current() {
            if let Err(err) = self.auth.sign_out(&session.refresh_token).await {
                warn!(error = %err, "Remote sign-out failed; clearing local session anyway");
            }
        }
        self.session.sign_out();
        self.cache.clear();
        Ok(())
    }

    /// Exchange the refresh token for a new id token.
    pub async fn refresh_session(&self) -> Result<(), AppError> {
        let current = self.session.current().ok_or(AppError::SignedOut)?;
        let tokens = self.auth.refresh(&current.refresh_token).await?;
        self.session.sign_in(session_from(&tokens, &current.email));
        Ok(())
    }
}

fn session_from(tokens: &AuthTokens, email: &str) -> Session {
    Session {
        user_id: tokens.user_id,
        email: email.to_string(),
        id_token: tokens.id_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        expires_at: OffsetDateTime::now_utc() + Duration::seconds(tokens.expires_in_secs as i64),
    }
}
