//! Explicit viewer session.
//!
//! One session object owned by a watch channel replaces the source app's
//! global auth context: services receive the handle by injection, and the
//! view layer awaits the receiver for sign-in/sign-out transitions.

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

/// A signed-in viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}

/// Shared handle to the current session state.
pub struct SessionHandle {
    state: watch::Sender<Option<Session>>,
}

impl SessionHandle {
    /// Start signed out.
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Subscribe to session transitions.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// The current session, if signed in.
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    /// The signed-in user's id.
    pub fn user_id(&self) -> Option<Uuid> {
        self.state.borrow().as_ref().map(|s| s.user_id)
    }

    /// Bearer token for authenticated requests.
    pub fn bearer_token(&self) -> Option<String> {
        self.state.borrow().as_ref().map(|s| s.id_token.clone())
    }

    /// Install a new session after sign-in or token refresh.
    pub fn sign_in(&self, session: Session) {
        info!(user_id = %session.user_id, "Session established");
        self.state.send_replace(Some(session));
    }

    /// Clear the session.
    pub fn sign_out(&self) {
        if self.state.borrow().is_some() {
            info!("Session cleared");
        }
        self.state.send_replace(None);
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}
