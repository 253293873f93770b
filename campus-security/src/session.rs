use std::future::Future;

use campus_core::ServiceError;

use crate::identity::Session;
use crate::subscription::Subscription;

/// What triggered a session-change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionChangeKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A notification from the session provider's change stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionChange {
    pub kind: SessionChangeKind,
    /// The session after the change; `None` once signed out.
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: SessionChangeKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: SessionChangeKind::SignedOut,
            session: None,
        }
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: SessionChangeKind::TokenRefreshed,
            session: Some(session),
        }
    }

    pub fn user_updated(session: Session) -> Self {
        Self {
            kind: SessionChangeKind::UserUpdated,
            session: Some(session),
        }
    }
}

/// The hosted auth service, as seen by the portals.
///
/// Injected into guards and redirectors rather than read from a global so
/// tests can substitute an in-memory provider.
pub trait SessionProvider: Send + Sync + 'static {
    /// One-shot lookup of the current session.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, ServiceError>> + Send;

    /// Subscribe to sign-in, sign-out and token-refresh notifications.
    fn on_session_change(&self) -> Subscription<SessionChange>;

    fn sign_out(&self) -> impl Future<Output = Result<(), ServiceError>> + Send;
}
