use std::time::Duration;

use campus_core::ServiceError;

/// Reasons a guard or redirector failed closed.
///
/// Every variant ends in the same user-facing outcome (a redirect, never
/// access); the variants exist so operators can tell them apart in logs.
#[derive(Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// No session, or the session has expired.
    NoIdentity,

    /// Signed in, but no profile row exists for the identity yet.
    ProfileNotFound(String),

    /// The profile store failed to answer.
    ProfileFetch(ServiceError),

    /// The profile did not arrive within the bounded wait.
    Timeout(Duration),

    /// The profile's role has no portal (unknown role string or unmapped role).
    UnrecognizedRole(String),

    /// The current-session lookup failed.
    SessionUnavailable(ServiceError),

    /// Signing out at the provider failed.
    SignOut(ServiceError),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::NoIdentity => write!(f, "No authenticated identity"),
            SecurityError::ProfileNotFound(id) => write!(f, "No profile for identity {id}"),
            SecurityError::ProfileFetch(err) => write!(f, "Profile fetch failed: {err}"),
            SecurityError::Timeout(after) => {
                write!(f, "Profile not resolved within {}ms", after.as_millis())
            }
            SecurityError::UnrecognizedRole(role) => write!(f, "Unrecognized role: {role}"),
            SecurityError::SessionUnavailable(err) => write!(f, "Session lookup failed: {err}"),
            SecurityError::SignOut(err) => write!(f, "Sign-out failed: {err}"),
        }
    }
}

impl std::fmt::Debug for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for SecurityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SecurityError::ProfileFetch(err)
            | SecurityError::SessionUnavailable(err)
            | SecurityError::SignOut(err) => Some(err),
            _ => None,
        }
    }
}

impl SecurityError {
    /// The only message shown to visitors, whatever the cause.
    pub fn public_message(&self) -> &'static str {
        "Unauthenticated"
    }

    /// Whether this cause points at an infrastructure problem operators
    /// should see (logged at warn rather than debug).
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            SecurityError::ProfileFetch(_)
                | SecurityError::Timeout(_)
                | SecurityError::SessionUnavailable(_)
                | SecurityError::SignOut(_)
        )
    }

    pub(crate) fn log(&self) {
        if self.is_operational() {
            tracing::warn!(cause = %self, "Access failed closed");
        } else {
            tracing::debug!(cause = %self, "Access failed closed");
        }
    }
}
