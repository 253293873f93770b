use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Authenticated principal issued by the hosted auth service.
///
/// Owned by the session provider; the guard only clones what it needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A live session for an [`Identity`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    /// When the access token stops being valid, if the provider reports it.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Drop sessions that are already expired; they grant nothing.
pub(crate) fn live_identity(session: Option<Session>) -> Option<Identity> {
    match session {
        Some(session) if session.is_expired() => {
            tracing::debug!(identity = %session.identity.id, "Ignoring expired session");
            None
        }
        Some(session) => Some(session.identity),
        None => None,
    }
}

/// Application-level record mapping an identity to a role and display data.
///
/// At most one profile exists per identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
}

impl Profile {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: None,
            full_name: None,
            role,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Name shown in the portal header: full name, else email, else "User".
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}
