use std::future::Future;
use std::sync::Arc;

use campus_core::ServiceError;

use crate::error::SecurityError;
use crate::identity::Profile;
use crate::subscription::Subscription;

/// Live notification that a profile row changed (e.g. its role was edited).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileChange {
    pub identity_id: String,
}

/// Profile table of the hosted database.
pub trait ProfileStore: Send + Sync + 'static {
    /// Look up the profile for an identity. `Ok(None)` when no row exists.
    fn profile_by_identity(
        &self,
        identity_id: &str,
    ) -> impl Future<Output = Result<Option<Profile>, ServiceError>> + Send;

    /// Live changes to one identity's profile.
    ///
    /// Stores without change notification keep the default, an already-ended
    /// subscription.
    fn profile_changes(&self, identity_id: &str) -> Subscription<ProfileChange> {
        let _ = identity_id;
        Subscription::closed()
    }
}

/// Outcome of a profile lookup.
///
/// `NotFound` is a valid answer (the account exists but onboarding has not
/// created a profile yet) and is kept apart from `FetchError`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found(Profile),
    NotFound,
    FetchError(ServiceError),
}

impl Resolution {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Resolution::Found(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn into_profile(self) -> Option<Profile> {
        match self {
            Resolution::Found(profile) => Some(profile),
            _ => None,
        }
    }

    /// The fail-closed cause when no profile was obtained.
    pub fn denial(&self, identity_id: &str) -> Option<SecurityError> {
        match self {
            Resolution::Found(_) => None,
            Resolution::NotFound => Some(SecurityError::ProfileNotFound(identity_id.to_string())),
            Resolution::FetchError(err) => Some(SecurityError::ProfileFetch(err.clone())),
        }
    }
}

/// Fetches the role profile for an identity.
///
/// No caching: every identity change triggers a fresh lookup.
pub struct ProfileResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for ProfileResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ProfileStore> ProfileResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn resolve(&self, identity_id: &str) -> Resolution {
        match self.store.profile_by_identity(identity_id).await {
            Ok(Some(profile)) if profile.id == identity_id => Resolution::Found(profile),
            Ok(Some(profile)) => {
                tracing::error!(
                    identity = %identity_id,
                    returned = %profile.id,
                    "Profile store returned a row for a different identity"
                );
                Resolution::FetchError(ServiceError::Malformed(format!(
                    "profile lookup for {identity_id} returned {}",
                    profile.id
                )))
            }
            Ok(None) => {
                tracing::debug!(identity = %identity_id, "No profile for identity");
                Resolution::NotFound
            }
            Err(err) => {
                tracing::warn!(identity = %identity_id, error = %err, "Profile fetch failed");
                Resolution::FetchError(err)
            }
        }
    }
}
