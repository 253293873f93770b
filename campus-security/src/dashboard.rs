use std::sync::Arc;

use crate::config::GuardSettings;
use crate::error::SecurityError;
use crate::identity::live_identity;
use crate::navigator::Navigator;
use crate::profile::{ProfileResolver, ProfileStore};
use crate::role::Role;
use crate::routes::PortalRoutes;
use crate::session::SessionProvider;

/// The `/dashboard` landing page: sends each visitor to their own portal.
///
/// Uses the same [`PortalRoutes`] as the guards so both agree on where a
/// role lives. Anything short of a mapped role lands on the login page.
pub struct Dashboard<P, S> {
    provider: Arc<P>,
    resolver: ProfileResolver<S>,
    routes: PortalRoutes,
    settings: GuardSettings,
}

impl<P: SessionProvider, S: ProfileStore> Dashboard<P, S> {
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        Self {
            provider,
            resolver: ProfileResolver::new(store),
            routes: PortalRoutes::default(),
            settings: GuardSettings::default(),
        }
    }

    pub fn with_routes(mut self, routes: PortalRoutes) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_settings(mut self, settings: GuardSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Role of the signed-in visitor, bounded by the profile timeout.
    pub async fn resolve_role(&self) -> Result<Role, SecurityError> {
        let lookup = async {
            let session = self
                .provider
                .current_session()
                .await
                .map_err(SecurityError::SessionUnavailable)?;
            let identity = live_identity(session).ok_or(SecurityError::NoIdentity)?;
            let resolution = self.resolver.resolve(&identity.id).await;
            if let Some(denial) = resolution.denial(&identity.id) {
                return Err(denial);
            }
            resolution
                .into_profile()
                .map(|profile| profile.role)
                .ok_or(SecurityError::ProfileNotFound(identity.id))
        };
        match tokio::time::timeout(self.settings.profile_timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(SecurityError::Timeout(self.settings.profile_timeout)),
        }
    }

    /// Path the visitor should land on.
    pub async fn target(&self) -> String {
        match self.resolve_role().await {
            Ok(role) => match self.routes.path_for(&role) {
                Some(path) => path.to_string(),
                None => {
                    SecurityError::UnrecognizedRole(role.to_string()).log();
                    self.routes.login_path().to_string()
                }
            },
            Err(denial) => {
                denial.log();
                self.routes.login_path().to_string()
            }
        }
    }

    /// Navigate once to [`Dashboard::target`] and return it.
    pub async fn redirect<N: Navigator>(&self, navigator: &N) -> String {
        let target = self.target().await;
        tracing::debug!(%target, "Dashboard redirect");
        navigator.navigate(&target);
        target
    }
}
