use crate::error::SecurityError;
use crate::identity::Profile;
use crate::role::AllowedRoles;
use crate::routes::PortalRoutes;

/// Render/redirect outcome for a protected page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// No usable profile: send the visitor to the login page.
    Unauthenticated,
    Authorized,
    /// Signed in with a role this page does not admit; send them elsewhere.
    Unauthorized { redirect: String },
}

impl Decision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Decision::Authorized)
    }

    /// Where this decision navigates to, if anywhere.
    pub fn redirect_target<'a>(&'a self, routes: &'a PortalRoutes) -> Option<&'a str> {
        match self {
            Decision::Authorized => None,
            Decision::Unauthenticated => Some(routes.login_path()),
            Decision::Unauthorized { redirect } => Some(redirect),
        }
    }
}

/// Pure role check against a page's allowed set.
///
/// Holds the deployment's [`PortalRoutes`] so unauthorized roles can be sent
/// to their own portal.
#[derive(Clone, Debug, Default)]
pub struct Authorizer {
    routes: PortalRoutes,
}

impl Authorizer {
    pub fn new(routes: PortalRoutes) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &PortalRoutes {
        &self.routes
    }

    pub fn decide(&self, profile: Option<&Profile>, allowed: &AllowedRoles) -> Decision {
        decide(profile, allowed, &self.routes)
    }

    /// The fail-closed cause behind a non-authorized decision, if any.
    pub(crate) fn denial_for(&self, profile: &Profile, decision: &Decision) -> Option<SecurityError> {
        match decision {
            // Roles without a portal are bounced to login like unknown ones.
            Decision::Unauthorized { .. } if self.routes.path_for(&profile.role).is_none() => {
                Some(SecurityError::UnrecognizedRole(profile.role.to_string()))
            }
            _ => None,
        }
    }
}

/// Decide what a visitor with `profile` sees on a page admitting `allowed`.
///
/// - no profile: [`Decision::Unauthenticated`]
/// - role in `allowed`: [`Decision::Authorized`]
/// - otherwise: [`Decision::Unauthorized`] to the role's portal, or to the
///   login page when the role has none.
pub fn decide(profile: Option<&Profile>, allowed: &AllowedRoles, routes: &PortalRoutes) -> Decision {
    let Some(profile) = profile else {
        return Decision::Unauthenticated;
    };
    if allowed.contains(&profile.role) {
        return Decision::Authorized;
    }
    let redirect = routes
        .path_for(&profile.role)
        .unwrap_or_else(|| routes.login_path());
    Decision::Unauthorized {
        redirect: redirect.to_string(),
    }
}
