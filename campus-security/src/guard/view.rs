use crate::decision::Decision;
use crate::identity::Profile;
use crate::routes::PortalRoutes;

use super::machine::{GuardState, Phase};

/// Buttons in the portal header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavControl {
    Back,
    Home { path: String },
    Logout,
}

/// Header wrapped around protected content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortalChrome {
    pub title: String,
    pub role_label: String,
    pub display_name: String,
    pub controls: Vec<NavControl>,
}

impl PortalChrome {
    pub fn for_profile(profile: &Profile, routes: &PortalRoutes) -> Self {
        let mut controls = vec![NavControl::Back];
        if let Some(home) = routes.path_for(&profile.role) {
            controls.push(NavControl::Home {
                path: home.to_string(),
            });
        }
        controls.push(NavControl::Logout);
        Self {
            title: profile.role.portal_title().to_string(),
            role_label: profile.role.label().to_string(),
            display_name: profile.display_name().to_string(),
            controls,
        }
    }
}

/// What the guarded page renders for a given state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardView {
    Loading,
    /// Navigation is in progress; render nothing.
    Redirecting { target: String },
    /// Render the protected content inside the chrome.
    Protected(PortalChrome),
}

impl GuardView {
    /// Pure projection of the state. Rendering never navigates; the guard
    /// issues each redirect once when it resolves.
    pub fn from_state(state: &GuardState, routes: &PortalRoutes) -> Self {
        if state.phase != Phase::Resolved {
            return GuardView::Loading;
        }
        match (&state.decision, &state.profile) {
            (Some(Decision::Authorized), Some(profile)) => {
                GuardView::Protected(PortalChrome::for_profile(profile, routes))
            }
            (Some(Decision::Unauthorized { redirect }), _) => GuardView::Redirecting {
                target: redirect.clone(),
            },
            _ => GuardView::Redirecting {
                target: routes.login_path().to_string(),
            },
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, GuardView::Loading)
    }

    pub fn chrome(&self) -> Option<&PortalChrome> {
        match self {
            GuardView::Protected(chrome) => Some(chrome),
            _ => None,
        }
    }
}
