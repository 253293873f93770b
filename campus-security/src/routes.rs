use std::collections::BTreeMap;

use crate::role::Role;

pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Prefix of the alternate `/portals/<role>` layout.
pub const PORTALS_PREFIX: &str = "/portals";

/// Static role → portal path table.
///
/// One table is chosen per deployment and used uniformly by the guard and the
/// dashboard redirector. Roles absent from the table have no portal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortalRoutes {
    login_path: String,
    paths: BTreeMap<Role, String>,
}

impl PortalRoutes {
    /// Standard table rooted at `prefix`: `{prefix}/admin`, `{prefix}/staff`,
    /// `{prefix}/parent`, `{prefix}/student`.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let paths = [
            (Role::Admin, "admin"),
            (Role::Staff, "staff"),
            (Role::Parent, "parent"),
            (Role::Student, "student"),
        ]
        .into_iter()
        .map(|(role, segment)| (role, format!("{prefix}/{segment}")))
        .collect();
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            paths,
        }
    }

    /// `/portals/<role>` layout.
    pub fn portals() -> Self {
        Self::with_prefix(PORTALS_PREFIX)
    }

    /// A table with no portal paths at all.
    pub fn empty() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            paths: BTreeMap::new(),
        }
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Add or replace the path for one role.
    pub fn with_route(mut self, role: Role, path: impl Into<String>) -> Self {
        self.paths.insert(role, path.into());
        self
    }

    pub fn path_for(&self, role: &Role) -> Option<&str> {
        self.paths.get(role).map(String::as_str)
    }

    /// Fallback for unauthenticated visitors and roles without a portal.
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Role, &str)> {
        self.paths.iter().map(|(role, path)| (role, path.as_str()))
    }
}

impl Default for PortalRoutes {
    fn default() -> Self {
        Self::with_prefix("")
    }
}
