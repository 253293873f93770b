use std::time::Duration;

use campus_core::config::{CampusConfig, ConfigError, ConfigProperties, PropertyMeta};

use crate::role::Role;
use crate::routes::{PortalRoutes, DEFAULT_LOGIN_PATH};

/// Default bounded wait for a profile before the guard fails closed.
pub const DEFAULT_PROFILE_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_millis(DEFAULT_PROFILE_TIMEOUT_MS);

/// Guard behavior settings (`campus.guard.*`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardSettings {
    /// Maximum time spent loading before the guard resolves with whatever it has.
    pub profile_timeout: Duration,
}

impl GuardSettings {
    pub fn new() -> Self {
        Self {
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
        }
    }

    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout = timeout;
        self
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProperties for GuardSettings {
    fn prefix() -> &'static str {
        "campus.guard"
    }

    fn properties_metadata() -> Vec<PropertyMeta> {
        vec![PropertyMeta::new(Self::prefix(), "profile_timeout_ms", "u64")
            .with_default(DEFAULT_PROFILE_TIMEOUT_MS.to_string())
            .describe("Bounded wait for session and profile resolution, in milliseconds")]
    }

    fn from_config(config: &CampusConfig) -> Result<Self, ConfigError> {
        let key = "campus.guard.profile_timeout_ms";
        let millis: u64 = config.get_or(key, DEFAULT_PROFILE_TIMEOUT_MS)?;
        if millis == 0 {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(Self {
            profile_timeout: Duration::from_millis(millis),
        })
    }
}

/// `campus.portal.*`: one role → path table per deployment.
///
/// ```yaml
/// campus:
///   portal:
///     prefix: /portals      # "" (default) gives /admin, /staff, ...
///     login_path: /login
///     routes:
///       super_admin: /portals/admin
/// ```
impl ConfigProperties for PortalRoutes {
    fn prefix() -> &'static str {
        "campus.portal"
    }

    fn properties_metadata() -> Vec<PropertyMeta> {
        vec![
            PropertyMeta::new(Self::prefix(), "prefix", "String")
                .with_default("")
                .describe("Path prefix for every portal"),
            PropertyMeta::new(Self::prefix(), "login_path", "String")
                .with_default(DEFAULT_LOGIN_PATH),
            PropertyMeta::new(Self::prefix(), "routes", "Map<role, String>")
                .optional()
                .describe("Per-role path overrides"),
        ]
    }

    fn from_config(config: &CampusConfig) -> Result<Self, ConfigError> {
        let prefix: String = config.get_or("campus.portal.prefix", String::new())?;
        if !prefix.is_empty() {
            require_absolute("campus.portal.prefix", &prefix)?;
        }
        let login_path: String =
            config.get_or("campus.portal.login_path", DEFAULT_LOGIN_PATH.to_string())?;
        require_absolute("campus.portal.login_path", &login_path)?;

        let mut routes = PortalRoutes::with_prefix(&prefix).with_login_path(login_path);
        for role_name in config.child_keys("campus.portal.routes") {
            let key = format!("campus.portal.routes.{role_name}");
            let path: String = config.get(&key)?;
            require_absolute(&key, &path)?;
            let role = Role::from(role_name.as_str());
            if !role.is_recognized() {
                tracing::warn!(role = %role_name, "Portal route configured for an unknown role");
            }
            routes = routes.with_route(role, path);
        }
        Ok(routes)
    }
}

fn require_absolute(key: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{path}' must start with '/'"),
        })
    }
}
