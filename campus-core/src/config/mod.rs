mod loader;
pub mod typed;
pub mod value;

use std::fmt;
use std::ops::Deref;
use std::path::Path;

use loader::Values;

pub use typed::{ConfigProperties, PropertyMeta};
pub use value::{ConfigValue, FromConfigValue};

/// Variables named `CAMPUS__A__B` override the key `campus.a.b`.
pub const ENV_PREFIX: &str = "CAMPUS__";

/// Selects the active profile, taking precedence over the caller's choice.
pub const PROFILE_ENV: &str = "CAMPUS_PROFILE";

#[derive(Debug)]
pub enum ConfigError {
    NotFound(String),
    TypeMismatch { key: String, expected: &'static str },
    /// Reading or parsing a source failed.
    Load(String),
    /// Present and well-typed, but rejected by the section that reads it.
    Invalid { key: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "missing config key `{key}`"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "config key `{key}` is not a valid {expected}")
            }
            ConfigError::Load(reason) => write!(f, "failed to load configuration: {reason}"),
            ConfigError::Invalid { key, message } => {
                write!(f, "config key `{key}` is invalid: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Flattened portal configuration.
///
/// Sources, each overriding the previous one:
///
/// | source                       | example                                     |
/// |------------------------------|---------------------------------------------|
/// | `application.yaml`           | `campus: { guard: { profile_timeout_ms: 5000 } }` |
/// | `application-{profile}.yaml` | same shape, per deployment                  |
/// | process environment          | `CAMPUS__GUARD__PROFILE_TIMEOUT_MS=1200`    |
///
/// `.env` and `.env.{profile}` are read into the environment first and
/// never replace a variable that is already set.
///
/// The type parameter carries one parsed section, reachable through
/// `Deref` once [`with_typed`](CampusConfig::with_typed) has run.
#[derive(Debug, Clone)]
pub struct CampusConfig<T = ()> {
    values: Values,
    profile: String,
    typed: T,
}

impl CampusConfig {
    fn untyped(values: Values, profile: impl Into<String>) -> Self {
        CampusConfig {
            values,
            profile: profile.into(),
            typed: (),
        }
    }

    /// [`load_from_dir`](Self::load_from_dir) on the working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile)
    }

    pub fn load_from_dir(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let profile = std::env::var(PROFILE_ENV).unwrap_or_else(|_| profile.to_string());

        let mut values = Values::new();
        loader::merge_yaml_file(&dir.join("application.yaml"), &mut values)?;
        loader::merge_yaml_file(&dir.join(format!("application-{profile}.yaml")), &mut values)?;

        loader::load_env_file(&dir.join(".env"));
        loader::load_env_file(&dir.join(format!(".env.{profile}")));
        values.extend(loader::env_overrides(std::env::vars()));

        tracing::debug!(%profile, keys = values.len(), "Configuration loaded");
        Ok(Self::untyped(values, profile))
    }

    /// Parse a single YAML document, ignoring files and the environment.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = Values::new();
        loader::merge_tree(&loader::parse_yaml(yaml)?, &mut values);
        Ok(Self::untyped(values, profile))
    }

    /// No keys, profile `test`.
    pub fn empty() -> Self {
        Self::untyped(Values::new(), "test")
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Parse section `C` and keep it alongside the raw values.
    ///
    /// ```ignore
    /// let guard = CampusConfig::load("dev")?.with_typed::<GuardSettings>()?;
    /// let timeout = guard.profile_timeout;
    /// ```
    pub fn with_typed<C: ConfigProperties>(self) -> Result<CampusConfig<C>, ConfigError> {
        let typed = C::from_config(&self)?;
        Ok(CampusConfig {
            values: self.values,
            profile: self.profile,
            typed,
        })
    }
}

impl<T> CampusConfig<T> {
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        match self.values.get(key) {
            Some(value) => V::from_config_value(value, key),
            None => Err(ConfigError::NotFound(key.to_string())),
        }
    }

    /// Like [`get`](Self::get) but a missing key yields `default`.
    /// A present value of the wrong type is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        if self.values.contains_key(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Names of the leaves directly under `prefix`, sorted.
    ///
    /// With `campus.portal.routes.admin` present, `child_keys("campus.portal.routes")`
    /// includes `admin`.
    pub fn child_keys(&self, prefix: &str) -> Vec<String> {
        let start = format!("{prefix}.");
        self.values
            .range(start.clone()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(&start))
            .map(|key| &key[start.len()..])
            .filter(|rest| !rest.contains('.'))
            .map(str::to_string)
            .collect()
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn typed(&self) -> &T {
        &self.typed
    }

    /// A copy of the raw values without the parsed section.
    pub fn raw(&self) -> CampusConfig {
        CampusConfig::untyped(self.values.clone(), self.profile.clone())
    }
}

impl<T> Deref for CampusConfig<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.typed
    }
}
