use super::{CampusConfig, ConfigError};

/// Describes one key a [`ConfigProperties`] section reads.
///
/// Used for startup diagnostics. Parsing itself goes through
/// [`ConfigProperties::from_config`].
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    /// Key relative to the section prefix.
    pub key: String,
    pub full_key: String,
    pub type_name: &'static str,
    /// False once a default is given or the key is marked optional.
    pub required: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
}

impl PropertyMeta {
    pub fn new(section: &str, key: &str, type_name: &'static str) -> Self {
        PropertyMeta {
            full_key: format!("{section}.{key}"),
            key: key.to_string(),
            type_name,
            required: true,
            default_value: None,
            description: None,
        }
    }

    pub fn with_default(self, default: impl Into<String>) -> Self {
        PropertyMeta {
            default_value: Some(default.into()),
            ..self.optional()
        }
    }

    pub fn optional(self) -> Self {
        PropertyMeta {
            required: false,
            ..self
        }
    }

    pub fn describe(self, text: impl Into<String>) -> Self {
        PropertyMeta {
            description: Some(text.into()),
            ..self
        }
    }
}

/// A configuration section parsed into a Rust type.
///
/// ```ignore
/// impl ConfigProperties for GuardSettings {
///     fn prefix() -> &'static str { "campus.guard" }
///     fn properties_metadata() -> Vec<PropertyMeta> {
///         vec![PropertyMeta::new(Self::prefix(), "profile_timeout_ms", "u64").with_default("5000")]
///     }
///     fn from_config(config: &CampusConfig) -> Result<Self, ConfigError> {
///         let ms = config.get_or("campus.guard.profile_timeout_ms", 5000u64)?;
///         Ok(GuardSettings { profile_timeout: Duration::from_millis(ms) })
///     }
/// }
/// ```
pub trait ConfigProperties: Sized {
    fn prefix() -> &'static str;

    fn properties_metadata() -> Vec<PropertyMeta>;

    fn from_config(config: &CampusConfig) -> Result<Self, ConfigError>;

    /// Required keys absent from `config`, as full keys.
    fn missing_keys(config: &CampusConfig) -> Vec<String> {
        Self::properties_metadata()
            .into_iter()
            .filter(|meta| meta.required && !config.contains_key(&meta.full_key))
            .map(|meta| meta.full_key)
            .collect()
    }
}
