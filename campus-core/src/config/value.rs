use super::ConfigError;

/// A leaf of the flattened configuration tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Plain text. Every environment override arrives in this form.
    Text(String),
    List(Vec<ConfigValue>),
}

impl From<&serde_yaml::Value> for ConfigValue {
    fn from(value: &serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(flag) => ConfigValue::Bool(*flag),
            Value::Number(number) => match (number.as_i64(), number.as_f64()) {
                (Some(int), _) => ConfigValue::Int(int),
                (None, Some(float)) => ConfigValue::Float(float),
                (None, None) => ConfigValue::Text(number.to_string()),
            },
            Value::String(text) => ConfigValue::Text(text.clone()),
            Value::Sequence(items) => ConfigValue::List(items.iter().map(ConfigValue::from).collect()),
            // Mappings nested in sequences and tagged nodes keep their YAML text.
            other => ConfigValue::Text(
                serde_yaml::to_string(other)
                    .map(|text| text.trim_end().to_string())
                    .unwrap_or_default(),
            ),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(text: &str) -> Self {
        ConfigValue::Text(text.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(int: i64) -> Self {
        ConfigValue::Int(int)
    }
}

impl From<bool> for ConfigValue {
    fn from(flag: bool) -> Self {
        ConfigValue::Bool(flag)
    }
}

/// Render a YAML mapping key as a dot-key segment.
pub(crate) fn key_segment(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(text) => text.clone(),
        serde_yaml::Value::Number(number) => number.to_string(),
        serde_yaml::Value::Bool(flag) => flag.to_string(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn mismatch<T>(key: &str, expected: &'static str) -> Result<T, ConfigError> {
    Err(ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    })
}

/// Conversion from a stored [`ConfigValue`] into the type a caller asked for.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be read from campus configuration",
    note = "supported: String, bool, f64, signed/unsigned integers, Option<T>, Vec<T>"
)]
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        Ok(match value {
            ConfigValue::Text(text) => text.clone(),
            ConfigValue::Int(int) => int.to_string(),
            ConfigValue::Float(float) => float.to_string(),
            ConfigValue::Bool(flag) => flag.to_string(),
            ConfigValue::Null | ConfigValue::List(_) => return mismatch(key, "String"),
        })
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Int(int) => Ok(*int),
            ConfigValue::Text(text) => text.trim().parse().or_else(|_| mismatch(key, "i64")),
            _ => mismatch(key, "i64"),
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Float(float) => Ok(*float),
            ConfigValue::Int(int) => Ok(*int as f64),
            ConfigValue::Text(text) => text.trim().parse().or_else(|_| mismatch(key, "f64")),
            _ => mismatch(key, "f64"),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let text = match value {
            ConfigValue::Bool(flag) => return Ok(*flag),
            ConfigValue::Text(text) => text.trim().to_ascii_lowercase(),
            _ => return mismatch(key, "bool"),
        };
        match text.as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => mismatch(key, "bool"),
        }
    }
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        if *value == ConfigValue::Null {
            return Ok(None);
        }
        T::from_config_value(value, key).map(Some)
    }
}

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| T::from_config_value(item, &format!("{key}[{index}]")))
                .collect(),
            // `CAMPUS__PAGES__REPORTS__ALLOWED_ROLES=admin,staff`
            ConfigValue::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| T::from_config_value(&ConfigValue::from(part), key))
                .collect(),
            ConfigValue::Null => Ok(Vec::new()),
            single => Ok(vec![T::from_config_value(single, key)?]),
        }
    }
}

macro_rules! narrowed_integers {
    ($($target:ty),+ $(,)?) => {
        $(
            impl FromConfigValue for $target {
                fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
                    let wide = i64::from_config_value(value, key)
                        .or_else(|_| mismatch(key, stringify!($target)))?;
                    <$target>::try_from(wide).or_else(|_| mismatch(key, stringify!($target)))
                }
            }
        )+
    };
}

narrowed_integers!(i32, u16, u32, u64, usize);
