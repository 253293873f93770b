use std::collections::BTreeMap;
use std::path::Path;

use super::value::{key_segment, ConfigValue};
use super::{ConfigError, ENV_PREFIX};

pub(crate) type Values = BTreeMap<String, ConfigValue>;

pub(crate) fn parse_yaml(content: &str) -> Result<serde_yaml::Value, ConfigError> {
    serde_yaml::from_str(content).map_err(|err| ConfigError::Load(err.to_string()))
}

/// Merge the YAML file at `path` into `values`. Absent files contribute nothing.
pub(crate) fn merge_yaml_file(path: &Path, values: &mut Values) -> Result<(), ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(ConfigError::Load(format!("{}: {err}", path.display()))),
    };
    let root = parse_yaml(&content)
        .map_err(|err| ConfigError::Load(format!("{}: {err}", path.display())))?;
    merge_tree(&root, values);
    Ok(())
}

/// Flatten a YAML document into dot keys, later writes winning.
///
/// Sequences are leaves: `a: [x, y]` is stored as one list under `a`.
pub(crate) fn merge_tree(root: &serde_yaml::Value, values: &mut Values) {
    let mut pending = vec![(String::new(), root)];
    while let Some((path, node)) = pending.pop() {
        match node {
            serde_yaml::Value::Mapping(entries) => {
                for (key, child) in entries {
                    let segment = key_segment(key);
                    let child_path = if path.is_empty() {
                        segment
                    } else {
                        format!("{path}.{segment}")
                    };
                    pending.push((child_path, child));
                }
            }
            leaf if !path.is_empty() => {
                values.insert(path, ConfigValue::from(leaf));
            }
            _ => {}
        }
    }
}

/// Load `.env`-style files into the process environment without
/// overriding variables that are already set.
pub(crate) fn load_env_file(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => tracing::debug!(file = %path.display(), "Loaded env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(file = %path.display(), error = %err, "Ignoring unreadable env file"),
    }
}

/// `CAMPUS__*` variables as config entries.
pub(crate) fn env_overrides(
    vars: impl IntoIterator<Item = (String, String)>,
) -> impl Iterator<Item = (String, ConfigValue)> {
    vars.into_iter()
        .filter_map(|(name, value)| Some((config_key_for_env(&name)?, ConfigValue::Text(value))))
}

/// `CAMPUS__GUARD__PROFILE_TIMEOUT_MS` -> `campus.guard.profile_timeout_ms`.
///
/// Segments are split on double underscores so single ones stay inside names.
fn config_key_for_env(name: &str) -> Option<String> {
    let path = name.strip_prefix(ENV_PREFIX)?;
    if path.is_empty() {
        return None;
    }
    let segments: Vec<String> = path.split("__").map(str::to_ascii_lowercase).collect();
    Some(format!("campus.{}", segments.join(".")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_names_map_to_dot_keys() {
        assert_eq!(
            config_key_for_env("CAMPUS__GUARD__PROFILE_TIMEOUT_MS").as_deref(),
            Some("campus.guard.profile_timeout_ms")
        );
        assert_eq!(
            config_key_for_env("CAMPUS__PORTAL__ROUTES__SUPER_ADMIN").as_deref(),
            Some("campus.portal.routes.super_admin")
        );
    }

    #[test]
    fn unrelated_env_names_are_skipped() {
        for name in ["PATH", "CAMPUS_PROFILE", "CAMPUS__"] {
            assert!(config_key_for_env(name).is_none(), "{name}");
        }
    }

    #[test]
    fn env_overrides_are_text() {
        let vars = vec![
            ("HOME".to_string(), "/root".to_string()),
            ("CAMPUS__PORTAL__PREFIX".to_string(), "/portals".to_string()),
        ];
        let overrides: Vec<_> = env_overrides(vars).collect();
        assert_eq!(
            overrides,
            vec![(
                "campus.portal.prefix".to_string(),
                ConfigValue::Text("/portals".into())
            )]
        );
    }

    #[test]
    fn sequences_stay_whole() {
        let root = parse_yaml("pages:\n  reports: [admin, staff]\n").unwrap();
        let mut values = Values::new();
        merge_tree(&root, &mut values);
        assert_eq!(
            values.get("pages.reports"),
            Some(&ConfigValue::List(vec![
                ConfigValue::Text("admin".into()),
                ConfigValue::Text("staff".into()),
            ]))
        );
    }
}
