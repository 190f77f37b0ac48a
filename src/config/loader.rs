use crate::config::schema::{FunctionConfig, ValidationError, ValidationIssue};
use crate::document::{render_flow, Node};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization format of a function config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Yaml {
        path: Option<PathBuf>,
        source: serde_yaml::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    pub(crate) fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Yaml { path: None, source } => ConfigError::Yaml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read function config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse function config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse function config TOML: {}", source),
            },
            ConfigError::Yaml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse function config YAML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse function config YAML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid function config ({}): {}", path.display(), source),
                None => write!(f, "invalid function config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Yaml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

/// A ConfigMap-like document (`data:`) or an `ApplySetters` document
/// (`setters:` list of name/value pairs). Other fields are ignored.
#[derive(Debug, Deserialize, Default)]
struct ConfigDocument {
    #[serde(default)]
    data: BTreeMap<String, Value>,
    #[serde(default)]
    setters: Vec<SetterEntry>,
}

#[derive(Debug, Deserialize)]
struct SetterEntry {
    name: String,
    #[serde(default)]
    value: Value,
}

/// Text form of a config value: scalars as written, sequences as flow
/// literals so they are recognised as array setters.
pub(crate) fn stringify(value: &Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Sequence(_) => Ok(render_flow(&Node::from_value(value.clone()))),
        Value::Mapping(_) => Err("expected a scalar or a list, found a mapping".to_string()),
        Value::Tagged(tagged) => stringify(&tagged.value),
    }
}

/// Parse a config document into its flat string map.
pub fn load_data_from_str(
    input: &str,
    format: ConfigFormat,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let document: ConfigDocument = match format {
        ConfigFormat::Toml => toml_edit::de::from_str(input)
            .map_err(|source| ConfigError::Toml { path: None, source })?,
        ConfigFormat::Yaml if input.trim().is_empty() => ConfigDocument::default(),
        ConfigFormat::Yaml => serde_yaml::from_str(input)
            .map_err(|source| ConfigError::Yaml { path: None, source })?,
    };

    let mut issues = Vec::new();
    let mut data = BTreeMap::new();
    let pairs = document
        .data
        .into_iter()
        .chain(document.setters.into_iter().map(|s| (s.name, s.value)));
    for (key, value) in pairs {
        match stringify(&value) {
            Ok(text) => {
                data.insert(key, text);
            }
            Err(message) => issues.push(ValidationIssue::InvalidValue { key, message }),
        }
    }

    if issues.is_empty() {
        Ok(data)
    } else {
        Err(ConfigError::Validation {
            path: None,
            source: ValidationError { issues },
        })
    }
}

pub fn load_from_str(input: &str, format: ConfigFormat) -> Result<FunctionConfig, ConfigError> {
    let data = load_data_from_str(input, format)?;
    FunctionConfig::from_data(&data).map_err(|source| ConfigError::Validation { path: None, source })
}

pub fn load_data_from_path(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let path = path.as_ref();
    let contents = read(path)?;
    load_data_from_str(&contents, ConfigFormat::from_path(path))
        .map_err(|error| error.with_path(path))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<FunctionConfig, ConfigError> {
    let path = path.as_ref();
    let contents = read(path)?;
    load_from_str(&contents, ConfigFormat::from_path(path)).map_err(|error| error.with_path(path))
}

pub(crate) fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SearchReplaceConfig;

    #[test]
    fn configmap_data_is_stringified() {
        let data = load_data_from_str(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: setters\ndata:\n  replicas: 3\n  envs: [stage, prod]\n  image: nginx\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(data["replicas"], "3");
        assert_eq!(data["envs"], "[stage, prod]");
        assert_eq!(data["image"], "nginx");
    }

    #[test]
    fn apply_setters_kind_uses_setters_list() {
        let config = load_from_str(
            "apiVersion: fn.kpt.dev/v1alpha1\nkind: ApplySetters\nsetters:\n- name: image\n  value: ubuntu\n- name: envs\n  value: '[a, b]'\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        let FunctionConfig::Setters(setters) = config else {
            panic!("expected setters");
        };
        assert_eq!(setters.scalars["image"], "ubuntu");
        assert_eq!(setters.arrays["envs"].values, vec!["a", "b"]);
    }

    #[test]
    fn toml_data_table() {
        let config = load_from_str(
            "[data]\nby-value = \"3\"\nput-value = 4\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(
            config,
            FunctionConfig::SearchReplace(SearchReplaceConfig {
                by_value: Some("3".to_string()),
                put_value: Some("4".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn mapping_values_are_rejected() {
        let err = load_data_from_str("data:\n  nested:\n    a: b\n", ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn load_from_path_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "data:\n  by-valu: x\n  put-value: y\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("config.yaml"));
        assert!(err.to_string().contains("did you mean"));

        let missing = load_from_path(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
