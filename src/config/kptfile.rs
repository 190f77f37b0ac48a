use crate::config::loader::{read, stringify, ConfigError};
use crate::config::schema::{ValidationError, ValidationIssue};
use crate::engine::graph::{
    Definition, SubstitutionGraph, SubstitutionRef, SETTER_PREFIX, SUBSTITUTION_PREFIX,
};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the package file holding legacy setter definitions.
pub const KPTFILE_NAME: &str = "Kptfile";
const EXTENSION_KEY: &str = "x-k8s-cli";

/// Setter and substitution definitions from a Kptfile's `openAPI` section.
#[derive(Debug, Clone, Default)]
pub struct KptfileDefinitions {
    pub graph: SubstitutionGraph,
    /// Setter name to value, lists written as flow literals (`[a, b]`).
    pub setters: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
struct Kptfile {
    #[serde(default, rename = "openAPI")]
    open_api: OpenApi,
}

#[derive(Debug, Deserialize, Default)]
struct OpenApi {
    #[serde(default)]
    definitions: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetterExtension {
    name: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    enum_values: BTreeMap<String, String>,
    #[serde(default)]
    list_values: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SubstitutionExtension {
    name: String,
    #[serde(default)]
    pattern: String,
    #[serde(default)]
    values: Vec<MarkerRef>,
}

#[derive(Debug, Deserialize)]
struct MarkerRef {
    #[serde(default)]
    marker: String,
    #[serde(default, rename = "ref")]
    reference: String,
}

pub fn load_kptfile_str(input: &str) -> Result<KptfileDefinitions, ConfigError> {
    let kptfile: Kptfile = if input.trim().is_empty() {
        Kptfile::default()
    } else {
        serde_yaml::from_str(input).map_err(|source| ConfigError::Yaml { path: None, source })?
    };

    let mut issues = Vec::new();
    let mut definitions = Vec::new();
    let mut setters = BTreeMap::new();

    for (key, schema) in kptfile.open_api.definitions {
        let extension = schema.get(EXTENSION_KEY);
        if key.starts_with(SETTER_PREFIX) {
            match extension.and_then(|ext| ext.get("setter")).filter(|v| !v.is_null()) {
                Some(setter) => match setter_definition(setter) {
                    Ok((definition, listed)) => {
                        setters.insert(definition.name().to_string(), listed);
                        definitions.push((key, definition));
                    }
                    Err(message) => issues.push(ValidationIssue::InvalidValue { key, message }),
                },
                None => issues.push(ValidationIssue::InvalidValue {
                    message: format!("missing {EXTENSION_KEY}.setter for {key}"),
                    key,
                }),
            }
        } else if key.starts_with(SUBSTITUTION_PREFIX) {
            let Some(substitution) = extension
                .and_then(|ext| ext.get("substitution"))
                .filter(|v| !v.is_null())
            else {
                continue;
            };
            match serde_yaml::from_value::<SubstitutionExtension>(substitution.clone()) {
                Ok(ext) => definitions.push((
                    key,
                    Definition::Substitution {
                        name: ext.name,
                        pattern: ext.pattern,
                        values: ext
                            .values
                            .into_iter()
                            .map(|v| SubstitutionRef {
                                marker: v.marker,
                                reference: v.reference,
                            })
                            .collect(),
                    },
                )),
                Err(e) => issues.push(ValidationIssue::InvalidValue {
                    key,
                    message: e.to_string(),
                }),
            }
        }
    }

    if !issues.is_empty() {
        return Err(ConfigError::Validation {
            path: None,
            source: ValidationError { issues },
        });
    }
    Ok(KptfileDefinitions {
        graph: SubstitutionGraph::new(definitions),
        setters,
    })
}

pub fn load_kptfile(path: impl AsRef<Path>) -> Result<KptfileDefinitions, ConfigError> {
    let path = path.as_ref();
    let contents = read(path)?;
    load_kptfile_str(&contents).map_err(|error| error.with_path(path))
}

/// The setter definition plus the value reported for it.
fn setter_definition(setter: &Value) -> Result<(Definition, String), String> {
    let ext: SetterExtension =
        serde_yaml::from_value(setter.clone()).map_err(|e| e.to_string())?;
    let value = stringify(&ext.value)?;
    let listed = if ext.list_values.is_empty() {
        value.clone()
    } else {
        let items = ext
            .list_values
            .iter()
            .map(stringify)
            .collect::<Result<Vec<_>, _>>()?;
        format!("[{}]", items.join(", "))
    };
    Ok((
        Definition::Setter {
            name: ext.name,
            value,
            enum_values: ext.enum_values,
        },
        listed,
    ))
}
