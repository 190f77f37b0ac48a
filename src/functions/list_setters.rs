use crate::config::sequence_values;
use crate::document::{inline_value, FieldPath, MapEntry, Node, Resource, STR_TAG};
use crate::engine::directive::{extract, SETTER_MARKER};
use crate::engine::pattern::Pattern;
use crate::engine::{run, Context, Strategy, StrategyKind, SubstError};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

const DEFAULT_TYPE: &str = "str";
const ARRAY_TYPE: &str = "array";

/// One setter found in the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetterSummary {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub count: usize,
}

impl fmt::Display for SetterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}, Value: {}, Type: {}, Count: {}",
            self.name, self.value, self.value_type, self.count
        )
    }
}

/// Setters sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetterListing {
    pub setters: Vec<SetterSummary>,
}

impl fmt::Display for SetterListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for setter in &self.setters {
            writeln!(f, "{setter}")?;
        }
        Ok(())
    }
}

/// Collects the setters referenced by `# kpt-set:` directives.
#[derive(Debug, Clone, Default)]
pub struct ListSetters {
    found: BTreeMap<String, SetterSummary>,
}

impl ListSetters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with declared setters (e.g. from a Kptfile) so unused ones are
    /// listed with a zero count.
    pub fn with_known(known: &BTreeMap<String, String>) -> Self {
        let found = known
            .iter()
            .map(|(name, value)| {
                let summary = match sequence_values(value) {
                    Some(values) => SetterSummary {
                        name: name.clone(),
                        value: format!("[{}]", values.join(", ")),
                        value_type: ARRAY_TYPE.to_string(),
                        count: 0,
                    },
                    None => SetterSummary {
                        name: name.clone(),
                        value: value.clone(),
                        value_type: DEFAULT_TYPE.to_string(),
                        count: 0,
                    },
                };
                (name.clone(), summary)
            })
            .collect();
        Self { found }
    }

    pub fn listing(&self) -> SetterListing {
        SetterListing {
            setters: self.found.values().cloned().collect(),
        }
    }

    fn count(&mut self, name: &str, value: String, value_type: &str) {
        let summary = self
            .found
            .entry(name.to_string())
            .or_insert_with(|| SetterSummary {
                name: name.to_string(),
                value,
                value_type: value_type.to_string(),
                count: 0,
            });
        if summary.value_type == DEFAULT_TYPE && value_type != ARRAY_TYPE {
            summary.value_type = value_type.to_string();
        }
        summary.count += 1;
    }
}

impl Strategy for ListSetters {
    const KIND: StrategyKind = StrategyKind::Detect;

    fn mutating(&self) -> bool {
        false
    }

    fn visit_entry(
        &mut self,
        entry: &mut MapEntry,
        _path: &FieldPath,
        _cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let Some(items) = entry.value.items() else {
            return Ok(());
        };
        let comment = entry.key.comment().or(entry.value.comment());
        let Some(directive) = extract(comment, SETTER_MARKER) else {
            return Ok(());
        };
        let pattern = Pattern::parse(directive);
        let Some(name) = pattern.pure_name() else {
            return Ok(());
        };
        let mut values: Vec<String> = items.iter().map(inline_value).collect();
        values.sort();
        self.count(name, format!("[{}]", values.join(", ")), ARRAY_TYPE);
        Ok(())
    }

    fn visit_scalar(
        &mut self,
        node: &mut Node,
        _path: &FieldPath,
        _cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let Some(directive) = extract(node.comment(), SETTER_MARKER) else {
            return Ok(());
        };
        let value = node.scalar_value().unwrap_or_default();
        let Some(derived) = Pattern::parse(directive).derive(value) else {
            return Ok(());
        };
        let value_type = scalar_type(node);
        for (name, value) in derived {
            if !value.is_empty() {
                self.count(&name, value, value_type);
            }
        }
        Ok(())
    }
}

/// Type name of a scalar: its tag without `!!`, else inferred from the text.
fn scalar_type(node: &Node) -> &'static str {
    let Some(scalar) = node.as_scalar() else {
        return DEFAULT_TYPE;
    };
    match scalar.tag.as_deref() {
        Some(STR_TAG) => return DEFAULT_TYPE,
        Some("!!int") => return "int",
        Some("!!float") => return "float",
        Some("!!bool") => return "bool",
        _ => {}
    }
    match serde_yaml::from_str::<Value>(&scalar.value) {
        Ok(Value::Number(n)) if n.is_f64() => "float",
        Ok(Value::Number(_)) => "int",
        Ok(Value::Bool(_)) => "bool",
        _ => DEFAULT_TYPE,
    }
}

pub fn list_setters(
    resources: &mut [Resource],
    known: &BTreeMap<String, String>,
) -> Result<SetterListing, SubstError> {
    let mut strategy = ListSetters::with_known(known);
    run(resources, &mut strategy)?;
    Ok(strategy.listing())
}
