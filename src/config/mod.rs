pub mod kptfile;
pub mod loader;
pub mod schema;

pub use kptfile::{load_kptfile, load_kptfile_str, KptfileDefinitions, KPTFILE_NAME};
pub use loader::{
    load_data_from_path, load_data_from_str, load_from_path, load_from_str, ConfigError,
    ConfigFormat,
};
pub use schema::{
    sequence_values, ArraySetter, FunctionConfig, SearchReplaceConfig, SetterConfig,
    ValidationError, ValidationIssue, RESERVED_KEYS,
};
