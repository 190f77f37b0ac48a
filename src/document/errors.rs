use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("invalid YAML in {file}: {source}")]
    InvalidYaml {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid field path '{input}': {message}")]
    InvalidPath { input: String, message: String },

    #[error("document in {file} is not a mapping")]
    NotAMapping { file: String },

    #[error("cannot keep comments of {file}: unsupported YAML layout at line {line}")]
    UnalignedComments { file: String, line: usize },
}
