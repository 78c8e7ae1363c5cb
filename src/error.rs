use std::io;

/// Error type for every step of a pipeline trigger: config load, payload build, submission
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Unknown repository: {0}")]
    UnknownRepo(String),

    #[error("Invalid value '{value}' for variable {variable}; allowed: {allowed:?}")]
    InvalidOption {
        variable: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Variable {variable} is not declared for repository {repo_id}")]
    UnknownVariable { repo_id: String, variable: String },

    #[error("Transport error while calling the pipeline endpoint: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Pipeline endpoint rejected the trigger with status {status}\n{body}")]
    RemoteRejection { status: u16, body: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use TriggerError
pub type Result<T> = std::result::Result<T, TriggerError>;
