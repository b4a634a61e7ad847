use thiserror::Error;

#[derive(Debug, Error)]
pub enum KostyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account is not a member of an organization: {0}. Run without --organization to scan the current account only")]
    NotInOrganization(String),

    #[error("Scope resolution failed: {0}")]
    Scope(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown operation '{operation}' for service '{service}'")]
    UnknownOperation { service: String, operation: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KostyError {
    /// True for failures that abort a request before any account work starts.
    pub fn is_scope_error(&self) -> bool {
        matches!(self, KostyError::NotInOrganization(_) | KostyError::Scope(_))
    }
}
