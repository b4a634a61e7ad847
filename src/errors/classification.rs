use super::types::KostyError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl KostyError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Transient provider-side failures
            KostyError::Throttled(_) => ErrorClassification {
                error_type: "ThrottlingError",
                retryable: true,
            },
            KostyError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            KostyError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },

            // User-correctable preconditions
            KostyError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            KostyError::NotInOrganization(_) => ErrorClassification {
                error_type: "NotInOrganizationError",
                retryable: false,
            },
            KostyError::UnknownService(_) => ErrorClassification {
                error_type: "UnknownServiceError",
                retryable: false,
            },
            KostyError::UnknownOperation { .. } => ErrorClassification {
                error_type: "UnknownOperationError",
                retryable: false,
            },

            // Permission and trust failures do not heal on retry
            KostyError::Auth(_) => ErrorClassification {
                error_type: "AuthError",
                retryable: false,
            },
            KostyError::Scope(_) => ErrorClassification {
                error_type: "ScopeError",
                retryable: false,
            },
            KostyError::Operation(_) => ErrorClassification {
                error_type: "OperationError",
                retryable: false,
            },
            KostyError::Cancelled(_) => ErrorClassification {
                error_type: "CancelledError",
                retryable: false,
            },
            KostyError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            KostyError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
            KostyError::Csv(_) => ErrorClassification {
                error_type: "CsvError",
                retryable: false,
            },
            KostyError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }
}
