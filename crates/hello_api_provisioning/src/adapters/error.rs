use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Error codes the services use for "this resource does not exist".
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "ResourceNotFound",
    "NotFoundException",
    "NoSuchEntity",
    "UserNotFoundException",
];

const INVALID_PARAMETER_CODE: &str = "InvalidParameterValueException";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("resource not found ({code}): {message}")]
    NotFound { code: String, message: String },
    #[error("{message}")]
    Other {
        code: Option<String>,
        message: String,
    },
}

impl ProviderError {
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Some(code) if NOT_FOUND_CODES.contains(&code) => Self::NotFound {
                code: code.to_string(),
                message,
            },
            _ => Self::Other {
                code: code.map(str::to_string),
                message,
            },
        }
    }

    pub fn missing_output(operation: &str, field: &str) -> Self {
        Self::Other {
            code: None,
            message: format!("{operation} response did not include {field}"),
        }
    }

    /// A request that could not be assembled before sending.
    pub fn invalid_request(error: impl std::fmt::Display) -> Self {
        Self::Other {
            code: None,
            message: format!("invalid request: {error}"),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::NotFound { code, .. } => Some(code),
            Self::Other { code, .. } => code.as_deref(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Lambda rejects a freshly created role until IAM has propagated its
    /// trust policy.
    pub fn is_role_propagation(&self) -> bool {
        match self {
            Self::Other {
                code: Some(code),
                message,
            } => code == INVALID_PARAMETER_CODE && message.contains("cannot be assumed"),
            _ => false,
        }
    }
}

/// Classifies an SDK failure by its service error code.
pub(crate) fn classify<E, R>(error: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = error
        .as_service_error()
        .and_then(|service_error| service_error.code())
        .map(str::to_string);
    let message = error
        .as_service_error()
        .and_then(|service_error| service_error.message())
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&error).to_string());
    ProviderError::from_code(code.as_deref(), message)
}
