use thiserror::Error;

/// Failure talking to, or decoding data from, an external documentation provider.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request to `{url}` failed: {message}")]
    Request { url: String, message: String },
    #[error("`{url}` answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decompress provider payload: {0}")]
    Decompress(String),
    #[error("could not parse provider payload: {0}")]
    Parse(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("missing required option `{0}`")]
    MissingOption(String),
    #[error("invalid interaction input: {0}")]
    InvalidInput(String),
    #[error("handler failure: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("denied: {message}")]
    Denied { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to show to the invoking user. Internal detail never leaks.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { message, .. } | Self::Denied { message, .. } => message.clone(),
            Self::Internal { .. } => "An error has occurred".to_owned(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::Denied { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl HandlerError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::Internal {
            message: self.to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}
