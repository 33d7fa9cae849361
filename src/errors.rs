use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION_FAILED: {0}")]
    Validation(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("STORE_FAILURE: {0}")]
    Store(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Store(_) => "STORE_FAILURE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Reason without the code prefix, for client-facing messages.
    pub fn reason(&self) -> &str {
        match self {
            Self::Validation(reason) | Self::NotFound(reason) | Self::Store(reason) | Self::Internal(reason) => {
                reason
            }
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Internal(format!("{what} mutex poisoned"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Store(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Store(value.to_string())
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Validation(format!("photo data is not valid base64: {value}"))
    }
}

pub type AppResult<T> = Result<T, AppError>;
