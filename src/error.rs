use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unauthorized: session token rejected by backend")]
    Unauthorized,
    #[error("application error (code {code}): {message}")]
    Application { code: i64, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("backend update failed, manual restart required: {0}")]
    ManualRestartRequired(Box<AppError>),
}

impl AppError {
    /// No response was obtained (network, HTTP status or decode failure).
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_) | AppError::Unauthorized)
    }

    /// A response was obtained but its envelope code signals failure.
    pub fn is_application(&self) -> bool {
        matches!(self, AppError::Application { .. })
    }

    pub fn application(code: i64, message: impl Into<String>) -> Self {
        AppError::Application {
            code,
            message: message.into(),
        }
    }
}
