use serde::{Deserialize, Serialize};

use crate::{domain::value_objects::SuccessCodes, error::AppError};

/// Response body shared by every backend endpoint: `{code, msg, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self, codes: &SuccessCodes) -> bool {
        codes.contains(self.code)
    }

    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("")
    }

    /// Fails with `Application` when `code` is not a success code.
    pub fn into_data(self, codes: &SuccessCodes) -> Result<Option<T>, AppError> {
        self.ensure_success(codes)?;
        Ok(self.data)
    }

    pub fn ensure_success(&self, codes: &SuccessCodes) -> Result<(), AppError> {
        if self.is_success(codes) {
            Ok(())
        } else {
            Err(AppError::application(self.code, self.message()))
        }
    }
}
