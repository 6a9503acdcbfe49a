use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure payload handed to `fail` and `complete` callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub err_msg: String,
}

impl ApiError {
    pub fn new(err_msg: impl Into<String>) -> Self {
        Self { err_msg: err_msg.into() }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.err_msg)
    }
}

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("field name already bound to `{bound}`, cannot rebind to `{requested}`")]
    FieldAlreadyBound { bound: String, requested: String },

    #[error("remote rejected request: {0}")]
    Remote(ApiError),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl CloudError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CloudError::InvalidArgument(msg.into())
    }

    /// Converts the error into the payload delivered through the `fail` channel.
    /// Remote rejections pass through unchanged.
    #[must_use]
    pub fn into_api_error(self) -> ApiError {
        match self {
            CloudError::Remote(e) => e,
            other => ApiError::new(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CloudError {
    fn from(e: std::io::Error) -> Self {
        CloudError::Io(e.to_string())
    }
}
