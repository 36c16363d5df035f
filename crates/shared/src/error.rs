use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidFormat,
    StoreFailure,
    Unauthorized,
    InvalidToken,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct FaqError {
    pub code: ErrorCode,
    pub message: String,
}

impl FaqError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(id: NodeId) -> Self {
        Self::new(ErrorCode::NotFound, format!("question {id} not found"))
    }

    pub fn invalid_format() -> Self {
        Self::new(ErrorCode::InvalidFormat, "expected `question|answer`")
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "privileged action")
    }

    pub fn store_failure(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::StoreFailure, format!("{err:#}"))
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}
