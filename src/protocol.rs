//! Public protocol structs: the uniform response envelope and the request
//! DTOs that do not already live in `domain`.

use serde::{Deserialize, Serialize};

use crate::domain::{Template, TestPaper};
use crate::error::AppError;
use crate::messages::MSG_NO_RECORD;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    NoRecord,
    Error,
}

/// Envelope returned by every entry point. It only shapes an outcome;
/// the caller decides which outcome it is.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppResponse<T> {
    pub success: bool,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl<T> AppResponse<T> {
    pub fn success(body: T) -> Self {
        Self { success: true, status: ResponseStatus::Ok, body: Some(body), msg: None }
    }

    /// Nothing matched: success-shaped, without a body.
    pub fn no_record() -> Self {
        Self {
            success: true,
            status: ResponseStatus::NoRecord,
            body: None,
            msg: Some(MSG_NO_RECORD.to_string()),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self { success: false, status: ResponseStatus::Error, body: None, msg: Some(msg.into()) }
    }

    pub fn from_error(e: &AppError) -> Self {
        match e {
            AppError::NoRecord => Self::no_record(),
            other => Self::error(other.user_message()),
        }
    }

    pub fn from_result(result: Result<T, AppError>) -> Self {
        match result {
            Ok(body) => Self::success(body),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// Body of the save entry point. Either record may be absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTestIn {
    #[serde(default)]
    pub template: Option<Template>,
    #[serde(default)]
    pub test_paper: Option<TestPaper>,
    #[serde(default)]
    pub save_as_draft: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
