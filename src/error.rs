//! Error taxonomy: storage-boundary classification (`StoreError`) and the
//! service-level kinds (`AppError`) that every entry point turns into an envelope.

use thiserror::Error;

use crate::messages::*;

/// Classified failure returned by a repository backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
  #[error("duplicate key")]
  DuplicateKey,

  #[error("record not found")]
  NotFound,

  #[error("store unavailable: {0}")]
  Unavailable(String),

  #[error("store call timed out")]
  Timeout,
}

impl StoreError {
  /// Specific text for kinds the caller can act on; `None` means "use the generic message".
  pub fn user_message(&self) -> Option<&'static str> {
    match self {
      StoreError::DuplicateKey => Some(MSG_DUPLICATE_RECORD),
      StoreError::NotFound => Some(MSG_NO_RECORD),
      StoreError::Unavailable(_) | StoreError::Timeout => None,
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("invalid identifier")]
  InvalidId,

  #[error("no store handle for group")]
  Unauthorized,

  #[error("no matching records")]
  NoRecord,

  #[error("data access failed: {0}")]
  DataAccess(#[from] StoreError),

  #[error("section '{section}' needs {requested} questions but only {available} are available")]
  DataShortage {
    section: String,
    requested: usize,
    available: usize,
  },

  #[error("internal fault: {0}")]
  InternalFault(String),

  #[error("criteria could not be hashed")]
  CorruptData,
}

impl AppError {
  pub fn user_message(&self) -> String {
    match self {
      AppError::InvalidRequest(reason) => format!("{}: {}", MSG_BAD_INPUT, reason),
      AppError::InvalidId => MSG_INVALID_ID.to_string(),
      AppError::Unauthorized => MSG_UNAUTHORIZED_ACCESS.to_string(),
      AppError::NoRecord => MSG_NO_RECORD.to_string(),
      AppError::DataAccess(e) => e.user_message().unwrap_or(MSG_REQUEST_FAILED).to_string(),
      AppError::DataShortage { .. } => format!("Not enough questions: {}", self),
      AppError::InternalFault(_) => MSG_REQUEST_FAILED.to_string(),
      AppError::CorruptData => MSG_CORRUPT_DATA.to_string(),
    }
  }
}
