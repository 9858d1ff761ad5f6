use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One field-level schema rejection, surfaced inline on the originating form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid form data")]
    Validation(Vec<ValidationIssue>),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("The item \"{name}\" already exists")]
    Duplicate { name: String },

    #[error("Cannot delete this {label}: it is referenced by {count} trade(s)")]
    ReferencedByTrades { label: &'static str, count: i64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Invalid data: {0}")]
    Parse(String),
}

impl AppError {
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        AppError::Validation(issues)
    }

    /// Structured issues attached to this error, if any.
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            AppError::Validation(issues) => Some(issues),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound { entity: "Record" },
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        AppError::Spreadsheet(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
