use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Per-entry verdict reported back when a bulk attendance batch is rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryCheck {
    pub index: usize,
    pub student_id: i64,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{entity} not found: id={id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{message}")]
    Validation {
        message: String,
        entries: Vec<EntryCheck>,
    },

    #[error("{0}")]
    BadParams(String),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("database unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Unavailable(err.to_string())
    }
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        ServiceError::NotFound { entity, id }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        ServiceError::BadParams(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::Validation { .. } => "validation_failed",
            ServiceError::BadParams(_) => "bad_params",
            ServiceError::NoWorkspace => "no_workspace",
            ServiceError::Unavailable(_) => "service_unavailable",
        }
    }

    /// HTTP-equivalent status for the error envelope.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::NotFound { .. } => 404,
            ServiceError::Validation { .. } | ServiceError::BadParams(_) => 400,
            ServiceError::NoWorkspace | ServiceError::Unavailable(_) => 503,
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            ServiceError::Validation { entries, .. } => {
                let invalid: Vec<i64> = entries
                    .iter()
                    .filter(|e| !e.valid)
                    .map(|e| e.student_id)
                    .collect();
                Some(json!({
                    "invalid_student_ids": invalid,
                    "entries": entries,
                }))
            }
            _ => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
