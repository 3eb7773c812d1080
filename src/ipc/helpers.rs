use crate::error::{ServiceError, ServiceResult};
use crate::ipc::error::{ok, service_err};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn db_conn(state: &AppState) -> ServiceResult<&Connection> {
    state.db.as_ref().ok_or(ServiceError::NoWorkspace)
}

/// Missing `params` decodes like an empty object.
pub fn parse_params<T: DeserializeOwned>(req: &Request) -> ServiceResult<T> {
    let raw = if req.params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        req.params.clone()
    };
    serde_json::from_value(raw).map_err(|e| ServiceError::bad_params(format!("invalid params: {}", e)))
}

pub fn respond<T: Serialize>(req: &Request, result: ServiceResult<T>) -> serde_json::Value {
    let outcome = result.and_then(|value| {
        serde_json::to_value(value)
            .map_err(|e| ServiceError::Unavailable(format!("failed to encode result: {}", e)))
    });
    match outcome {
        Ok(value) => ok(&req.id, value),
        Err(e) => {
            if e.status() >= 500 {
                tracing::error!(id = %req.id, method = %req.method, code = e.code(), error = %e, "request failed");
            } else {
                tracing::debug!(id = %req.id, method = %req.method, code = e.code(), error = %e, "request rejected");
            }
            service_err(&req.id, &e)
        }
    }
}
