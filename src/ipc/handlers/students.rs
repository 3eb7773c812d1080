use crate::error::ServiceResult;
use crate::ipc::helpers::{db_conn, parse_params, respond};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, StudentPerformance};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PerformanceParams {
    student_id: i64,
}

fn student_performance(state: &AppState, req: &Request) -> ServiceResult<StudentPerformance> {
    let params: PerformanceParams = parse_params(req)?;
    let conn = db_conn(state)?;
    reports::student_performance(conn, params.student_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.performance" => Some(respond(req, student_performance(state, req))),
        _ => None,
    }
}
