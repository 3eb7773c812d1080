use crate::attendance::{self, BulkAttendanceOutcome, BulkAttendanceRequest};
use crate::error::ServiceResult;
use crate::ipc::helpers::{db_conn, parse_params, respond};
use crate::ipc::types::{AppState, Request};

fn bulk_mark(state: &AppState, req: &Request) -> ServiceResult<BulkAttendanceOutcome> {
    let params: BulkAttendanceRequest = parse_params(req)?;
    let conn = db_conn(state)?;
    attendance::bulk_mark(conn, &params)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.bulkMark" => Some(respond(req, bulk_mark(state, req))),
        _ => None,
    }
}
