use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{db_conn, parse_params, respond};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, DashboardQuery, DashboardSummary};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummaryParams {
    #[serde(default)]
    since: Option<NaiveDate>,
    #[serde(default)]
    limit: Option<usize>,
}

fn dashboard_summary(state: &AppState, req: &Request) -> ServiceResult<DashboardSummary> {
    let params: SummaryParams = parse_params(req)?;
    let limit = params.limit.unwrap_or(state.settings.recent_limit);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ServiceError::bad_params(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    let window_start = params.since.unwrap_or_else(|| {
        Utc::now().date_naive() - Duration::days(state.settings.recent_window_days)
    });
    let conn = db_conn(state)?;
    reports::dashboard_summary(
        conn,
        &DashboardQuery {
            since: params.since,
            limit,
            window_start,
        },
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(respond(req, dashboard_summary(state, req))),
        _ => None,
    }
}
