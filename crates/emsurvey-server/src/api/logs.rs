use crate::api::pagination::PaginationParams;
use crate::api::{ensure_admin, storage_error, success_paginated_response, ApiError};
use crate::auth::CurrentUser;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use emsurvey_common::types::{SystemLog, SystemLogFilter};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListLogsQuery {
    /// 模块精确匹配（auth / user / role / survey ...）
    #[param(required = false, rename = "module__eq")]
    #[serde(rename = "module__eq")]
    module_eq: Option<String>,
    /// 操作精确匹配（login / create / update / delete ...）
    #[param(required = false, rename = "action__eq")]
    #[serde(rename = "action__eq")]
    action_eq: Option<String>,
    /// 用户名模糊匹配
    #[param(required = false, rename = "username__contains")]
    #[serde(rename = "username__contains")]
    username_contains: Option<String>,
    /// 起始时间（RFC 3339，含）
    #[param(required = false, value_type = Option<String>)]
    from: Option<DateTime<Utc>>,
    /// 截止时间（RFC 3339，含）
    #[param(required = false, value_type = Option<String>)]
    to: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pagination: PaginationParams,
}

/// 分页查询系统操作日志（仅管理员，按时间倒序）。
#[utoipa::path(
    get,
    path = "/v1/logs",
    tag = "Logs",
    security(("bearer_auth" = [])),
    params(ListLogsQuery),
    responses(
        (status = 200, description = "日志分页列表", body = Vec<SystemLog>),
        (status = 401, description = "未认证", body = ApiError),
        (status = 403, description = "无权限", body = ApiError)
    )
)]
async fn list_logs(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Query(query): Query<ListLogsQuery>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    let filter = SystemLogFilter {
        module_eq: query.module_eq,
        action_eq: query.action_eq,
        username_contains: query.username_contains,
        from: query.from,
        to: query.to,
    };
    let limit = query.pagination.limit();
    let offset = query.pagination.offset();
    let total = match state.store.count_logs(&filter).await {
        Ok(c) => c,
        Err(e) => return storage_error(&trace_id, &e, "Failed to count system logs"),
    };
    match state.store.list_logs(&filter, limit, offset).await {
        Ok(items) => success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset),
        Err(e) => storage_error(&trace_id, &e, "Failed to list system logs"),
    }
}

pub fn log_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_logs))
}
