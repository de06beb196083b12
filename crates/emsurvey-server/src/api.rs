pub mod dictionaries;
pub mod logs;
pub mod messages;
pub mod pagination;
pub mod products;
pub mod regions;
pub mod roles;
pub mod surveys;
pub mod templates;
pub mod users;

use crate::auth::CurrentUser;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use emsurvey_common::types::NewSystemLog;
use emsurvey_storage::{is_unique_violation, StorageError};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// API 错误响应
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// 错误码
    pub err_code: i32,
    /// 错误信息
    pub err_msg: String,
    /// 链路追踪 ID
    pub trace_id: String,
}

/// API 统一响应包裹
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 错误码（成功时为 0）
    pub err_code: i32,
    /// 错误信息（成功时为 success）
    pub err_msg: String,
    /// 链路追踪 ID
    pub trace_id: String,
    /// 业务数据（有数据时返回）
    pub data: Option<T>,
}

/// 分页数据结构
#[derive(Serialize, ToSchema)]
pub struct PaginatedData<T>
where
    T: Serialize,
{
    pub items: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_empty_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: 0,
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

pub fn success_paginated_response<T>(
    status: StatusCode,
    trace_id: &str,
    items: Vec<T>,
    total: u64,
    limit: usize,
    offset: usize,
) -> Response
where
    T: Serialize,
{
    success_response(
        status,
        trace_id,
        PaginatedData {
            items,
            total,
            limit,
            offset,
        },
    )
}

pub(crate) fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "unauthorized" => 1002,
        "token_expired" => 1003,
        "not_found" => 1004,
        "conflict" => 1005,
        "forbidden" => 1006,
        "validation_failed" => 1007,
        "survey_completed" => 1201,
        "role_in_use" => 1202,
        "region_has_children" => 1203,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    error_response_with_data::<Value>(status, trace_id, code, msg, None)
}

/// Error envelope that also carries details, e.g. per-field validation errors.
pub fn error_response_with_data<T>(
    status: StatusCode,
    trace_id: &str,
    code: &str,
    msg: &str,
    data: Option<T>,
) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data,
        }),
    )
        .into_response()
}

/// Log a storage failure and build the matching 500 envelope.
pub(crate) fn storage_error(trace_id: &str, err: &anyhow::Error, context: &str) -> Response {
    tracing::error!(trace_id = %trace_id, error = %err, "{context}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        trace_id,
        "storage_error",
        "Database error",
    )
}

/// Map a store error to an envelope: duplicates and rejected operations
/// become 409, missing references 404, anything else 500.
pub(crate) fn store_error(trace_id: &str, err: &anyhow::Error, context: &str) -> Response {
    match err.downcast_ref::<StorageError>() {
        Some(StorageError::Rejected(msg)) => {
            error_response(StatusCode::CONFLICT, trace_id, "conflict", msg)
        }
        Some(e @ StorageError::NotFound { .. }) => not_found(trace_id, &e.to_string()),
        _ if is_unique_violation(err) => {
            error_response(StatusCode::CONFLICT, trace_id, "conflict", &err.to_string())
        }
        _ => storage_error(trace_id, err, context),
    }
}

pub(crate) fn not_found(trace_id: &str, msg: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, trace_id, "not_found", msg)
}

pub(crate) fn bad_request(trace_id: &str, msg: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", msg)
}

/// 仅管理员可访问
pub(crate) fn ensure_admin(user: &CurrentUser, trace_id: &str) -> Result<(), Response> {
    if user.is_admin {
        Ok(())
    } else {
        Err(error_response(
            StatusCode::FORBIDDEN,
            trace_id,
            "forbidden",
            "Administrator role required",
        ))
    }
}

/// 写入系统操作日志；失败只记录告警，不影响请求结果
pub(crate) async fn record_log(state: &AppState, trace_id: &str, mut entry: NewSystemLog) {
    entry.trace_id = Some(trace_id.to_string());
    if let Err(e) = state.store.insert_log(&entry).await {
        tracing::warn!(
            trace_id = %trace_id,
            module = %entry.module,
            action = %entry.action,
            error = %e,
            "Failed to write system log"
        );
    }
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// 服务版本号
    version: String,
    /// 运行时长（秒）
    uptime_secs: i64,
    /// 存储状态（ok / error）
    storage_status: String,
    /// 是否启用 AI 报告
    ai_enabled: bool,
}

/// 获取服务健康状态。
/// 鉴权：无需 Bearer Token。
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "服务健康状态", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let storage_status = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            "error"
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            storage_status: storage_status.to_string(),
            ai_enabled: state.report_generator.is_some(),
        },
    )
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health))
}

pub fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(crate::auth::login))
}

pub fn protected_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(crate::auth::me))
        .routes(routes!(crate::auth::change_password))
        .merge(users::user_routes())
        .merge(roles::role_routes())
        .merge(dictionaries::dictionary_routes())
        .merge(regions::region_routes())
        .merge(templates::template_routes())
        .merge(surveys::survey_routes())
        .merge(products::product_routes())
        .merge(messages::message_routes())
        .merge(logs::log_routes())
}
