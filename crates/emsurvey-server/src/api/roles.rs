use crate::api::{
    bad_request, ensure_admin, error_response, not_found, record_log, storage_error, store_error,
    success_empty_response, success_response, ApiError,
};
use crate::auth::CurrentUser;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use emsurvey_common::types::{CreateRoleRequest, Role, UpdateRoleRequest};
use utoipa_axum::{router::OpenApiRouter, routes};

/// 角色编码：小写字母开头，仅含小写字母、数字、下划线
fn is_valid_role_code(code: &str) -> bool {
    let mut chars = code.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// 获取全部角色（系统角色在前）。
#[utoipa::path(
    get,
    path = "/v1/roles",
    tag = "Roles",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "角色列表", body = Vec<Role>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_roles(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.list_roles().await {
        Ok(roles) => success_response(StatusCode::OK, &trace_id, roles),
        Err(e) => storage_error(&trace_id, &e, "Failed to list roles"),
    }
}

#[utoipa::path(
    get,
    path = "/v1/roles/{id}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "角色 ID")),
    responses(
        (status = 200, description = "角色详情", body = Role),
        (status = 404, description = "角色不存在", body = ApiError)
    )
)]
async fn get_role(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_role_by_id(&id).await {
        Ok(Some(role)) => success_response(StatusCode::OK, &trace_id, role),
        Ok(None) => not_found(&trace_id, "Role not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to get role"),
    }
}

/// 创建自定义角色（仅管理员）。
#[utoipa::path(
    post,
    path = "/v1/roles",
    tag = "Roles",
    security(("bearer_auth" = [])),
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "角色已创建", body = Role),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 403, description = "无权限", body = ApiError),
        (status = 409, description = "角色编码已存在", body = ApiError)
    )
)]
async fn create_role(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<CreateRoleRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if !is_valid_role_code(&req.code) {
        return bad_request(
            &trace_id,
            "role code must start with a lowercase letter and contain only a-z, 0-9 or _",
        );
    }
    if req.name.trim().is_empty() {
        return bad_request(&trace_id, "role name is required");
    }
    match state.store.create_role(&req).await {
        Ok(role) => {
            record_log(&state, &trace_id, current.log_entry("role", "create", Some(&role.id)))
                .await;
            success_response(StatusCode::CREATED, &trace_id, role)
        }
        Err(e) => store_error(&trace_id, &e, "Failed to create role"),
    }
}

/// 更新角色名称、描述或权限（仅管理员）。
#[utoipa::path(
    put,
    path = "/v1/roles/{id}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "角色 ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "角色已更新", body = Role),
        (status = 403, description = "无权限", body = ApiError),
        (status = 404, description = "角色不存在", body = ApiError)
    )
)]
async fn update_role(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return bad_request(&trace_id, "role name cannot be empty");
    }
    match state.store.update_role(&id, &req).await {
        Ok(Some(role)) => {
            record_log(&state, &trace_id, current.log_entry("role", "update", Some(&id))).await;
            success_response(StatusCode::OK, &trace_id, role)
        }
        Ok(None) => not_found(&trace_id, "Role not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to update role"),
    }
}

/// 删除自定义角色。系统角色不可删除，仍被用户使用的角色不可删除。
#[utoipa::path(
    delete,
    path = "/v1/roles/{id}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "角色 ID")),
    responses(
        (status = 200, description = "角色已删除"),
        (status = 403, description = "系统角色或无权限", body = ApiError),
        (status = 404, description = "角色不存在", body = ApiError),
        (status = 409, description = "角色仍被使用", body = ApiError)
    )
)]
async fn delete_role(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    let role = match state.store.get_role_by_id(&id).await {
        Ok(Some(r)) => r,
        Ok(None) => return not_found(&trace_id, "Role not found"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to get role"),
    };
    if role.is_system {
        return error_response(
            StatusCode::FORBIDDEN,
            &trace_id,
            "forbidden",
            "System roles cannot be deleted",
        );
    }
    match state.store.count_users_with_role(&id).await {
        Ok(0) => {}
        Ok(n) => {
            return error_response(
                StatusCode::CONFLICT,
                &trace_id,
                "role_in_use",
                &format!("Role is assigned to {n} user(s)"),
            )
        }
        Err(e) => return storage_error(&trace_id, &e, "Failed to count role users"),
    }
    match state.store.delete_role(&id).await {
        Ok(true) => {
            record_log(&state, &trace_id, current.log_entry("role", "delete", Some(&id))).await;
            success_empty_response(StatusCode::OK, &trace_id, "Role deleted")
        }
        Ok(false) => not_found(&trace_id, "Role not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to delete role"),
    }
}

pub fn role_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_roles, create_role))
        .routes(routes!(get_role, update_role, delete_role))
}

#[cfg(test)]
mod tests {
    use super::is_valid_role_code;

    #[test]
    fn role_code_format() {
        assert!(is_valid_role_code("sales"));
        assert!(is_valid_role_code("key_account2"));
        assert!(!is_valid_role_code(""));
        assert!(!is_valid_role_code("2sales"));
        assert!(!is_valid_role_code("Sales"));
        assert!(!is_valid_role_code("pre-sales"));
    }
}
