use crate::api::pagination::PaginationParams;
use crate::api::{
    bad_request, ensure_admin, error_response, not_found, record_log, storage_error, store_error,
    success_empty_response, success_paginated_response, success_response, ApiError,
};
use crate::auth::{CurrentUser, MIN_CREDENTIAL_LEN};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use emsurvey_common::types::{
    CreateUserRequest, ResetPasswordRequest, UpdateUserRequest, User, UserFilter,
};
use emsurvey_storage::auth::hash_password;
use emsurvey_storage::store::role::ADMIN_ROLE;
use emsurvey_storage::store::user::NewUser;
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListUsersQuery {
    /// 用户名模糊匹配
    #[param(required = false, rename = "username__contains")]
    #[serde(rename = "username__contains")]
    username_contains: Option<String>,
    /// 角色 ID 精确匹配
    #[param(required = false, rename = "role_id__eq")]
    #[serde(rename = "role_id__eq")]
    role_id_eq: Option<String>,
    /// 启用状态精确匹配
    #[param(required = false, rename = "enabled__eq")]
    #[serde(rename = "enabled__eq")]
    enabled_eq: Option<bool>,
    #[serde(flatten)]
    pagination: PaginationParams,
}

fn hash_or_500(trace_id: &str, password: &str) -> Result<String, Response> {
    hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            trace_id,
            "internal_error",
            "internal error",
        )
    })
}

/// 分页查询用户列表（仅管理员）。
#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(ListUsersQuery),
    responses(
        (status = 200, description = "用户分页列表", body = Vec<User>),
        (status = 401, description = "未认证", body = ApiError),
        (status = 403, description = "无权限", body = ApiError)
    )
)]
async fn list_users(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    let filter = UserFilter {
        username_contains: query.username_contains,
        role_id_eq: query.role_id_eq,
        enabled_eq: query.enabled_eq,
    };
    let limit = query.pagination.limit();
    let offset = query.pagination.offset();

    let total = match state.store.count_users_filtered(&filter).await {
        Ok(c) => c,
        Err(e) => return storage_error(&trace_id, &e, "Failed to count users"),
    };
    match state.store.list_users(&filter, limit, offset).await {
        Ok(users) => success_paginated_response(StatusCode::OK, &trace_id, users, total, limit, offset),
        Err(e) => storage_error(&trace_id, &e, "Failed to list users"),
    }
}

/// 获取用户详情。管理员可查看任意用户，其他用户仅可查看自己。
#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    responses(
        (status = 200, description = "用户详情", body = User),
        (status = 403, description = "无权限", body = ApiError),
        (status = 404, description = "用户不存在", body = ApiError)
    )
)]
async fn get_user(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if current.id != id {
        if let Err(resp) = ensure_admin(&current, &trace_id) {
            return resp;
        }
    }
    match state.store.get_user_by_id(&id).await {
        Ok(Some(user)) => success_response(StatusCode::OK, &trace_id, user),
        Ok(None) => not_found(&trace_id, "User not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to get user"),
    }
}

/// 创建用户（仅管理员）。
#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "用户已创建", body = User),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 403, description = "无权限", body = ApiError),
        (status = 409, description = "用户名已存在", body = ApiError)
    )
)]
async fn create_user(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    let username = req.username.trim();
    if username.chars().count() < MIN_CREDENTIAL_LEN {
        return bad_request(&trace_id, "username must be at least 4 characters");
    }
    if req.password.chars().count() < MIN_CREDENTIAL_LEN {
        return bad_request(&trace_id, "password must be at least 4 characters");
    }
    match state.store.get_role_by_id(&req.role_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request(&trace_id, "role does not exist"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to look up role"),
    }
    match state.store.get_user_by_username(username).await {
        Ok(Some(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                &trace_id,
                "conflict",
                "username already exists",
            )
        }
        Ok(None) => {}
        Err(e) => return storage_error(&trace_id, &e, "Failed to look up user"),
    }

    let password_hash = match hash_or_500(&trace_id, &req.password) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let new_user = NewUser {
        username,
        password_hash: &password_hash,
        display_name: req.display_name,
        email: req.email,
        phone: req.phone,
        role_id: &req.role_id,
        enabled: req.enabled.unwrap_or(true),
    };
    match state.store.create_user(&new_user).await {
        Ok(user) => {
            record_log(&state, &trace_id, current.log_entry("user", "create", Some(&user.id)))
                .await;
            success_response(StatusCode::CREATED, &trace_id, user)
        }
        Err(e) => store_error(&trace_id, &e, "Failed to create user"),
    }
}

/// 更新用户资料、角色或启用状态（仅管理员）。管理员不能停用自己，也不能撤掉自己的管理员角色。
#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "用户已更新", body = User),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 403, description = "无权限", body = ApiError),
        (status = 404, description = "用户不存在", body = ApiError)
    )
)]
async fn update_user(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if let Some(ref role_id) = req.role_id {
        match state.store.get_role_by_id(role_id).await {
            Ok(Some(role)) if current.id == id && role.code != ADMIN_ROLE => {
                return bad_request(&trace_id, "cannot remove your own admin role");
            }
            Ok(Some(_)) => {}
            Ok(None) => return bad_request(&trace_id, "role does not exist"),
            Err(e) => return storage_error(&trace_id, &e, "Failed to look up role"),
        }
    }
    if current.id == id && req.enabled == Some(false) {
        return bad_request(&trace_id, "cannot disable yourself");
    }
    match state.store.update_user(&id, &req).await {
        Ok(Some(user)) => {
            record_log(&state, &trace_id, current.log_entry("user", "update", Some(&id))).await;
            success_response(StatusCode::OK, &trace_id, user)
        }
        Ok(None) => not_found(&trace_id, "User not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to update user"),
    }
}

/// 删除用户（仅管理员，不可删除自己）。
#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    responses(
        (status = 200, description = "用户已删除"),
        (status = 400, description = "不能删除自己", body = ApiError),
        (status = 403, description = "无权限", body = ApiError),
        (status = 404, description = "用户不存在", body = ApiError)
    )
)]
async fn delete_user(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if current.id == id {
        return bad_request(&trace_id, "cannot delete yourself");
    }
    match state.store.delete_user(&id).await {
        Ok(true) => {
            record_log(&state, &trace_id, current.log_entry("user", "delete", Some(&id))).await;
            success_empty_response(StatusCode::OK, &trace_id, "User deleted")
        }
        Ok(false) => not_found(&trace_id, "User not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to delete user"),
    }
}

/// 管理员重置用户密码。重置后该用户已签发的 token 全部失效。
#[utoipa::path(
    post,
    path = "/v1/users/{id}/password",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "密码已重置"),
        (status = 400, description = "新密码不合法", body = ApiError),
        (status = 403, description = "无权限", body = ApiError),
        (status = 404, description = "用户不存在", body = ApiError)
    )
)]
async fn reset_password(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.new_password.chars().count() < MIN_CREDENTIAL_LEN {
        return bad_request(&trace_id, "new password must be at least 4 characters");
    }
    let password_hash = match hash_or_500(&trace_id, &req.new_password) {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match state.store.update_user_password_hash(&id, &password_hash).await {
        Ok(true) => {
            record_log(
                &state,
                &trace_id,
                current.log_entry("user", "reset_password", Some(&id)),
            )
            .await;
            success_empty_response(StatusCode::OK, &trace_id, "Password reset")
        }
        Ok(false) => not_found(&trace_id, "User not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to reset password"),
    }
}

pub fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_users, create_user))
        .routes(routes!(get_user, update_user, delete_user))
        .routes(routes!(reset_password))
}
