use crate::api::{
    bad_request, ensure_admin, error_response, not_found, record_log, storage_error, store_error,
    success_empty_response, success_response, ApiError,
};
use crate::auth::CurrentUser;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use emsurvey_common::types::{CreateRegionRequest, Region, RegionNode, UpdateRegionRequest};
use emsurvey_storage::StorageError;
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ChildrenQuery {
    /// 上级区划代码；缺省返回省级
    #[param(required = false)]
    parent_code: Option<String>,
}

/// 获取完整区划树（省 → 市 → 区县）。
#[utoipa::path(
    get,
    path = "/v1/regions/tree",
    tag = "Regions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "区划树", body = Vec<RegionNode>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn region_tree(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.region_tree().await {
        Ok(tree) => success_response(StatusCode::OK, &trace_id, tree),
        Err(e) => storage_error(&trace_id, &e, "Failed to build region tree"),
    }
}

/// 获取下级区划列表。
#[utoipa::path(
    get,
    path = "/v1/regions",
    tag = "Regions",
    security(("bearer_auth" = [])),
    params(ChildrenQuery),
    responses(
        (status = 200, description = "区划列表", body = Vec<Region>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_children(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<ChildrenQuery>,
) -> impl IntoResponse {
    let parent = query.parent_code.as_deref().filter(|p| !p.is_empty());
    match state.store.list_region_children(parent).await {
        Ok(regions) => success_response(StatusCode::OK, &trace_id, regions),
        Err(e) => storage_error(&trace_id, &e, "Failed to list regions"),
    }
}

#[utoipa::path(
    get,
    path = "/v1/regions/{code}",
    tag = "Regions",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "区划代码")),
    responses(
        (status = 200, description = "区划详情", body = Region),
        (status = 404, description = "区划不存在", body = ApiError)
    )
)]
async fn get_region(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    match state.store.get_region(&code).await {
        Ok(Some(region)) => success_response(StatusCode::OK, &trace_id, region),
        Ok(None) => not_found(&trace_id, "Region not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to get region"),
    }
}

/// 新增区划（仅管理员）。层级由上级区划推导，区县下不能再建子区划。
#[utoipa::path(
    post,
    path = "/v1/regions",
    tag = "Regions",
    security(("bearer_auth" = [])),
    request_body = CreateRegionRequest,
    responses(
        (status = 201, description = "区划已创建", body = Region),
        (status = 400, description = "参数错误、上级区划不存在或已是最深层级", body = ApiError),
        (status = 409, description = "区划代码已存在", body = ApiError)
    )
)]
async fn create_region(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<CreateRegionRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.code.trim().is_empty() || req.name.trim().is_empty() {
        return bad_request(&trace_id, "code and name are required");
    }
    match state.store.create_region(&req).await {
        Ok(region) => {
            record_log(
                &state,
                &trace_id,
                current.log_entry("region", "create", Some(&region.code)),
            )
            .await;
            success_response(StatusCode::CREATED, &trace_id, region)
        }
        Err(e) => match e.downcast_ref::<StorageError>() {
            Some(StorageError::NotFound { .. }) => {
                bad_request(&trace_id, "parent region does not exist")
            }
            Some(StorageError::Rejected(msg)) => bad_request(&trace_id, msg),
            _ => store_error(&trace_id, &e, "Failed to create region"),
        },
    }
}

/// 修改区划名称或排序（仅管理员）。
#[utoipa::path(
    put,
    path = "/v1/regions/{code}",
    tag = "Regions",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "区划代码")),
    request_body = UpdateRegionRequest,
    responses(
        (status = 200, description = "区划已更新", body = Region),
        (status = 404, description = "区划不存在", body = ApiError)
    )
)]
async fn update_region(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<UpdateRegionRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return bad_request(&trace_id, "name cannot be empty");
    }
    match state.store.update_region(&code, &req).await {
        Ok(Some(region)) => {
            record_log(&state, &trace_id, current.log_entry("region", "update", Some(&code)))
                .await;
            success_response(StatusCode::OK, &trace_id, region)
        }
        Ok(None) => not_found(&trace_id, "Region not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to update region"),
    }
}

/// 删除区划（仅管理员）。存在下级区划时拒绝删除。
#[utoipa::path(
    delete,
    path = "/v1/regions/{code}",
    tag = "Regions",
    security(("bearer_auth" = [])),
    params(("code" = String, Path, description = "区划代码")),
    responses(
        (status = 200, description = "区划已删除"),
        (status = 404, description = "区划不存在", body = ApiError),
        (status = 409, description = "存在下级区划", body = ApiError)
    )
)]
async fn delete_region(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    match state.store.delete_region(&code).await {
        Ok(true) => {
            record_log(&state, &trace_id, current.log_entry("region", "delete", Some(&code)))
                .await;
            success_empty_response(StatusCode::OK, &trace_id, "Region deleted")
        }
        Ok(false) => not_found(&trace_id, "Region not found"),
        Err(e) => match e.downcast_ref::<StorageError>() {
            Some(StorageError::Rejected(msg)) => {
                error_response(StatusCode::CONFLICT, &trace_id, "region_has_children", msg)
            }
            _ => storage_error(&trace_id, &e, "Failed to delete region"),
        },
    }
}

pub fn region_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(region_tree))
        .routes(routes!(list_children, create_region))
        .routes(routes!(get_region, update_region, delete_region))
}
