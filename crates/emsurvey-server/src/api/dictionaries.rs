use crate::api::pagination::PaginationParams;
use crate::api::{
    bad_request, ensure_admin, error_response, not_found, record_log, storage_error, store_error,
    success_empty_response, success_paginated_response, success_response, ApiError,
};
use crate::auth::CurrentUser;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use emsurvey_common::types::{
    CreateDictionaryRequest, CreateDictionaryTypeRequest, DictionaryItem, DictionaryType,
    DictionaryTypeSummary, UpdateDictionaryRequest, UpdateDictionaryTypeRequest,
};
use emsurvey_storage::store::DictTypeFilter;
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Deserialize, IntoParams)]
struct ListByTypeQuery {
    /// 是否仅返回启用的条目（默认 false）
    #[serde(default)]
    enabled_only: bool,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListDictTypesQuery {
    /// 字典类型模糊匹配
    #[param(required = false, rename = "dict_type__contains")]
    #[serde(rename = "dict_type__contains")]
    dict_type_contains: Option<String>,
    #[serde(flatten)]
    pagination: PaginationParams,
}

/// 获取字典类型摘要（含条目数量）。
#[utoipa::path(
    get,
    path = "/v1/dictionaries/types",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    params(ListDictTypesQuery),
    responses(
        (status = 200, description = "字典类型分页列表", body = Vec<DictionaryTypeSummary>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_dict_types(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<ListDictTypesQuery>,
) -> impl IntoResponse {
    let filter = DictTypeFilter {
        dict_type_contains: query.dict_type_contains,
    };
    let limit = query.pagination.limit();
    let offset = query.pagination.offset();
    let total = match state.store.count_all_dict_types(&filter).await {
        Ok(c) => c,
        Err(e) => return storage_error(&trace_id, &e, "Failed to count dictionary types"),
    };
    match state.store.list_all_dict_types(&filter, limit, offset).await {
        Ok(types) => success_paginated_response(StatusCode::OK, &trace_id, types, total, limit, offset),
        Err(e) => storage_error(&trace_id, &e, "Failed to list dictionary types"),
    }
}

/// 创建字典类型（仅管理员）。
#[utoipa::path(
    post,
    path = "/v1/dictionaries/types",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    request_body = CreateDictionaryTypeRequest,
    responses(
        (status = 201, description = "字典类型已创建", body = DictionaryType),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 409, description = "字典类型已存在", body = ApiError)
    )
)]
async fn create_dict_type(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<CreateDictionaryTypeRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.dict_type.trim().is_empty() || req.dict_type_label.trim().is_empty() {
        return bad_request(&trace_id, "dict_type and dict_type_label are required");
    }
    match state.store.insert_dict_type(&req).await {
        Ok(t) => {
            record_log(
                &state,
                &trace_id,
                current.log_entry("dictionary", "create_type", Some(&t.dict_type)),
            )
            .await;
            success_response(StatusCode::CREATED, &trace_id, t)
        }
        Err(e) => store_error(&trace_id, &e, "Failed to create dictionary type"),
    }
}

/// 更新字典类型（仅管理员）。
#[utoipa::path(
    put,
    path = "/v1/dictionaries/types/{dict_type}",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    params(("dict_type" = String, Path, description = "字典类型")),
    request_body = UpdateDictionaryTypeRequest,
    responses(
        (status = 200, description = "字典类型已更新", body = DictionaryType),
        (status = 404, description = "字典类型不存在", body = ApiError)
    )
)]
async fn update_dict_type(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(dict_type): Path<String>,
    Json(req): Json<UpdateDictionaryTypeRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    match state.store.update_dict_type(&dict_type, &req).await {
        Ok(Some(t)) => {
            record_log(
                &state,
                &trace_id,
                current.log_entry("dictionary", "update_type", Some(&dict_type)),
            )
            .await;
            success_response(StatusCode::OK, &trace_id, t)
        }
        Ok(None) => not_found(&trace_id, "Dictionary type not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to update dictionary type"),
    }
}

/// 删除字典类型及其自定义条目。仍含系统内置条目时拒绝删除。
#[utoipa::path(
    delete,
    path = "/v1/dictionaries/types/{dict_type}",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    params(("dict_type" = String, Path, description = "字典类型")),
    responses(
        (status = 200, description = "字典类型已删除"),
        (status = 404, description = "字典类型不存在", body = ApiError),
        (status = 409, description = "仍含系统条目", body = ApiError)
    )
)]
async fn delete_dict_type(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(dict_type): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    match state.store.delete_dict_type(&dict_type).await {
        Ok(true) => {
            record_log(
                &state,
                &trace_id,
                current.log_entry("dictionary", "delete_type", Some(&dict_type)),
            )
            .await;
            success_empty_response(StatusCode::OK, &trace_id, "Dictionary type deleted")
        }
        Ok(false) => not_found(&trace_id, "Dictionary type not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to delete dictionary type"),
    }
}

/// 获取指定类型下的所有字典条目。
#[utoipa::path(
    get,
    path = "/v1/dictionaries/type/{dict_type}",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    params(
        ("dict_type" = String, Path, description = "字典类型"),
        ListByTypeQuery
    ),
    responses(
        (status = 200, description = "字典条目列表", body = Vec<DictionaryItem>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_by_type(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(dict_type): Path<String>,
    Query(query): Query<ListByTypeQuery>,
) -> impl IntoResponse {
    match state
        .store
        .list_dictionaries_by_type(&dict_type, query.enabled_only)
        .await
    {
        Ok(items) => success_response(StatusCode::OK, &trace_id, items),
        Err(e) => storage_error(&trace_id, &e, "Failed to list dictionaries by type"),
    }
}

/// 获取单个字典条目。
#[utoipa::path(
    get,
    path = "/v1/dictionaries/{id}",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "字典条目 ID")),
    responses(
        (status = 200, description = "字典条目", body = DictionaryItem),
        (status = 404, description = "字典条目不存在", body = ApiError)
    )
)]
async fn get_dictionary(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_dictionary_by_id(&id).await {
        Ok(Some(item)) => success_response(StatusCode::OK, &trace_id, item),
        Ok(None) => not_found(&trace_id, "Dictionary item not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to get dictionary"),
    }
}

/// 创建字典条目（仅管理员）。字典类型须已登记。
#[utoipa::path(
    post,
    path = "/v1/dictionaries",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    request_body = CreateDictionaryRequest,
    responses(
        (status = 201, description = "字典条目已创建", body = DictionaryItem),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 409, description = "同类型下键已存在", body = ApiError)
    )
)]
async fn create_dictionary(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<CreateDictionaryRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.dict_key.trim().is_empty() || req.dict_label.trim().is_empty() {
        return bad_request(&trace_id, "dict_key and dict_label are required");
    }
    match state.store.get_dict_type(&req.dict_type).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request(&trace_id, "dictionary type does not exist"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to look up dictionary type"),
    }
    match state.store.insert_dictionary(&req).await {
        Ok(item) => {
            record_log(
                &state,
                &trace_id,
                current.log_entry("dictionary", "create", Some(&item.id)),
            )
            .await;
            success_response(StatusCode::CREATED, &trace_id, item)
        }
        Err(e) => store_error(&trace_id, &e, "Failed to create dictionary"),
    }
}

/// 更新字典条目（仅管理员）。
#[utoipa::path(
    put,
    path = "/v1/dictionaries/{id}",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "字典条目 ID")),
    request_body = UpdateDictionaryRequest,
    responses(
        (status = 200, description = "字典条目已更新", body = DictionaryItem),
        (status = 404, description = "字典条目不存在", body = ApiError)
    )
)]
async fn update_dictionary(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDictionaryRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    match state.store.update_dictionary(&id, &req).await {
        Ok(Some(item)) => {
            record_log(&state, &trace_id, current.log_entry("dictionary", "update", Some(&id)))
                .await;
            success_response(StatusCode::OK, &trace_id, item)
        }
        Ok(None) => not_found(&trace_id, "Dictionary item not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to update dictionary"),
    }
}

/// 删除字典条目。系统内置条目不可删除。
#[utoipa::path(
    delete,
    path = "/v1/dictionaries/{id}",
    tag = "Dictionaries",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "字典条目 ID")),
    responses(
        (status = 200, description = "字典条目已删除"),
        (status = 403, description = "系统内置条目", body = ApiError),
        (status = 404, description = "字典条目不存在", body = ApiError)
    )
)]
async fn delete_dictionary(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    match state.store.get_dictionary_by_id(&id).await {
        Ok(Some(item)) if item.is_system => {
            return error_response(
                StatusCode::FORBIDDEN,
                &trace_id,
                "forbidden",
                "System dictionary items cannot be deleted",
            )
        }
        Ok(Some(_)) => {}
        Ok(None) => return not_found(&trace_id, "Dictionary item not found"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to get dictionary"),
    }
    match state.store.delete_dictionary(&id).await {
        Ok(true) => {
            record_log(&state, &trace_id, current.log_entry("dictionary", "delete", Some(&id)))
                .await;
            success_empty_response(StatusCode::OK, &trace_id, "Dictionary item deleted")
        }
        Ok(false) => not_found(&trace_id, "Dictionary item not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to delete dictionary"),
    }
}

pub fn dictionary_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_dict_types, create_dict_type))
        .routes(routes!(update_dict_type, delete_dict_type))
        .routes(routes!(list_by_type))
        .routes(routes!(create_dictionary))
        .routes(routes!(get_dictionary, update_dictionary, delete_dictionary))
}
