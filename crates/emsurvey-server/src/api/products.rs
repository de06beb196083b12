use crate::api::pagination::PaginationParams;
use crate::api::{
    bad_request, ensure_admin, not_found, record_log, storage_error, store_error,
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
    CreateProductRequest, ProductCapability, ProductFilter, UpdateProductRequest,
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListProductsQuery {
    /// 产品分类精确匹配
    #[param(required = false, rename = "category__eq")]
    #[serde(rename = "category__eq")]
    category_eq: Option<String>,
    /// 启用状态精确匹配
    #[param(required = false, rename = "enabled__eq")]
    #[serde(rename = "enabled__eq")]
    enabled_eq: Option<bool>,
    /// 产品名称模糊匹配
    #[param(required = false, rename = "name__contains")]
    #[serde(rename = "name__contains")]
    name_contains: Option<String>,
    #[serde(flatten)]
    pagination: PaginationParams,
}

/// 分页查询产品能力。
#[utoipa::path(
    get,
    path = "/v1/products",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(ListProductsQuery),
    responses(
        (status = 200, description = "产品能力分页列表", body = Vec<ProductCapability>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_products(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> impl IntoResponse {
    let filter = ProductFilter {
        category_eq: query.category_eq,
        enabled_eq: query.enabled_eq,
        name_contains: query.name_contains,
    };
    let limit = query.pagination.limit();
    let offset = query.pagination.offset();
    let total = match state.store.count_products(&filter).await {
        Ok(c) => c,
        Err(e) => return storage_error(&trace_id, &e, "Failed to count products"),
    };
    match state.store.list_products(&filter, limit, offset).await {
        Ok(items) => success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset),
        Err(e) => storage_error(&trace_id, &e, "Failed to list products"),
    }
}

#[utoipa::path(
    get,
    path = "/v1/products/{id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "产品能力 ID")),
    responses(
        (status = 200, description = "产品能力详情", body = ProductCapability),
        (status = 404, description = "产品能力不存在", body = ApiError)
    )
)]
async fn get_product(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_product(&id).await {
        Ok(Some(p)) => success_response(StatusCode::OK, &trace_id, p),
        Ok(None) => not_found(&trace_id, "Product not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to get product"),
    }
}

/// 新增产品能力（仅管理员）。名称唯一。
#[utoipa::path(
    post,
    path = "/v1/products",
    tag = "Products",
    security(("bearer_auth" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "产品能力已创建", body = ProductCapability),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 409, description = "名称已存在", body = ApiError)
    )
)]
async fn create_product(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.name.trim().is_empty() || req.category.trim().is_empty() {
        return bad_request(&trace_id, "name and category are required");
    }
    match state.store.create_product(&req).await {
        Ok(p) => {
            record_log(&state, &trace_id, current.log_entry("product", "create", Some(&p.id)))
                .await;
            success_response(StatusCode::CREATED, &trace_id, p)
        }
        Err(e) => store_error(&trace_id, &e, "Failed to create product"),
    }
}

#[utoipa::path(
    put,
    path = "/v1/products/{id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "产品能力 ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "产品能力已更新", body = ProductCapability),
        (status = 404, description = "产品能力不存在", body = ApiError),
        (status = 409, description = "名称已存在", body = ApiError)
    )
)]
async fn update_product(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&req.name) || blank(&req.category) {
        return bad_request(&trace_id, "name and category cannot be empty");
    }
    match state.store.update_product(&id, &req).await {
        Ok(Some(p)) => {
            record_log(&state, &trace_id, current.log_entry("product", "update", Some(&id))).await;
            success_response(StatusCode::OK, &trace_id, p)
        }
        Ok(None) => not_found(&trace_id, "Product not found"),
        Err(e) => store_error(&trace_id, &e, "Failed to update product"),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/products/{id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "产品能力 ID")),
    responses(
        (status = 200, description = "产品能力已删除"),
        (status = 404, description = "产品能力不存在", body = ApiError)
    )
)]
async fn delete_product(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    match state.store.delete_product(&id).await {
        Ok(true) => {
            record_log(&state, &trace_id, current.log_entry("product", "delete", Some(&id))).await;
            success_empty_response(StatusCode::OK, &trace_id, "Product deleted")
        }
        Ok(false) => not_found(&trace_id, "Product not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to delete product"),
    }
}

pub fn product_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_products, create_product))
        .routes(routes!(get_product, update_product, delete_product))
}
