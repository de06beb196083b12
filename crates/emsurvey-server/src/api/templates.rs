use crate::api::{not_found, success_response, ApiError};
use crate::logging::TraceId;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use emsurvey_common::template::{self, SurveyTemplate};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::state::AppState;

/// 获取可用问卷模板。
#[utoipa::path(
    get,
    path = "/v1/templates",
    tag = "Templates",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "问卷模板列表", body = Vec<SurveyTemplate>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_templates(Extension(trace_id): Extension<TraceId>) -> impl IntoResponse {
    success_response(StatusCode::OK, &trace_id, template::list_templates())
}

#[utoipa::path(
    get,
    path = "/v1/templates/{id}",
    tag = "Templates",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "模板 ID")),
    responses(
        (status = 200, description = "问卷模板", body = SurveyTemplate),
        (status = 404, description = "模板不存在", body = ApiError)
    )
)]
async fn get_template(
    Extension(trace_id): Extension<TraceId>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match template::get_template(&id) {
        Some(t) => success_response(StatusCode::OK, &trace_id, t),
        None => not_found(&trace_id, "Template not found"),
    }
}

pub fn template_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_templates))
        .routes(routes!(get_template))
}
