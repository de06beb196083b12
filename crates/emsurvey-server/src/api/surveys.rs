use crate::api::pagination::PaginationParams;
use crate::api::{
    bad_request, error_response, error_response_with_data, not_found, record_log, storage_error,
    store_error, success_empty_response, success_paginated_response, success_response, ApiError,
};
use crate::auth::CurrentUser;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use emsurvey_ai::{generate_with_fallback, ReportInput, ReportRenderer};
use emsurvey_common::template::{self, FieldError, DEFAULT_TEMPLATE_ID};
use emsurvey_common::types::{
    AssessmentReport, CreateSurveyRequest, NewMessage, Survey, SurveyFilter, SurveyStatus,
    UpdateSurveyRequest,
};
use emsurvey_storage::store::survey::NewSurvey;
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListSurveysQuery {
    /// 标题或客户名称关键字
    #[param(required = false)]
    keyword: Option<String>,
    /// 状态精确匹配（draft / filling / completed）
    #[param(required = false, rename = "status__eq")]
    #[serde(rename = "status__eq")]
    status_eq: Option<String>,
    /// 创建人 ID 精确匹配
    #[param(required = false, rename = "creator_id__eq")]
    #[serde(rename = "creator_id__eq")]
    creator_id_eq: Option<String>,
    #[serde(flatten)]
    pagination: PaginationParams,
}

/// 管理员、创建人、售前负责人可访问
fn can_access(user: &CurrentUser, survey: &Survey) -> bool {
    user.is_admin
        || survey.creator_id == user.id
        || survey.presales_id.as_deref() == Some(user.id.as_str())
}

fn forbidden(trace_id: &str) -> Response {
    error_response(
        StatusCode::FORBIDDEN,
        trace_id,
        "forbidden",
        "No permission for this survey",
    )
}

fn survey_completed(trace_id: &str) -> Response {
    error_response(
        StatusCode::CONFLICT,
        trace_id,
        "survey_completed",
        "Survey is already completed",
    )
}

/// 读取调研单并校验访问权限
async fn load_accessible(
    state: &AppState,
    trace_id: &str,
    current: &CurrentUser,
    id: &str,
) -> Result<Survey, Response> {
    match state.store.get_survey(id).await {
        Ok(Some(s)) if can_access(current, &s) => Ok(s),
        Ok(Some(_)) => Err(forbidden(trace_id)),
        Ok(None) => Err(not_found(trace_id, "Survey not found")),
        Err(e) => Err(storage_error(trace_id, &e, "Failed to get survey")),
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// 校验可选的区划与售前负责人引用
async fn check_references(
    state: &AppState,
    trace_id: &str,
    region_code: Option<&str>,
    presales_id: Option<&str>,
) -> Result<(), Response> {
    if let Some(code) = region_code {
        match state.store.get_region(code).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(bad_request(trace_id, "region does not exist")),
            Err(e) => return Err(storage_error(trace_id, &e, "Failed to look up region")),
        }
    }
    if let Some(user_id) = presales_id {
        match state.store.get_user_by_id(user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(bad_request(trace_id, "presales user does not exist")),
            Err(e) => return Err(storage_error(trace_id, &e, "Failed to look up presales user")),
        }
    }
    Ok(())
}

/// 为已提交的调研单生成并保存评估报告
async fn build_report(state: &AppState, survey: &Survey) -> anyhow::Result<Survey> {
    let template = template::get_template(&survey.template_id)
        .ok_or_else(|| anyhow::anyhow!("template {} not found", survey.template_id))?;
    let products = state.store.list_enabled_products().await?;
    let input = ReportInput {
        survey,
        template,
        products: &products,
    };
    let report = generate_with_fallback(state.report_generator.as_deref(), &input).await;
    state
        .store
        .set_survey_report(&survey.id, &report)
        .await?
        .ok_or_else(|| anyhow::anyhow!("survey {} disappeared while storing report", survey.id))
}

/// 报告生成后通知创建人及售前负责人
async fn notify_report_ready(state: &AppState, survey: &Survey, report: &AssessmentReport) {
    let mut recipients = vec![survey.creator_id.clone()];
    if let Some(ref presales) = survey.presales_id {
        if presales != &survey.creator_id {
            recipients.push(presales.clone());
        }
    }
    for recipient_id in recipients {
        let message = NewMessage {
            recipient_id,
            sender_id: None,
            title: format!("调研评估报告已生成：{}", survey.title),
            content: report.summary.clone(),
            msg_type: "report".to_string(),
            related_id: Some(survey.id.clone()),
        };
        if let Err(e) = state.store.insert_message(&message).await {
            tracing::warn!(
                survey_id = %survey.id,
                recipient_id = %message.recipient_id,
                error = %e,
                "Failed to send report notification"
            );
        }
    }
}

/// 分页查询调研单。非管理员仅能看到自己创建或负责的调研单。
#[utoipa::path(
    get,
    path = "/v1/surveys",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(ListSurveysQuery),
    responses(
        (status = 200, description = "调研单分页列表", body = Vec<Survey>),
        (status = 400, description = "状态参数无效", body = ApiError),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_surveys(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Query(query): Query<ListSurveysQuery>,
) -> impl IntoResponse {
    let status_eq = match query.status_eq.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(s) => match s.parse::<SurveyStatus>() {
            Ok(status) => Some(status),
            Err(msg) => return bad_request(&trace_id, &msg),
        },
    };
    let filter = SurveyFilter {
        keyword: query.keyword.filter(|k| !is_blank(k)),
        status_eq,
        creator_id_eq: query.creator_id_eq,
        visible_to: if current.is_admin {
            None
        } else {
            Some(current.id.clone())
        },
    };
    let limit = query.pagination.limit();
    let offset = query.pagination.offset();

    let total = match state.store.count_surveys(&filter).await {
        Ok(c) => c,
        Err(e) => return storage_error(&trace_id, &e, "Failed to count surveys"),
    };
    match state.store.list_surveys(&filter, limit, offset).await {
        Ok(surveys) => {
            success_paginated_response(StatusCode::OK, &trace_id, surveys, total, limit, offset)
        }
        Err(e) => storage_error(&trace_id, &e, "Failed to list surveys"),
    }
}

/// 获取调研单详情。
#[utoipa::path(
    get,
    path = "/v1/surveys/{id}",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "调研单 ID")),
    responses(
        (status = 200, description = "调研单详情", body = Survey),
        (status = 403, description = "无权访问", body = ApiError),
        (status = 404, description = "调研单不存在", body = ApiError)
    )
)]
async fn get_survey(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match load_accessible(&state, &trace_id, &current, &id).await {
        Ok(survey) => success_response(StatusCode::OK, &trace_id, survey),
        Err(resp) => resp,
    }
}

/// 新建调研单。
///
/// 标题与客户名称必填；模板缺省为内置问卷。新建的调研单总是草稿状态，
/// 首次保存非空答案后进入填写中。
#[utoipa::path(
    post,
    path = "/v1/surveys",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    request_body = CreateSurveyRequest,
    responses(
        (status = 201, description = "调研单已创建", body = Survey),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_survey(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<CreateSurveyRequest>,
) -> impl IntoResponse {
    if is_blank(&req.title) || is_blank(&req.customer_name) {
        return bad_request(&trace_id, "title and customer_name are required");
    }
    let template_id = req
        .template_id
        .filter(|t| !is_blank(t))
        .unwrap_or_else(|| DEFAULT_TEMPLATE_ID.to_string());
    if template::get_template(&template_id).is_none() {
        return bad_request(&trace_id, "template does not exist");
    }
    let answers = match req.answers {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(v @ Value::Object(_)) => v,
        Some(_) => return bad_request(&trace_id, "answers must be a JSON object"),
    };
    if let Err(resp) = check_references(
        &state,
        &trace_id,
        req.region_code.as_deref(),
        req.presales_id.as_deref(),
    )
    .await
    {
        return resp;
    }

    let new = NewSurvey {
        title: req.title.trim().to_string(),
        customer_name: req.customer_name.trim().to_string(),
        industry: req.industry,
        region_code: req.region_code,
        template_id,
        creator_id: current.id.clone(),
        presales_id: req.presales_id,
        answers,
    };
    match state.store.create_survey(&new).await {
        Ok(survey) => {
            record_log(&state, &trace_id, current.log_entry("survey", "create", Some(&survey.id)))
                .await;
            success_response(StatusCode::CREATED, &trace_id, survey)
        }
        Err(e) => store_error(&trace_id, &e, "Failed to create survey"),
    }
}

/// 保存调研单（元数据与答案）。已完成的调研单不可修改。
#[utoipa::path(
    put,
    path = "/v1/surveys/{id}",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "调研单 ID")),
    request_body = UpdateSurveyRequest,
    responses(
        (status = 200, description = "调研单已保存", body = Survey),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 403, description = "无权访问", body = ApiError),
        (status = 404, description = "调研单不存在", body = ApiError),
        (status = 409, description = "调研单已完成", body = ApiError)
    )
)]
async fn update_survey(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSurveyRequest>,
) -> impl IntoResponse {
    let survey = match load_accessible(&state, &trace_id, &current, &id).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    if survey.status == SurveyStatus::Completed {
        return survey_completed(&trace_id);
    }
    if req.title.as_deref().is_some_and(is_blank) || req.customer_name.as_deref().is_some_and(is_blank)
    {
        return bad_request(&trace_id, "title and customer_name cannot be empty");
    }
    if req.answers.as_ref().is_some_and(|a| !a.is_object()) {
        return bad_request(&trace_id, "answers must be a JSON object");
    }
    if let Err(resp) = check_references(
        &state,
        &trace_id,
        req.region_code.as_ref().and_then(|c| c.as_deref()),
        req.presales_id.as_ref().and_then(|p| p.as_deref()),
    )
    .await
    {
        return resp;
    }

    match state.store.update_survey(&id, &req).await {
        Ok(Some(updated)) => {
            record_log(&state, &trace_id, current.log_entry("survey", "update", Some(&id))).await;
            success_response(StatusCode::OK, &trace_id, updated)
        }
        Ok(None) => not_found(&trace_id, "Survey not found"),
        Err(e) => match e.downcast_ref::<emsurvey_storage::StorageError>() {
            Some(emsurvey_storage::StorageError::Rejected(_)) => survey_completed(&trace_id),
            _ => storage_error(&trace_id, &e, "Failed to update survey"),
        },
    }
}

/// 删除调研单（创建人或管理员）。
#[utoipa::path(
    delete,
    path = "/v1/surveys/{id}",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "调研单 ID")),
    responses(
        (status = 200, description = "调研单已删除"),
        (status = 403, description = "无权删除", body = ApiError),
        (status = 404, description = "调研单不存在", body = ApiError)
    )
)]
async fn delete_survey(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = match state.store.get_survey(&id).await {
        Ok(Some(s)) => s,
        Ok(None) => return not_found(&trace_id, "Survey not found"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to get survey"),
    };
    if !current.is_admin && survey.creator_id != current.id {
        return forbidden(&trace_id);
    }
    match state.store.delete_survey(&id).await {
        Ok(true) => {
            record_log(&state, &trace_id, current.log_entry("survey", "delete", Some(&id))).await;
            success_empty_response(StatusCode::OK, &trace_id, "Survey deleted")
        }
        Ok(false) => not_found(&trace_id, "Survey not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to delete survey"),
    }
}

/// 提交调研单。
///
/// 按模板校验答案，校验失败返回 400 validation_failed 并在 data 中给出字段错误；
/// 通过后标记完成、生成评估报告并通知创建人与售前负责人。
#[utoipa::path(
    post,
    path = "/v1/surveys/{id}/submit",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "调研单 ID")),
    responses(
        (status = 200, description = "已提交，返回含报告的调研单", body = Survey),
        (status = 400, description = "答案校验失败", body = Vec<FieldError>),
        (status = 403, description = "无权访问", body = ApiError),
        (status = 404, description = "调研单不存在", body = ApiError),
        (status = 409, description = "调研单已完成", body = ApiError)
    )
)]
async fn submit_survey(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = match load_accessible(&state, &trace_id, &current, &id).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    if survey.status == SurveyStatus::Completed {
        return survey_completed(&trace_id);
    }
    let Some(template) = template::get_template(&survey.template_id) else {
        return bad_request(&trace_id, "template does not exist");
    };
    let empty = Map::new();
    let answers = survey.answers.as_object().unwrap_or(&empty);
    let errors = template::validate_answers(template, answers);
    if !errors.is_empty() {
        return error_response_with_data(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "validation_failed",
            "Survey answers failed validation",
            Some(errors),
        );
    }

    let completed = match state.store.complete_survey(&id).await {
        Ok(Some(s)) => s,
        Ok(None) => return not_found(&trace_id, "Survey not found"),
        Err(e) => match e.downcast_ref::<emsurvey_storage::StorageError>() {
            Some(emsurvey_storage::StorageError::Rejected(_)) => return survey_completed(&trace_id),
            _ => return storage_error(&trace_id, &e, "Failed to complete survey"),
        },
    };
    tracing::info!(survey_id = %id, "Survey submitted");

    let with_report = match build_report(&state, &completed).await {
        Ok(s) => s,
        Err(e) => return storage_error(&trace_id, &e, "Failed to store assessment report"),
    };
    if let Some(ref report) = with_report.report {
        notify_report_ready(&state, &with_report, report).await;
    }
    record_log(&state, &trace_id, current.log_entry("survey", "submit", Some(&id))).await;
    success_response(StatusCode::OK, &trace_id, with_report)
}

/// 获取调研单评估报告。
#[utoipa::path(
    get,
    path = "/v1/surveys/{id}/report",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "调研单 ID")),
    responses(
        (status = 200, description = "评估报告", body = AssessmentReport),
        (status = 404, description = "调研单或报告不存在", body = ApiError)
    )
)]
async fn get_report(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match load_accessible(&state, &trace_id, &current, &id).await {
        Ok(Survey {
            report: Some(report),
            ..
        }) => success_response(StatusCode::OK, &trace_id, report),
        Ok(_) => not_found(&trace_id, "Report not generated yet"),
        Err(resp) => resp,
    }
}

/// 重新生成评估报告（仅已完成的调研单）。
#[utoipa::path(
    post,
    path = "/v1/surveys/{id}/report",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "调研单 ID")),
    responses(
        (status = 200, description = "新的评估报告", body = AssessmentReport),
        (status = 404, description = "调研单不存在", body = ApiError),
        (status = 409, description = "调研单尚未提交", body = ApiError)
    )
)]
async fn regenerate_report(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = match load_accessible(&state, &trace_id, &current, &id).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    if survey.status != SurveyStatus::Completed {
        return error_response(
            StatusCode::CONFLICT,
            &trace_id,
            "conflict",
            "Survey must be submitted before generating a report",
        );
    }
    let updated = match build_report(&state, &survey).await {
        Ok(s) => s,
        Err(e) => return storage_error(&trace_id, &e, "Failed to store assessment report"),
    };
    record_log(
        &state,
        &trace_id,
        current.log_entry("survey", "regenerate_report", Some(&id)),
    )
    .await;
    match updated.report {
        Some(report) => success_response(StatusCode::OK, &trace_id, report),
        None => not_found(&trace_id, "Report not generated yet"),
    }
}

/// 以 HTML 页面形式导出评估报告。
#[utoipa::path(
    get,
    path = "/v1/surveys/{id}/report/html",
    tag = "Surveys",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "调研单 ID")),
    responses(
        (status = 200, description = "报告 HTML", body = String, content_type = "text/html"),
        (status = 404, description = "调研单或报告不存在", body = ApiError)
    )
)]
async fn report_html(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let survey = match load_accessible(&state, &trace_id, &current, &id).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(ref report) = survey.report else {
        return not_found(&trace_id, "Report not generated yet");
    };
    let html = ReportRenderer::render_html(&survey, report);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}

pub fn survey_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_surveys, create_survey))
        .routes(routes!(get_survey, update_survey, delete_survey))
        .routes(routes!(submit_survey))
        .routes(routes!(get_report, regenerate_report))
        .routes(routes!(report_html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn survey(creator: &str, presales: Option<&str>) -> Survey {
        let now = Utc::now();
        Survey {
            id: "s1".into(),
            title: "t".into(),
            customer_name: "c".into(),
            industry: None,
            region_code: None,
            template_id: DEFAULT_TEMPLATE_ID.into(),
            status: SurveyStatus::Draft,
            answers: Value::Object(Map::new()),
            report: None,
            creator_id: creator.into(),
            presales_id: presales.map(Into::into),
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn user(id: &str, is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: id.into(),
            username: id.into(),
            role_code: None,
            is_admin,
        }
    }

    #[test]
    fn access_rules() {
        let s = survey("u1", Some("u2"));
        assert!(can_access(&user("u1", false), &s));
        assert!(can_access(&user("u2", false), &s));
        assert!(!can_access(&user("u3", false), &s));
        assert!(can_access(&user("u3", true), &s));
    }
}
