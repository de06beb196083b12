use crate::api::pagination::PaginationParams;
use crate::api::{
    bad_request, ensure_admin, not_found, record_log, storage_error, success_empty_response,
    success_paginated_response, success_response, ApiError,
};
use crate::auth::CurrentUser;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use emsurvey_common::types::{Message, NewMessage, SendMessageRequest};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

const MESSAGE_TYPES: &[&str] = &["system", "report", "notice"];

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ListMessagesQuery {
    /// 是否仅返回未读消息（默认 false）
    #[param(required = false)]
    #[serde(default)]
    unread_only: bool,
    #[serde(flatten)]
    pagination: PaginationParams,
}

#[derive(Serialize, ToSchema)]
struct UnreadCount {
    unread: u64,
}

#[derive(Serialize, ToSchema)]
struct MarkedCount {
    /// 本次标记为已读的条数
    updated: u64,
}

/// 分页查询当前用户的站内消息。
#[utoipa::path(
    get,
    path = "/v1/messages",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(ListMessagesQuery),
    responses(
        (status = 200, description = "消息分页列表", body = Vec<Message>),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
async fn list_messages(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> impl IntoResponse {
    let limit = query.pagination.limit();
    let offset = query.pagination.offset();
    let total = match state
        .store
        .count_messages_for(&current.id, query.unread_only)
        .await
    {
        Ok(c) => c,
        Err(e) => return storage_error(&trace_id, &e, "Failed to count messages"),
    };
    match state
        .store
        .list_messages_for(&current.id, query.unread_only, limit, offset)
        .await
    {
        Ok(items) => success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset),
        Err(e) => storage_error(&trace_id, &e, "Failed to list messages"),
    }
}

/// 当前用户未读消息数。
#[utoipa::path(
    get,
    path = "/v1/messages/unread-count",
    tag = "Messages",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "未读数量", body = UnreadCount)
    )
)]
async fn unread_count(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.unread_message_count(&current.id).await {
        Ok(unread) => success_response(StatusCode::OK, &trace_id, UnreadCount { unread }),
        Err(e) => storage_error(&trace_id, &e, "Failed to count unread messages"),
    }
}

/// 发送站内消息（仅管理员）。
#[utoipa::path(
    post,
    path = "/v1/messages",
    tag = "Messages",
    security(("bearer_auth" = [])),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "消息已发送", body = Message),
        (status = 400, description = "请求参数错误或接收人不存在", body = ApiError),
        (status = 403, description = "无权限", body = ApiError)
    )
)]
async fn send_message(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    if let Err(resp) = ensure_admin(&current, &trace_id) {
        return resp;
    }
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return bad_request(&trace_id, "title and content are required");
    }
    let msg_type = req.msg_type.unwrap_or_else(|| "notice".to_string());
    if !MESSAGE_TYPES.contains(&msg_type.as_str()) {
        return bad_request(&trace_id, "msg_type must be one of system, report, notice");
    }
    match state.store.get_user_by_id(&req.recipient_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request(&trace_id, "recipient does not exist"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to look up recipient"),
    }
    let new = NewMessage {
        recipient_id: req.recipient_id,
        sender_id: Some(current.id.clone()),
        title: req.title,
        content: req.content,
        msg_type,
        related_id: req.related_id,
    };
    match state.store.insert_message(&new).await {
        Ok(message) => {
            record_log(&state, &trace_id, current.log_entry("message", "send", Some(&message.id)))
                .await;
            success_response(StatusCode::CREATED, &trace_id, message)
        }
        Err(e) => storage_error(&trace_id, &e, "Failed to send message"),
    }
}

/// 标记单条消息为已读。
#[utoipa::path(
    post,
    path = "/v1/messages/{id}/read",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "消息 ID")),
    responses(
        (status = 200, description = "已标记为已读"),
        (status = 404, description = "消息不存在", body = ApiError)
    )
)]
async fn mark_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.mark_message_read(&current.id, &id).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "Message marked as read"),
        Ok(false) => not_found(&trace_id, "Message not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to mark message read"),
    }
}

/// 全部标记为已读。
#[utoipa::path(
    post,
    path = "/v1/messages/read-all",
    tag = "Messages",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "标记条数", body = MarkedCount)
    )
)]
async fn mark_all_read(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.mark_all_messages_read(&current.id).await {
        Ok(updated) => success_response(StatusCode::OK, &trace_id, MarkedCount { updated }),
        Err(e) => storage_error(&trace_id, &e, "Failed to mark messages read"),
    }
}

/// 删除自己的消息。
#[utoipa::path(
    delete,
    path = "/v1/messages/{id}",
    tag = "Messages",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "消息 ID")),
    responses(
        (status = 200, description = "消息已删除"),
        (status = 404, description = "消息不存在", body = ApiError)
    )
)]
async fn delete_message(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_message_for(&current.id, &id).await {
        Ok(true) => success_empty_response(StatusCode::OK, &trace_id, "Message deleted"),
        Ok(false) => not_found(&trace_id, "Message not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to delete message"),
    }
}

pub fn message_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_messages, send_message))
        .routes(routes!(unread_count))
        .routes(routes!(mark_read))
        .routes(routes!(mark_all_read))
        .routes(routes!(delete_message))
}
