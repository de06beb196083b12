mod common;

use axum::http::StatusCode;
use common::{
    assert_err_envelope, build_test_context, build_test_context_with_generator,
    complete_answers, create_user, login, login_and_get_token, request_json, request_no_body,
    request_text, role_id, FixedReportGenerator, TEST_JWT_SECRET,
};
use emsurvey_server::auth::Claims;
use emsurvey_server::region_seed;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn health_is_public_and_reports_storage() {
    let ctx = build_test_context().await.expect("test context should build");
    let (status, body, trace_id) = request_no_body(&ctx.app, "GET", "/v1/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err_code"], 0);
    assert_eq!(body["data"]["storage_status"], "ok");
    assert_eq!(body["data"]["ai_enabled"], false);
    assert_eq!(trace_id.as_deref(), body["trace_id"].as_str());
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_missing_token() {
    let ctx = build_test_context().await.expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"username": "admin", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1002);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"username": "", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/surveys", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1002);

    let (status, _, _) =
        request_no_body(&ctx.app, "GET", "/v1/surveys", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_current_user_with_role() {
    let ctx = build_test_context().await.expect("test context should build");
    let token = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["role_code"], "admin");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn password_change_revokes_existing_tokens() {
    let ctx = build_test_context().await.expect("test context should build");
    let token = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/auth/password",
        Some(&token),
        Some(json!({"current_password": "bad-guess", "new_password": "newpass123"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1002);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/auth/password",
        Some(&token),
        Some(json!({"current_password": "changeme", "new_password": "newpass123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = login(&ctx.app, "admin", "newpass123").await;
    let (status, _, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&fresh)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn user_management_is_admin_only_and_rejects_duplicates() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;
    let sales_id = create_user(&ctx.app, &admin, "sales01", "sales123", "sales").await;

    let sales_role = role_id(&ctx.app, &admin, "sales").await;
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/users",
        Some(&admin),
        Some(json!({"username": "sales01", "password": "another1", "role_id": sales_role})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1005);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/users",
        Some(&admin),
        Some(json!({"username": "ghost", "password": "ghost123", "role_id": "missing"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let sales = login(&ctx.app, "sales01", "sales123").await;
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/users", Some(&sales)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_err_envelope(&body, 1006);

    // 非管理员可以查看自己
    let (status, _, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/users/{sales_id}"),
        Some(&sales),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/users?username__contains=sales&limit=10",
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["limit"], 10);
    assert_eq!(body["data"]["items"][0]["username"], "sales01");

    // 禁用后旧 Token 失效
    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/users/{sales_id}"),
        Some(&admin),
        Some(json!({"enabled": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&sales)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_cannot_delete_self() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;
    let (_, me, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&admin)).await;
    let admin_id = me["data"]["id"].as_str().expect("id should exist").to_string();

    let (status, body, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/users/{admin_id}"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
}

#[tokio::test]
async fn admin_cannot_drop_own_admin_role() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;
    let (_, me, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&admin)).await;
    let admin_id = me["data"]["id"].as_str().expect("id should exist").to_string();
    let sales_role = role_id(&ctx.app, &admin, "sales").await;
    let admin_role = role_id(&ctx.app, &admin, "admin").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/users/{admin_id}"),
        Some(&admin),
        Some(json!({"role_id": sales_role})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (_, me, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&admin)).await;
    assert_eq!(me["data"]["role_code"], "admin");

    // 保持管理员角色的更新照常生效
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/users/{admin_id}"),
        Some(&admin),
        Some(json!({"role_id": admin_role, "display_name": "总管"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["display_name"], "总管");
}

#[tokio::test]
async fn role_delete_guards_system_and_in_use_roles() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;

    let admin_role = role_id(&ctx.app, &admin, "admin").await;
    let (status, body, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/roles/{admin_role}"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_err_envelope(&body, 1006);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/roles",
        Some(&admin),
        Some(json!({"code": "auditor", "name": "审计员", "permissions": ["log:read"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let auditor_id = body["data"]["id"].as_str().expect("role id").to_string();

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/roles",
        Some(&admin),
        Some(json!({"code": "auditor", "name": "重复"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    create_user(&ctx.app, &admin, "audit01", "audit123", "auditor").await;
    let (status, body, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/roles/{auditor_id}"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1202);
}

#[tokio::test]
async fn dictionaries_are_seedable_and_protect_system_items() {
    let ctx = build_test_context().await.expect("test context should build");
    emsurvey_server::dictionary_seed::init_default_dictionaries(&ctx.state.store)
        .await
        .expect("seed should succeed");
    let admin = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/dictionaries/type/industry",
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().expect("items should be an array");
    assert!(items.iter().any(|i| i["dict_key"] == "manufacturing"));
    let system_id = items[0]["id"].as_str().expect("id").to_string();

    let (status, body, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/dictionaries/{system_id}"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_err_envelope(&body, 1006);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/dictionaries",
        Some(&admin),
        Some(json!({"dict_type": "no_such_type", "dict_key": "x", "dict_label": "X"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/dictionaries",
        Some(&admin),
        Some(json!({"dict_type": "industry", "dict_key": "mining", "dict_label": "采矿业"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["is_system"], false);
    let custom_id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/dictionaries",
        Some(&admin),
        Some(json!({"dict_type": "industry", "dict_key": "mining", "dict_label": "重复"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/dictionaries/{custom_id}"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn regions_form_a_tree_and_guard_children() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/regions?parent_code=110100", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let districts = body["data"].as_array().expect("array");
    assert!(districts.iter().any(|r| r["code"] == "110105"));

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/regions",
        Some(&admin),
        Some(json!({"code": "999999", "name": "无效", "parent_code": "000000"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/regions",
        Some(&admin),
        Some(json!({"code": "110199", "name": "测试园区", "parent_code": "110100"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["level"], 3);

    let (status, body, _) =
        request_no_body(&ctx.app, "DELETE", "/v1/regions/110100", Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1203);

    let (status, _, _) =
        request_no_body(&ctx.app, "DELETE", "/v1/regions/110199", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/regions",
        Some(&admin),
        Some(json!({"code": "110105001", "name": "某街道", "parent_code": "110105"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
}

#[tokio::test]
async fn deleted_preset_region_survives_restart_seeding() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;

    let (status, _, _) =
        request_no_body(&ctx.app, "DELETE", "/v1/regions/110108", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let inserted = region_seed::init_default_regions(&ctx.state.store)
        .await
        .expect("startup seeding should succeed");
    assert_eq!(inserted, 0);
    let (status, _, _) =
        request_no_body(&ctx.app, "GET", "/v1/regions/110108", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let inserted = region_seed::sync_preset_regions(&ctx.state.store)
        .await
        .expect("explicit sync should succeed");
    assert_eq!(inserted, 1);
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/regions/110108", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["level"], 3);
}

#[tokio::test]
async fn survey_lifecycle_produces_fallback_report_and_message() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/surveys",
        Some(&admin),
        Some(json!({"title": "", "customer_name": "某客户"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/surveys",
        Some(&admin),
        Some(json!({
            "title": "华东精密 EMS 调研",
            "customer_name": "华东精密制造有限公司",
            "industry": "manufacturing",
            "region_code": "110105"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "draft");
    let survey_id = body["data"]["id"].as_str().expect("survey id").to_string();

    // 空答案提交会返回逐字段错误
    let (status, body, _) = request_no_body(
        &ctx.app,
        "POST",
        &format!("/v1/surveys/{survey_id}/submit"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1007);
    let errors = body["data"].as_array().expect("field errors");
    assert!(errors.iter().any(|e| e["field"] == "company_name"));

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/surveys/{survey_id}/report"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/surveys/{survey_id}"),
        Some(&admin),
        Some(json!({"answers": complete_answers()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "filling");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "POST",
        &format!("/v1/surveys/{survey_id}/submit"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "submit failed: {body}");
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["report"]["source"], "fallback");
    let score = body["data"]["report"]["overall_score"]
        .as_u64()
        .expect("score should be numeric");
    assert!(score <= 100);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/surveys/{survey_id}/report"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["summary"].is_string());

    let (status, content_type, html) = request_text(
        &ctx.app,
        &format!("/v1/surveys/{survey_id}/report/html"),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap_or_default().starts_with("text/html"));
    assert!(html.contains("华东精密制造有限公司"));

    // 已完成的调研单不可再修改或重复提交
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/surveys/{survey_id}"),
        Some(&admin),
        Some(json!({"title": "改名"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1201);

    let (status, _, _) = request_no_body(
        &ctx.app,
        "POST",
        &format!("/v1/surveys/{survey_id}/submit"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "POST",
        &format!("/v1/surveys/{survey_id}/report"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "fallback");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/messages/unread-count",
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["unread"].as_u64().unwrap_or(0) >= 1);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/messages?unread_only=true", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().expect("messages");
    assert!(items
        .iter()
        .any(|m| m["msg_type"] == "report" && m["related_id"] == survey_id.as_str()));

    let (status, _, _) =
        request_no_body(&ctx.app, "POST", "/v1/messages/read-all", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/messages/unread-count",
        Some(&admin),
    )
    .await;
    assert_eq!(body["data"]["unread"], 0);
}

#[tokio::test]
async fn surveys_are_visible_only_to_creator_presales_and_admin() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;
    create_user(&ctx.app, &admin, "sales_a", "pass_a1", "sales").await;
    create_user(&ctx.app, &admin, "sales_b", "pass_b1", "sales").await;
    let sales_a = login(&ctx.app, "sales_a", "pass_a1").await;
    let sales_b = login(&ctx.app, "sales_b", "pass_b1").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/surveys",
        Some(&sales_a),
        Some(json!({"title": "A 的调研", "customer_name": "客户 A"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let survey_id = body["data"]["id"].as_str().expect("id").to_string();

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/surveys/{survey_id}"),
        Some(&sales_b),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_err_envelope(&body, 1006);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/surveys", Some(&sales_b)).await;
    assert_eq!(body["data"]["total"], 0);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/surveys", Some(&admin)).await;
    assert_eq!(body["data"]["total"], 1);

    let (status, _, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/surveys?status__eq=bogus",
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn operation_logs_record_logins_and_are_admin_only() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;
    create_user(&ctx.app, &admin, "viewer", "viewer1", "sales").await;
    let viewer = login(&ctx.app, "viewer", "viewer1").await;

    let (status, _, _) = request_no_body(&ctx.app, "GET", "/v1/logs", Some(&viewer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/logs?module__eq=auth&action__eq=login",
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["total"].as_u64().unwrap_or(0) >= 2);
    assert!(body["data"]["items"][0]["trace_id"].is_string());
}

#[tokio::test]
async fn templates_and_products_are_listed() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/templates", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], emsurvey_common::template::DEFAULT_TEMPLATE_ID);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/products",
        Some(&admin),
        Some(json!({"name": "碳排放核算", "category": "carbon", "industries": ["steel"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["enabled"], true);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/products",
        Some(&admin),
        Some(json!({"name": "碳排放核算", "category": "carbon"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/products?category__eq=carbon",
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let ctx = build_test_context().await.expect("test context should build");
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/surveys/{id}/submit"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn expired_token_is_reported_as_token_expired() {
    let ctx = build_test_context().await.expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;
    let (_, me, _) = request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&admin)).await;

    // 超出默认 60 秒校验余量
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: me["data"]["id"].as_str().expect("id").to_string(),
        username: "admin".to_string(),
        tv: 0,
        iat: now - 7200,
        exp: now - 3600,
    };
    let expired = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("token should encode");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/auth/me", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1003);
}

#[tokio::test]
async fn submit_stores_generated_ai_report() {
    let ctx = build_test_context_with_generator(Some(Arc::new(FixedReportGenerator)))
        .await
        .expect("test context should build");
    let admin = login_and_get_token(&ctx.app).await;

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/health", None).await;
    assert_eq!(body["data"]["ai_enabled"], true);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/surveys",
        Some(&admin),
        Some(json!({
            "title": "园区 EMS 调研",
            "customer_name": "滨江产业园",
            "answers": complete_answers()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "draft");
    let survey_id = body["data"]["id"].as_str().expect("survey id").to_string();

    let (status, body, _) = request_no_body(
        &ctx.app,
        "POST",
        &format!("/v1/surveys/{survey_id}/submit"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "submit failed: {body}");
    assert_eq!(body["data"]["report"]["source"], "ai");
    assert_eq!(body["data"]["report"]["provider"], "fixed");
    assert_eq!(body["data"]["report"]["overall_score"], 86);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/surveys/{survey_id}/report"),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "ai");
    assert_eq!(body["data"]["summary"], "滨江产业园 具备良好的能源管理基础");
}
