#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use emsurvey_ai::{ReportGenerator, ReportInput};
use emsurvey_common::types::{AssessmentReport, LoginRequest, ReadinessLevel, ReportSource};
use emsurvey_server::app;
use emsurvey_server::config::ServerConfig;
use emsurvey_server::state::AppState;
use emsurvey_storage::auth::hash_password;
use emsurvey_storage::store::role::ADMIN_ROLE;
use emsurvey_storage::store::user::NewUser;
use emsurvey_storage::SurveyStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "changeme";
pub const TEST_JWT_SECRET: &str = "test-secret";

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context() -> Result<TestContext> {
    build_test_context_with_generator(None).await
}

/// Generator that always succeeds with a fixed high-readiness report.
pub struct FixedReportGenerator;

#[async_trait]
impl ReportGenerator for FixedReportGenerator {
    fn provider(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed-model"
    }

    async fn generate(&self, input: &ReportInput<'_>) -> Result<AssessmentReport> {
        Ok(AssessmentReport {
            overall_score: 86,
            level: ReadinessLevel::High,
            summary: format!("{} 具备良好的能源管理基础", input.survey.customer_name),
            highlights: vec!["已部署电力监控系统".to_string()],
            risks: vec!["部分车间缺少分项计量".to_string()],
            recommended_products: vec!["能效分析与对标".to_string()],
            suggestions: vec!["补齐重点设备表计".to_string()],
            source: ReportSource::Ai,
            provider: Some(self.provider().to_string()),
            model: Some(self.model_name().to_string()),
            generated_at: Utc::now(),
        })
    }
}

pub async fn build_test_context_with_generator(
    report_generator: Option<Arc<dyn ReportGenerator>>,
) -> Result<TestContext> {
    emsurvey_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let db_url = format!("sqlite://{}/test.db?mode=rwc", temp_dir.path().display());
    let store = Arc::new(SurveyStore::new(&db_url, temp_dir.path()).await?);
    store.ensure_builtin_roles().await?;
    store.ensure_preset_regions().await?;

    let admin_role = store
        .get_role_by_code(ADMIN_ROLE)
        .await?
        .ok_or_else(|| anyhow::anyhow!("admin role should exist"))?;
    let password_hash = hash_password(ADMIN_PASSWORD)?;
    store
        .create_user(&NewUser {
            username: ADMIN_USERNAME,
            password_hash: &password_hash,
            display_name: None,
            email: None,
            phone: None,
            role_id: &admin_role.id,
            enabled: true,
        })
        .await?;

    let mut config = ServerConfig::default();
    config.database.data_dir = temp_dir.path().to_string_lossy().to_string();

    let state = AppState {
        store,
        report_generator,
        start_time: Utc::now(),
        jwt_secret: Arc::new(TEST_JWT_SECRET.to_string()),
        token_expire_secs: 3600,
        config: Arc::new(config),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

async fn read_response(resp: axum::response::Response) -> (StatusCode, Value, Option<String>) {
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, json, trace_id)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    read_response(resp).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let req = builder.body(Body::empty()).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    read_response(resp).await
}

/// Fetch a non-JSON body (e.g. the HTML report) with its content type.
pub async fn request_text(
    app: &axum::Router,
    uri: &str,
    token: &str,
) -> (StatusCode, Option<String>, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request should build");
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, content_type, String::from_utf8_lossy(&bytes).to_string())
}

pub async fn login(app: &axum::Router, username: &str, password: &str) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/auth/login",
        None,
        Some(
            serde_json::to_value(LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .expect("login request should serialize"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    assert_eq!(body["err_code"], 0);
    body["data"]["access_token"]
        .as_str()
        .expect("token should exist")
        .to_string()
}

pub async fn login_and_get_token(app: &axum::Router) -> String {
    login(app, ADMIN_USERNAME, ADMIN_PASSWORD).await
}

pub async fn role_id(app: &axum::Router, token: &str, code: &str) -> String {
    let (status, body, _) = request_no_body(app, "GET", "/v1/roles", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]
        .as_array()
        .expect("roles should be an array")
        .iter()
        .find(|r| r["code"] == code)
        .and_then(|r| r["id"].as_str())
        .expect("role should exist")
        .to_string()
}

/// Create a user with the given role through the API and return its id.
pub async fn create_user(
    app: &axum::Router,
    admin_token: &str,
    username: &str,
    password: &str,
    role_code: &str,
) -> String {
    let rid = role_id(app, admin_token, role_code).await;
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/users",
        Some(admin_token),
        Some(json!({
            "username": username,
            "password": password,
            "role_id": rid,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create user failed: {body}");
    body["data"]["id"]
        .as_str()
        .expect("user id should exist")
        .to_string()
}

/// Answers that satisfy every required field of the default template.
pub fn complete_answers() -> Value {
    json!({
        "company_name": "华东精密制造有限公司",
        "industry": "manufacturing",
        "contact_name": "王工",
        "contact_phone": "13800138000",
        "energy_types": ["electricity", "gas"],
        "annual_electricity": 1200,
        "metering_coverage": "partial",
        "goals": ["cost_saving", "carbon"],
        "pain_points": "缺少分项计量，能耗成本无法分摊"
    })
}

pub fn assert_err_envelope(body: &Value, err_code: i64) {
    assert_eq!(body["err_code"], err_code, "unexpected envelope: {body}");
    assert!(body["err_msg"].is_string());
    assert!(body["trace_id"].is_string());
}
