use crate::state::AppState;
use crate::{api, auth, logging};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "emsurvey API",
        description = "EMS 售前调研与评估报告 REST API",
    ),
    tags(
        (name = "Health", description = "服务健康检查"),
        (name = "Auth", description = "登录与当前用户"),
        (name = "Users", description = "用户管理"),
        (name = "Roles", description = "角色管理"),
        (name = "Dictionaries", description = "系统字典管理"),
        (name = "Regions", description = "行政区划"),
        (name = "Templates", description = "问卷模板"),
        (name = "Surveys", description = "客户调研单与评估报告"),
        (name = "Products", description = "产品能力库"),
        (name = "Messages", description = "站内消息"),
        (name = "Logs", description = "系统操作日志")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

/// 配置了 origins 时仅放行列表中的来源，否则允许任意来源
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (login_router, login_spec) = api::auth_routes().split_for_parts();
    let (protected_router, protected_spec) = api::protected_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(login_spec);
    merged_spec.merge(protected_spec);

    let cors = cors_layer(&state.config.cors_allowed_origins);

    public_router
        .merge(login_router)
        .merge(protected_router.layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_middleware,
        )))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/v1/openapi.json", merged_spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
