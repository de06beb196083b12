use axum::body::Body;
use axum::extract::{Extension, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use emsurvey_common::types::{
    ChangePasswordRequest, LoginRequest, LoginResponse, NewSystemLog, User,
};
use emsurvey_storage::auth::{hash_password, verify_password};
use emsurvey_storage::store::role::ADMIN_ROLE;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::{
    bad_request, error_response, record_log, storage_error, success_empty_response,
    success_response, ApiError,
};
use crate::logging::TraceId;
use crate::state::AppState;

/// 用户名、密码最小长度
pub const MIN_CREDENTIAL_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    /// token version，改密后递增
    pub tv: i64,
    pub iat: u64,
    pub exp: u64,
}

/// 当前登录用户（由 JWT 中间件写入请求扩展）
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role_code: Option<String>,
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role_code: user.role_code.clone(),
            is_admin: user.role_code.as_deref() == Some(ADMIN_ROLE),
        }
    }

    /// 以当前用户身份构造一条操作日志
    pub fn log_entry(&self, module: &str, action: &str, target_id: Option<&str>) -> NewSystemLog {
        NewSystemLog {
            user_id: Some(self.id.clone()),
            username: Some(self.username.clone()),
            module: module.to_string(),
            action: action.to_string(),
            target_id: target_id.map(str::to_string),
            ..Default::default()
        }
    }
}

pub fn create_token(
    secret: &str,
    user_id: &str,
    username: &str,
    token_version: i64,
    expire_secs: u64,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        tv: token_version,
        iat: now,
        exp: now + expire_secs,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn auth_error(trace_id: &str, code: &str, msg: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, trace_id, code, msg)
}

/// JWT 鉴权中间件
///
/// 校验签名与有效期后回查用户：用户不存在、已禁用或 token version
/// 不一致（已改密）均视为未认证。
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let token = match req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        None => return auth_error(&trace_id, "unauthorized", "missing authorization header"),
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return auth_error(&trace_id, "unauthorized", "invalid authorization header"),
        },
    };

    let claims = match validate_token(&state.jwt_secret, &token) {
        Ok(claims) => claims,
        Err(e) => {
            if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) {
                return auth_error(&trace_id, "token_expired", "token expired");
            }
            return auth_error(&trace_id, "unauthorized", "invalid token");
        }
    };

    let user = match state.store.get_user_by_id(&claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => return auth_error(&trace_id, "unauthorized", "user no longer exists"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to load user for token"),
    };
    if !user.enabled {
        return auth_error(&trace_id, "unauthorized", "user is disabled");
    }
    if user.token_version != claims.tv {
        return auth_error(&trace_id, "unauthorized", "token has been revoked");
    }

    req.extensions_mut().insert(CurrentUser::from_user(&user));
    next.run(req).await
}

/// 登录接口
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = LoginResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 401, description = "用户名或密码错误", body = ApiError)
    )
)]
pub async fn login(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return bad_request(&trace_id, "username and password are required");
    }

    let user = match state.store.get_user_by_username(req.username.trim()).await {
        Ok(Some(u)) => u,
        Ok(None) => return auth_error(&trace_id, "unauthorized", "invalid credentials"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to query user"),
    };

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        _ => return auth_error(&trace_id, "unauthorized", "invalid credentials"),
    }
    if !user.enabled {
        return auth_error(&trace_id, "unauthorized", "user is disabled");
    }

    let token = match create_token(
        &state.jwt_secret,
        &user.id,
        &user.username,
        user.token_version,
        state.token_expire_secs,
    ) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create token");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "internal_error",
                "internal error",
            );
        }
    };

    if let Err(e) = state.store.touch_last_login(&user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to update last login time");
    }
    let current = CurrentUser::from_user(&user);
    record_log(&state, &trace_id, current.log_entry("auth", "login", Some(&user.id))).await;
    tracing::info!(username = %user.username, "User logged in");

    success_response(
        StatusCode::OK,
        &trace_id,
        LoginResponse {
            access_token: token,
            expires_in: state.token_expire_secs,
            user,
        },
    )
}

/// 获取当前登录用户信息。
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "当前用户", body = User),
        (status = 401, description = "未认证", body = ApiError)
    )
)]
pub async fn me(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.get_user_by_id(&current.id).await {
        Ok(Some(user)) => success_response(StatusCode::OK, &trace_id, user),
        Ok(None) => crate::api::not_found(&trace_id, "User not found"),
        Err(e) => storage_error(&trace_id, &e, "Failed to load current user"),
    }
}

/// 修改当前用户密码。成功后所有旧 token 失效，需要重新登录。
#[utoipa::path(
    post,
    path = "/v1/auth/password",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "密码已修改"),
        (status = 400, description = "新密码不合法", body = ApiError),
        (status = 401, description = "当前密码错误或未认证", body = ApiError)
    )
)]
pub async fn change_password(
    Extension(trace_id): Extension<TraceId>,
    Extension(current): Extension<CurrentUser>,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    if req.new_password.chars().count() < MIN_CREDENTIAL_LEN {
        return bad_request(&trace_id, "new password must be at least 4 characters");
    }

    let user = match state.store.get_user_by_id(&current.id).await {
        Ok(Some(u)) => u,
        Ok(None) => return auth_error(&trace_id, "unauthorized", "user no longer exists"),
        Err(e) => return storage_error(&trace_id, &e, "Failed to load user"),
    };
    match verify_password(&req.current_password, &user.password_hash) {
        Ok(true) => {}
        _ => return auth_error(&trace_id, "unauthorized", "current password is incorrect"),
    }

    let hash = match hash_password(&req.new_password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "Failed to hash password");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "internal_error",
                "internal error",
            );
        }
    };
    match state.store.update_user_password_hash(&current.id, &hash).await {
        Ok(_) => {
            record_log(
                &state,
                &trace_id,
                current.log_entry("auth", "change_password", Some(&current.id)),
            )
            .await;
            success_empty_response(StatusCode::OK, &trace_id, "Password changed")
        }
        Err(e) => storage_error(&trace_id, &e, "Failed to update password"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_keeps_version() {
        let token = create_token("secret", "42", "alice", 3, 60).unwrap();
        let claims = validate_token("secret", &token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.tv, 3);
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("secret", "42", "alice", 0, 60).unwrap();
        assert!(validate_token("other", &token).is_err());
    }

    #[test]
    fn admin_flag_follows_role_code() {
        let now = chrono::Utc::now();
        let mut user = User {
            id: "1".into(),
            username: "root".into(),
            password_hash: String::new(),
            token_version: 0,
            display_name: None,
            email: None,
            phone: None,
            role_id: "r".into(),
            role_code: Some("admin".into()),
            role_name: Some("系统管理员".into()),
            enabled: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(CurrentUser::from_user(&user).is_admin);
        user.role_code = Some("presales".into());
        user.role_name = Some("售前管理员".into());
        assert!(!CurrentUser::from_user(&user).is_admin);
    }
}
