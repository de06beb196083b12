use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;

/// Trace id of the current request, stored in request extensions.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// 16 hex chars from 8 random bytes.
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

const MAX_BODY_LOG_CHARS: usize = 200;

/// Request bodies read for logging are capped at 1 MiB.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Cut `bytes` to at most `max` bytes on a char boundary.
fn truncate_body(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.len() > max => {
            let mut end = max;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

fn format_elapsed(elapsed_us: u128) -> String {
    if elapsed_us < 1000 {
        format!("{elapsed_us}µs")
    } else if elapsed_us < 1_000_000 {
        format!("{}ms", elapsed_us / 1000)
    } else {
        format!("{:.1}s", elapsed_us as f64 / 1_000_000.0)
    }
}

/// 登录、改密、重置密码等接口的请求/响应体不落日志
fn is_sensitive_path(path: &str) -> bool {
    path.starts_with("/v1/auth/")
        || (path.starts_with("/v1/users/") && path.ends_with("/password"))
}

fn log_response(trace_id: &str, status: StatusCode, elapsed: &str, body: &str) {
    let status_code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(trace_id = %trace_id, status = status_code, elapsed = %elapsed, body = %body, "<-- response");
    } else if status.is_client_error() {
        tracing::warn!(trace_id = %trace_id, status = status_code, elapsed = %elapsed, body = %body, "<-- response");
    } else if body.is_empty() {
        tracing::info!(trace_id = %trace_id, status = status_code, elapsed = %elapsed, "<-- response");
    } else {
        tracing::info!(trace_id = %trace_id, status = status_code, elapsed = %elapsed, body = %body, "<-- response");
    }
}

/// Request/response logging middleware.
///
/// Every request gets a [`TraceId`] extension and an `X-Trace-Id`
/// response header. Swagger UI assets pass through unlogged.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path().to_string();

    if path.starts_with("/docs") {
        return next.run(req).await;
    }

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let is_sensitive = is_sensitive_path(&path);

    let has_body = !is_sensitive && matches!(method.as_str(), "POST" | "PUT" | "PATCH");
    let (req, req_body_snippet) = if has_body {
        let (parts, body) = req.into_parts();
        let body_bytes = axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES)
            .await
            .unwrap_or_default();
        let snippet = if body_bytes.is_empty() {
            String::new()
        } else {
            truncate_body(&body_bytes, MAX_BODY_LOG_CHARS)
        };
        (Request::from_parts(parts, Body::from(body_bytes)), snippet)
    } else {
        (req, String::new())
    };

    let url = match uri.query() {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.clone(),
    };

    if req_body_snippet.is_empty() {
        tracing::info!(trace_id = %trace_id, method = %method, path = %url, ua = %user_agent, "--> request");
    } else {
        tracing::info!(
            trace_id = %trace_id,
            method = %method,
            path = %url,
            body = %req_body_snippet,
            ua = %user_agent,
            "--> request"
        );
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = format_elapsed(start.elapsed().as_micros());
    let status = response.status();

    let (parts, body) = response.into_parts();
    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let body_snippet = if !is_sensitive && is_json && !body_bytes.is_empty() {
        truncate_body(&body_bytes, MAX_BODY_LOG_CHARS)
    } else {
        String::new()
    };

    log_response(&trace_id, status, &elapsed, &body_snippet);

    let mut response = Response::from_parts(parts, Body::from(body_bytes));
    if let Ok(val) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_is_16_hex_chars() {
        let id = generate_trace_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "调研".repeat(100);
        let out = truncate_body(s.as_bytes(), 200);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
        assert_eq!(truncate_body(b"short", 200), "short");
        assert_eq!(truncate_body(&[0xff, 0xfe], 200), "<non-utf8 body>");
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(999), "999µs");
        assert_eq!(format_elapsed(25_000), "25ms");
        assert_eq!(format_elapsed(1_500_000), "1.5s");
    }

    #[test]
    fn sensitive_paths() {
        assert!(is_sensitive_path("/v1/auth/login"));
        assert!(is_sensitive_path("/v1/users/42/password"));
        assert!(!is_sensitive_path("/v1/users/42"));
        assert!(!is_sensitive_path("/v1/surveys"));
    }
}
