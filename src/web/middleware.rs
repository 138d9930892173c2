//! CORS middleware
//!
//! The operator console is a separate origin, so every response carries
//! CORS headers when the request origin is on the allow-list (`*` allows
//! any). Preflight requests short-circuit with 204.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

/// Parsed CORS allow-list.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: Vec<String>,
    allow_any: bool,
}

impl CorsPolicy {
    /// Parse a comma-separated origin list; `*` allows any origin.
    pub fn parse(allow_origins: &str) -> Self {
        let allowed: Vec<String> = allow_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let allow_any = allowed.iter().any(|o| o == "*");
        Self { allowed, allow_any }
    }

    /// Whether this origin may be echoed back.
    pub fn allows(&self, origin: &str) -> bool {
        self.allow_any || self.allowed.iter().any(|a| a == origin)
    }
}

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| policy.allows(o))
        .map(str::to_string);

    if req.method() == Method::OPTIONS {
        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(&mut res, origin.as_deref());
        return res;
    }

    let mut res = next.run(req).await;
    apply_cors_headers(&mut res, origin.as_deref());
    res
}

fn apply_cors_headers(res: &mut Response, allowed_origin: Option<&str>) {
    let Some(origin) = allowed_origin else {
        return;
    };
    if let Ok(v) = HeaderValue::from_str(origin) {
        res.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, v);
        res.headers_mut()
            .insert(header::VARY, HeaderValue::from_static("Origin"));
    }
    res.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    res.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type,X-Admin-Key"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_explicit_list() {
        let p = CorsPolicy::parse("http://localhost:5173, http://localhost:4173");
        assert!(p.allows("http://localhost:5173"));
        assert!(p.allows("http://localhost:4173"));
        assert!(!p.allows("http://evil.example"));
    }

    #[test]
    fn test_policy_wildcard() {
        let p = CorsPolicy::parse("*");
        assert!(p.allows("http://anywhere.example"));
    }

    #[test]
    fn test_policy_wildcard_in_list() {
        let p = CorsPolicy::parse("http://localhost:5173,*");
        assert!(p.allows("http://elsewhere.example"));
    }

    #[test]
    fn test_policy_empty() {
        let p = CorsPolicy::parse("");
        assert!(!p.allows("http://localhost:5173"));
    }
}
