use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header::ORIGIN};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashSet;
use std::sync::Arc;

/// Origin allow-set consulted before any handler runs
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Arc<HashSet<String>>,
}

impl OriginPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Arc::new(origins.into_iter().map(Into::into).collect()),
        }
    }

    /// A missing `Origin` header is allowed; otherwise it must be in the set
    pub fn is_allowed(&self, origin: Option<&HeaderValue>) -> bool {
        match origin {
            None => true,
            Some(value) => value
                .to_str()
                .map(|origin| self.allowed.contains(origin))
                .unwrap_or(false),
        }
    }
}

/// Reject requests from unknown origins with an empty 500 response
pub async fn reject_disallowed_origin(
    State(policy): State<OriginPolicy>,
    request: Request,
    next: Next,
) -> Response {
    if policy.is_allowed(request.headers().get(ORIGIN)) {
        return next.run(request).await;
    }

    tracing::warn!(
        origin = ?request.headers().get(ORIGIN),
        path = %request.uri().path(),
        "Origin not allowed by CORS"
    );
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OriginPolicy {
        OriginPolicy::new(["http://localhost", "https://localhost"])
    }

    #[test]
    fn test_absent_origin_is_allowed() {
        assert!(policy().is_allowed(None));
    }

    #[test]
    fn test_listed_origin_is_allowed() {
        assert!(policy().is_allowed(Some(&HeaderValue::from_static("https://localhost"))));
    }

    #[test]
    fn test_unlisted_origins_are_rejected() {
        let policy = policy();
        assert!(!policy.is_allowed(Some(&HeaderValue::from_static("https://evil.example"))));
        // Matching is exact, including scheme and port
        assert!(!policy.is_allowed(Some(&HeaderValue::from_static("http://localhost:3000"))));
        assert!(!policy.is_allowed(Some(&HeaderValue::from_static(""))));
        assert!(!policy.is_allowed(Some(&HeaderValue::from_bytes(b"\xff").unwrap())));
    }
}
