//! In-process HTTP scenarios for a quayside [`Router`]
//!
//! Requests are driven through the router with `oneshot`, so the full middleware
//! stack (session, cookie fix, CORS guard) runs without binding a socket.
//!
//! ```rust,ignore
//! let app = server.router().await?;
//!
//! testing::post(app, "/graphql")
//!     .graphql("{ info }")
//!     .execute()
//!     .await
//!     .assert_ok()
//!     .assert_body_json(json!({"data": {"info": "This is the API of a special app"}}))
//!     .await;
//! ```

use axum::{
    Router,
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header, response::Parts},
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceExt;

/// Builder for a single request against a router
pub struct Scenario {
    app: Router,
    request: Request<Body>,
}

impl Scenario {
    pub fn new(app: Router) -> Self {
        let mut request = Request::new(Body::empty());
        *request.uri_mut() = "/".parse().unwrap();
        Self { app, request }
    }

    pub fn method(mut self, method: Method) -> Self {
        *self.request.method_mut() = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        *self.request.uri_mut() = uri.parse().unwrap();
        self
    }

    /// Add a header, keeping any existing values for the same name
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request.headers_mut().append(
            HeaderName::from_bytes(key.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    /// Send `Origin: {origin}`
    pub fn origin(self, origin: &str) -> Self {
        self.header("origin", origin)
    }

    /// Send a `Cookie` header with the `name=value` pair of a `Set-Cookie` value
    pub fn cookie_from(self, set_cookie: &str) -> Self {
        let pair = set_cookie.split(';').next().unwrap_or_default().trim().to_string();
        self.header("cookie", &pair)
    }

    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        let json = serde_json::to_string(body).unwrap();
        *self.request.body_mut() = Body::from(json);
        self.request
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// JSON body `{"query": query}`
    pub fn graphql(self, query: &str) -> Self {
        self.json_body(&json!({ "query": query }))
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        *self.request.body_mut() = Body::from(body.into());
        self
    }

    pub async fn execute(self) -> ScenarioAssert {
        let response = self.app.oneshot(self.request).await.unwrap();
        ScenarioAssert { response }
    }
}

/// Assertions over the response of a [`Scenario`]
pub struct ScenarioAssert {
    response: Response,
}

impl ScenarioAssert {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_server_error(self) -> Self {
        self.assert_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .response
            .headers()
            .get(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key))
            .to_str()
            .unwrap();
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    pub fn assert_no_header(self, key: &str) -> Self {
        assert!(
            self.response.headers().get(key).is_none(),
            "Header '{}' should be absent",
            key
        );
        self
    }

    /// Every value of a header, in order
    pub fn header_values(&self, key: &str) -> Vec<String> {
        self.response
            .headers()
            .get_all(key)
            .iter()
            .map(|v| v.to_str().unwrap_or("<invalid>").to_string())
            .collect()
    }

    /// All `Set-Cookie` values
    pub fn set_cookies(&self) -> Vec<String> {
        self.header_values(header::SET_COOKIE.as_str())
    }

    /// Accepts `application/json` as well as `application/*+json` types
    pub fn assert_json_content_type(self) -> Self {
        let content_type = self
            .response
            .headers()
            .get(header::CONTENT_TYPE)
            .expect("Content-Type header not found")
            .to_str()
            .unwrap();
        assert!(
            content_type.starts_with("application/") && content_type.contains("json"),
            "Expected JSON content type, got: {}",
            content_type
        );
        self
    }

    pub async fn body_bytes(self) -> Vec<u8> {
        axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    pub async fn body_string(self) -> String {
        String::from_utf8(self.body_bytes().await).unwrap()
    }

    pub async fn json<T: for<'de> Deserialize<'de>>(self) -> T {
        let bytes = self.body_bytes().await;
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    }

    /// Assert the whole JSON body equals `expected`
    pub async fn assert_body_json(self, expected: serde_json::Value) -> Self {
        let (parts, bytes) = self.split().await;
        let actual: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!("Body is not JSON ({}): {}", e, String::from_utf8_lossy(&bytes))
        });
        assert_eq!(actual, expected, "JSON body mismatch");
        Self::rebuild(parts, bytes)
    }

    /// Assert a JSON field, addressed with dot notation (`data.info`, `errors.0.message`)
    pub async fn assert_json_field(self, path: &str, expected: serde_json::Value) -> Self {
        let (parts, bytes) = self.split().await;
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let actual =
            json_path_get(&json, path).unwrap_or_else(|| panic!("Path '{}' not found in JSON", path));
        assert_eq!(actual, &expected, "JSON path '{}' value mismatch", path);

        Self::rebuild(parts, bytes)
    }

    pub async fn assert_empty_body(self) -> Self {
        let (parts, bytes) = self.split().await;
        assert!(
            bytes.is_empty(),
            "Expected an empty body, got: {}",
            String::from_utf8_lossy(&bytes)
        );
        Self::rebuild(parts, bytes)
    }

    pub async fn assert_contains(self, text: &str) -> Self {
        let (parts, bytes) = self.split().await;
        let body = String::from_utf8_lossy(&bytes);
        assert!(
            body.contains(text),
            "Response body does not contain '{}'. Body: {}",
            text,
            body
        );
        Self::rebuild(parts, bytes)
    }

    pub fn response(self) -> Response {
        self.response
    }

    async fn split(self) -> (Parts, Vec<u8>) {
        let (parts, body) = self.response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec();
        (parts, bytes)
    }

    fn rebuild(parts: Parts, bytes: Vec<u8>) -> Self {
        Self {
            response: Response::from_parts(parts, Body::from(bytes)),
        }
    }
}

fn json_path_get<'a>(json: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = json;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(part)?,
        };
    }
    Some(current)
}

pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}

pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}

/// CORS preflight for `uri` from `origin`
pub fn preflight(app: Router, uri: &str, origin: &str) -> Scenario {
    Scenario::new(app)
        .method(Method::OPTIONS)
        .uri(uri)
        .origin(origin)
        .header("access-control-request-method", "POST")
}
