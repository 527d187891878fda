//! Secure re-issue of the session cookie
//!
//! Browsers drop cross-site cookies marked `SameSite=None` unless they are also
//! `Secure`. The session layer leaves `Secure` off outside production, so this
//! layer appends a second, identically signed copy of the session cookie whose
//! `SameSite=None` attribute is followed by `;Secure`.

use super::config::{CookieOptions, SessionOptions};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Request, Response};
use cookie::{Cookie, CookieJar, Key};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Textually pair `SameSite=None` with `;Secure`
pub fn ensure_secure_same_site(serialized: &str) -> String {
    serialized.replace("SameSite=None", "SameSite=None;Secure")
}

struct FixConfig {
    name: String,
    key: Key,
    cookie: CookieOptions,
}

enum ResponseCookie {
    Set(String),
    Removed,
    Absent,
}

impl FixConfig {
    fn from_request(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| Cookie::split_parse_encoded(header.to_owned()))
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.name)
            .map(|cookie| cookie.value().to_owned())
    }

    fn from_response(&self, headers: &HeaderMap) -> ResponseCookie {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let Ok(cookie) = Cookie::parse_encoded(value.to_owned()) else {
                continue;
            };
            if cookie.name() != self.name {
                continue;
            }
            if cookie.value().is_empty() || cookie.max_age() == Some(cookie::time::Duration::ZERO) {
                return ResponseCookie::Removed;
            }
            return ResponseCookie::Set(cookie.value().to_owned());
        }
        ResponseCookie::Absent
    }

    /// Verify a signed cookie value and return the session id it carries
    fn unsign(&self, value: &str) -> Option<String> {
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(self.name.clone(), value.to_owned()));
        jar.signed(&self.key)
            .get(&self.name)
            .map(|cookie| cookie.value().to_owned())
    }

    fn sign(&self, session_id: &str) -> String {
        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key)
            .add(Cookie::new(self.name.clone(), session_id.to_owned()));
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_owned())
            .unwrap_or_default()
    }

    fn serialize(&self, session_id: &str) -> String {
        let mut builder = Cookie::build((self.name.clone(), self.sign(session_id)))
            .path(self.cookie.path.clone())
            .http_only(self.cookie.http_only)
            .secure(self.cookie.secure)
            .same_site(self.cookie.same_site);

        if let Some(max_age) = self.cookie.max_age_seconds {
            builder = builder.max_age(cookie::time::Duration::seconds(max_age as i64));
        }

        ensure_secure_same_site(&builder.build().encoded().to_string())
    }

    fn append_secure_cookie(&self, headers: &mut HeaderMap, request_value: Option<String>) {
        let value = match self.from_response(headers) {
            ResponseCookie::Set(value) => value,
            ResponseCookie::Removed => return,
            ResponseCookie::Absent => match request_value {
                Some(value) => value,
                None => return,
            },
        };

        let Some(session_id) = self.unsign(&value) else {
            tracing::debug!(cookie = %self.name, "Session cookie signature did not verify, not re-issuing");
            return;
        };

        match HeaderValue::from_str(&self.serialize(&session_id)) {
            Ok(header) => {
                headers.append(SET_COOKIE, header);
            }
            Err(e) => {
                tracing::warn!(cookie = %self.name, error = %e, "Could not encode session cookie");
            }
        }
    }
}

/// Layer that appends the secure copy of the session cookie to every response
///
/// Must wrap the session manager layer so the cookie it sets is visible here.
#[derive(Clone)]
pub struct SessionCookieFixLayer {
    config: Arc<FixConfig>,
}

impl SessionCookieFixLayer {
    pub fn new(options: &SessionOptions) -> Self {
        Self {
            config: Arc::new(FixConfig {
                name: options.name.clone(),
                key: options.signing_key().clone(),
                cookie: options.cookie.clone(),
            }),
        }
    }
}

impl<S> Layer<S> for SessionCookieFixLayer {
    type Service = SessionCookieFix<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionCookieFix {
            inner,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SessionCookieFix<S> {
    inner: S,
    config: Arc<FixConfig>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionCookieFix<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let request_value = self.config.from_request(req.headers());
        let config = self.config.clone();
        let future = self.inner.call(req);

        Box::pin(async move {
            let mut response = future.await?;
            config.append_secure_cookie(response.headers_mut(), request_value);
            Ok(response)
        })
    }
}
