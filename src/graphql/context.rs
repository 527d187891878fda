use axum::http::HeaderMap;
use serde_json::Value;
use std::sync::Arc;
use tower_sessions::Session;

/// Key/value context made available to resolvers
pub type ContextMap = serde_json::Map<String, Value>;

type ContextFn = Arc<dyn Fn(&HeaderMap) -> ContextMap + Send + Sync>;

/// Source of the per-request resolver context
#[derive(Clone, Default)]
pub enum ContextProvider {
    #[default]
    Empty,
    /// The same values for every request
    Static(Arc<ContextMap>),
    /// Values computed from each request's headers
    PerRequest(ContextFn),
}

impl ContextProvider {
    pub fn from_map(map: ContextMap) -> Self {
        ContextProvider::Static(Arc::new(map))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&HeaderMap) -> ContextMap + Send + Sync + 'static,
    {
        ContextProvider::PerRequest(Arc::new(f))
    }

    pub(crate) fn resolve(&self, headers: &HeaderMap) -> ContextMap {
        match self {
            ContextProvider::Empty => ContextMap::new(),
            ContextProvider::Static(map) => map.as_ref().clone(),
            ContextProvider::PerRequest(f) => f(headers),
        }
    }
}

impl From<ContextMap> for ContextProvider {
    fn from(map: ContextMap) -> Self {
        ContextProvider::from_map(map)
    }
}

impl std::fmt::Debug for ContextProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextProvider::Empty => f.write_str("ContextProvider::Empty"),
            ContextProvider::Static(map) => f.debug_tuple("ContextProvider::Static").field(map).finish(),
            ContextProvider::PerRequest(_) => f.write_str("ContextProvider::PerRequest"),
        }
    }
}

/// Request-scoped data attached to every GraphQL request
///
/// ```rust,ignore
/// async fn whoami(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<String>> {
///     let request = ctx.data::<RequestContext>()?;
///     match request.session() {
///         Some(session) => Ok(session.get::<String>("user").await?),
///         None => Ok(None),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    values: ContextMap,
    headers: HeaderMap,
    session: Option<Session>,
}

impl RequestContext {
    pub fn new(values: ContextMap, headers: HeaderMap, session: Option<Session>) -> Self {
        Self {
            values,
            headers,
            session,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String form of a context value; non-string values are rendered as JSON
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn values(&self) -> &ContextMap {
        &self.values
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ContextMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_provider() {
        assert!(ContextProvider::default().resolve(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_static_provider() {
        let provider = ContextProvider::from(map(json!({"environment": "test"})));
        let resolved = provider.resolve(&HeaderMap::new());
        assert_eq!(resolved["environment"], "test");
    }

    #[test]
    fn test_per_request_provider_sees_headers() {
        let provider = ContextProvider::from_fn(|headers| {
            let mut values = ContextMap::new();
            if let Some(tenant) = headers.get("x-tenant").and_then(|v| v.to_str().ok()) {
                values.insert("tenant".to_string(), json!(tenant));
            }
            values
        });

        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", "acme".parse().unwrap());
        assert_eq!(provider.resolve(&headers)["tenant"], "acme");
        assert!(provider.resolve(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_get_string_renders_non_strings() {
        let context = RequestContext::new(map(json!({"name": "ada", "retries": 3})), HeaderMap::new(), None);
        assert_eq!(context.get_string("name").as_deref(), Some("ada"));
        assert_eq!(context.get_string("retries").as_deref(), Some("3"));
        assert_eq!(context.get_string("missing"), None);
        assert!(context.session().is_none());
    }
}
