use serde::{Deserialize, Serialize};

/// CORS settings for the assembled server
///
/// The allowed origins always come from
/// [`ServerConfig::allowed_origins`](crate::ServerConfig::allowed_origins); the
/// remaining fields tune the response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Allowed origins (e.g., ["http://localhost:3000", "https://example.com"])
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allowed HTTP methods
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,

    /// Allowed request headers; ["*"] mirrors whatever the preflight asks for
    #[serde(default = "default_allowed_headers")]
    pub allowed_headers: Vec<String>,

    /// Exposed headers that browsers can access
    #[serde(default = "default_exposed_headers")]
    pub exposed_headers: Vec<String>,

    /// Whether to allow credentials (cookies, authorization headers)
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,

    /// Maximum age for preflight request caching (in seconds)
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: default_allowed_methods(),
            allowed_headers: default_allowed_headers(),
            exposed_headers: default_exposed_headers(),
            allow_credentials: default_allow_credentials(),
            max_age_seconds: default_max_age(),
        }
    }
}

impl CorsConfig {
    pub fn builder() -> CorsConfigBuilder {
        CorsConfigBuilder::new()
    }

    /// Replace the allowed origins
    pub fn with_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }
}

/// Builder for CorsConfig
#[must_use = "builder does nothing until you call build()"]
pub struct CorsConfigBuilder {
    config: CorsConfig,
}

impl CorsConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CorsConfig::default(),
        }
    }

    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.config.allowed_methods.push(method.into());
        self
    }

    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.config.allowed_headers.push(header.into());
        self
    }

    pub fn allow_headers(mut self, headers: Vec<String>) -> Self {
        self.config.allowed_headers = headers;
        self
    }

    pub fn expose_header(mut self, header: impl Into<String>) -> Self {
        self.config.exposed_headers.push(header.into());
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.config.allow_credentials = allow;
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.config.max_age_seconds = seconds;
        self
    }

    pub fn build(self) -> CorsConfig {
        self.config
    }
}

impl Default for CorsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_allowed_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()]
}

fn default_allowed_headers() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_exposed_headers() -> Vec<String> {
    vec!["x-request-id".to_string()]
}

fn default_allow_credentials() -> bool {
    // Session cookies ride on cross-origin GraphQL requests
    true
}

fn default_max_age() -> u64 {
    3600 // 1 hour
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CorsConfig::default();
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.allowed_methods, vec!["GET", "POST", "OPTIONS"]);
        assert_eq!(config.allowed_headers, vec!["*"]);
        assert!(config.allow_credentials);
    }

    #[test]
    fn test_builder() {
        let config = CorsConfig::builder()
            .allow_method("PUT")
            .allow_headers(vec!["content-type".to_string()])
            .allow_header("authorization")
            .expose_header("x-trace")
            .allow_credentials(false)
            .max_age(7200)
            .build()
            .with_origins(vec!["https://example.com".to_string()]);

        assert_eq!(config.allowed_origins, vec!["https://example.com"]);
        assert_eq!(config.allowed_methods.len(), 4);
        assert_eq!(config.allowed_headers, vec!["content-type", "authorization"]);
        assert_eq!(config.exposed_headers, vec!["x-request-id", "x-trace"]);
        assert!(!config.allow_credentials);
        assert_eq!(config.max_age_seconds, 7200);
    }
}
