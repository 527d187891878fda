use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::ConfigError;
use crate::session::SessionConfig;
use crate::utils::{get_env_with_prefix, parse_flag, parse_list};

/// Deployment mode
///
/// Production forces secure session cookies, trusts the fronting proxy and
/// honours the configured persisted-query cache backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }

    /// Read `QUAYSIDE_ENV`, falling back to `ENV`
    pub fn from_env() -> Self {
        get_env_with_prefix("ENV")
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => DeploymentMode::Production,
            _ => DeploymentMode::Development,
        }
    }
}

/// Application configuration loaded by [`ConfigBuilder`]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mode: DeploymentMode,
}

/// Listener, CORS and TLS settings
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to make cross-origin requests
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub https: bool,
    /// PEM encoded private key, required when `https` is set
    #[serde(default)]
    pub ssl_private_key: String,
    /// PEM encoded certificate chain, required when `https` is set
    #[serde(default)]
    pub ssl_public_cert: String,
    /// Request client certificates and verify them against the configured chain
    #[serde(default)]
    pub ssl_verify_certificates: bool,
    /// Persisted-query cache backend used in production
    #[serde(default)]
    pub cache_backend: Option<CacheConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            https: false,
            ssl_private_key: String::new(),
            ssl_public_cert: String::new(),
            ssl_verify_certificates: false,
            cache_backend: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1".to_string(),
        "http://localhost".to_string(),
        "https://localhost".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

impl ServerConfig {
    /// Check the invariants a server needs before anything is bound
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("options.server_config.host"));
        }

        if self.port == 0 {
            return Err(ConfigError::MissingField("options.server_config.port"));
        }

        if self.https
            && (self.ssl_private_key.trim().is_empty() || self.ssl_public_cert.trim().is_empty())
        {
            return Err(ConfigError::HttpsFieldsRequired);
        }

        let invalid_origin = self
            .allowed_origins
            .iter()
            .any(|origin| origin.trim().is_empty() || origin == "*" || HeaderValue::from_str(origin).is_err());
        if invalid_origin {
            return Err(ConfigError::InvalidType {
                field: "options.server_config.allowed_origins",
                expected: "a list of explicit origins",
            });
        }

        Ok(())
    }

    pub fn scheme(&self) -> &'static str {
        if self.https { "https" } else { "http" }
    }

    /// Public URL of `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("{}://{}:{}{}", self.scheme(), self.host, self.port, path)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("https", &self.https)
            .field(
                "ssl_private_key",
                &if self.ssl_private_key.is_empty() { "" } else { "[redacted]" },
            )
            .field("ssl_public_cert_len", &self.ssl_public_cert.len())
            .field("ssl_verify_certificates", &self.ssl_verify_certificates)
            .field("cache_backend", &self.cache_backend)
            .finish()
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
    ssl_files: Option<(String, String)>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            ssl_files: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.config.server.allowed_origins = origins;
        self
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.server.allowed_origins.push(origin.into());
        self
    }

    /// Serve HTTPS with the given PEM key and certificate chain
    pub fn with_https(mut self, private_key: impl Into<String>, public_cert: impl Into<String>) -> Self {
        self.config.server.https = true;
        self.config.server.ssl_private_key = private_key.into();
        self.config.server.ssl_public_cert = public_cert.into();
        self
    }

    /// Serve HTTPS with PEM files read when [`build`](Self::build) runs
    pub fn with_ssl_files(mut self, key_path: impl Into<String>, cert_path: impl Into<String>) -> Self {
        self.config.server.https = true;
        self.ssl_files = Some((key_path.into(), cert_path.into()));
        self
    }

    pub fn with_ssl_verify_certificates(mut self, verify: bool) -> Self {
        self.config.server.ssl_verify_certificates = verify;
        self
    }

    pub fn with_cache_backend(mut self, cache: CacheConfig) -> Self {
        self.config.server.cache_backend = Some(cache);
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    /// Load configuration from environment variables with QUAYSIDE_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_with_prefix("PORT")
            && let Ok(p) = port.parse()
        {
            self.config.server.port = p;
        }
        if let Some(origins) = get_env_with_prefix("ALLOWED_ORIGINS") {
            self.config.server.allowed_origins = parse_list(&origins);
        }
        if let Some(https) = get_env_with_prefix("HTTPS") {
            self.config.server.https = parse_flag(&https);
        }
        if let (Some(key), Some(cert)) = (
            get_env_with_prefix("SSL_PRIVATE_KEY_FILE"),
            get_env_with_prefix("SSL_PUBLIC_CERT_FILE"),
        ) {
            self.ssl_files = Some((key, cert));
        }
        if let Some(verify) = get_env_with_prefix("SSL_VERIFY_CERTIFICATES") {
            self.config.server.ssl_verify_certificates = parse_flag(&verify);
        }
        if let Some(cache) = CacheConfig::from_env() {
            self.config.server.cache_backend = Some(cache);
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = parse_flag(&json);
        }

        self.config.session = SessionConfig::from_env();
        self.config.mode = DeploymentMode::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if the server settings are incomplete, the log level
    /// is unknown, or a configured certificate file cannot be read.
    pub fn build(mut self) -> Result<Config, ConfigError> {
        if let Some((key_path, cert_path)) = self.ssl_files.take() {
            self.config.server.ssl_private_key = read_pem("options.server_config.ssl_private_key", &key_path)?;
            self.config.server.ssl_public_cert = read_pem("options.server_config.ssl_public_cert", &cert_path)?;
        }

        self.config.server.validate()?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidType {
                field: "logging.level",
                expected: "one of trace, debug, info, warn, error",
            });
        }

        Ok(self.config)
    }
}

fn read_pem(field: &'static str, path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::UnreadableFile {
        field,
        path: path.to_string(),
        reason: e.to_string(),
    })
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
