use crate::config::DeploymentMode;
use crate::store::StoreConnector;
use crate::utils::get_env_with_prefix;
use cookie::{Key, SameSite};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha512};

/// Session configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Name of the session id cookie
    #[serde(default = "default_name")]
    pub name: String,

    /// Secret used to sign the session id cookie
    ///
    /// An empty secret still signs cookies, but with a key anyone can derive.
    #[serde(default, skip_serializing)]
    pub secret: String,

    /// Idle lifetime of a session in seconds; 0 keeps the cookie for the
    /// browser session only
    #[serde(default)]
    pub expiry_seconds: u64,

    /// Prefix for session records in a cache-backed store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Connector for the session store, connected once when the server starts.
    /// Without one, sessions live in process memory.
    #[serde(skip)]
    pub create_store: Option<StoreConnector>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            secret: String::new(),
            expiry_seconds: 0,
            key_prefix: default_key_prefix(),
            create_store: None,
        }
    }
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_expiry_seconds(mut self, seconds: u64) -> Self {
        self.expiry_seconds = seconds;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_store(mut self, connector: StoreConnector) -> Self {
        self.create_store = Some(connector);
        self
    }

    /// Load session configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(name) = get_env_with_prefix("SESSION_NAME") {
            config.name = name;
        }

        if let Some(secret) = get_env_with_prefix("SESSION_SECRET") {
            config.secret = secret;
        }

        if let Some(expiry) = get_env_with_prefix("SESSION_EXPIRY_SECONDS")
            && let Ok(seconds) = expiry.parse()
        {
            config.expiry_seconds = seconds;
        }

        if let Some(prefix) = get_env_with_prefix("SESSION_KEY_PREFIX") {
            config.key_prefix = prefix;
        }

        config
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("name", &self.name)
            .field("secret", &"[redacted]")
            .field("expiry_seconds", &self.expiry_seconds)
            .field("key_prefix", &self.key_prefix)
            .field("create_store", &self.create_store)
            .finish()
    }
}

fn default_name() -> String {
    "quayside.sid".to_string()
}

fn default_key_prefix() -> String {
    "sess:".to_string()
}

/// Derive the cookie signing key from a session secret
///
/// SHA-512 stretches any secret, including an empty one, to the 64 bytes
/// the signing key requires.
pub fn signing_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

/// Attributes of the session id cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieOptions {
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    #[serde(serialize_with = "serialize_same_site")]
    pub same_site: SameSite,
    pub max_age_seconds: Option<u64>,
}

fn serialize_same_site<S: Serializer>(same_site: &SameSite, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&same_site.to_string())
}

/// Session middleware options derived from [`SessionConfig`] and the deployment mode
///
/// Passed to the server's setup callback.
#[derive(Clone, Serialize)]
pub struct SessionOptions {
    pub name: String,
    pub cookie: CookieOptions,
    /// Refresh the cookie and record on every response
    pub rolling: bool,
    /// Persist sessions that were never written to
    pub save_uninitialized: bool,
    /// Whether forwarded headers from a fronting proxy are trusted
    pub trust_proxy: bool,
    #[serde(skip)]
    key: Key,
}

impl SessionOptions {
    pub fn from_config(config: &SessionConfig, mode: DeploymentMode) -> Self {
        let production = mode.is_production();

        Self {
            name: config.name.clone(),
            cookie: CookieOptions {
                path: "/".to_string(),
                http_only: true,
                secure: production,
                same_site: SameSite::None,
                max_age_seconds: (config.expiry_seconds > 0).then_some(config.expiry_seconds),
            },
            rolling: true,
            save_uninitialized: false,
            trust_proxy: production,
            key: signing_key(&config.secret),
        }
    }

    /// Key shared by the session layer and the cookie fix
    pub fn signing_key(&self) -> &Key {
        &self.key
    }
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("name", &self.name)
            .field("cookie", &self.cookie)
            .field("rolling", &self.rolling)
            .field("save_uninitialized", &self.save_uninitialized)
            .field("trust_proxy", &self.trust_proxy)
            .finish_non_exhaustive()
    }
}
