use std::time::Duration;

/// Usage hint attached to argument errors raised by [`create_server`](crate::create_server)
pub const CREATE_SERVER_USAGE: &str =
    "\nUSAGE: create_server(ServerOptions::builder().schema(...).build()?)";

/// The main error type for quayside
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Server already started")]
    AlreadyStarted,

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Configuration errors raised synchronously while assembling a server
///
/// Messages follow fixed templates so callers can match on them exactly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("The 'options' argument must be a non-empty object. {usage}")]
    InvalidArgument { usage: &'static str },

    #[error("The '{0}' field is required")]
    MissingField(&'static str),

    #[error("The '{field}' field must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    #[error(
        "In 'https' mode, the 'options.server_config.ssl_private_key' and 'options.server_config.ssl_public_cert' fields are required"
    )]
    HttpsFieldsRequired,

    #[error("Unable to read '{field}' from {path}: {reason}")]
    UnreadableFile {
        field: &'static str,
        path: String,
        reason: String,
    },
}

/// Errors raised by the session store connector
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("The 'options' argument must be an object")]
    InvalidArgument,

    #[error("The '{0}' option is required")]
    MissingOption(&'static str),

    #[error("The '{option}' option expects a {expected}")]
    InvalidOptionType {
        option: &'static str,
        expected: &'static str,
    },

    #[error("Failed to create cache client: {0}")]
    Client(String),

    #[error("Cache client did not connect within {0:?}")]
    ConnectTimeout(Duration),
}

impl Error {
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
