use crate::error::{Error, StoreError};
use crate::traits::client::{ConnectCallback, ErrorCallback};
use crate::utils::get_env_with_prefix;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection options for a session store backend
///
/// Both callbacks are mandatory. Connection failures are reported through
/// `on_error` rather than returned from [`StoreConnector::connect`](super::StoreConnector::connect).
#[derive(Clone)]
pub struct StoreConnectionOptions {
    pub host: String,
    pub port: u16,
    pub on_connect: Option<ConnectCallback>,
    pub on_error: Option<ErrorCallback>,
    pub connect_timeout: Duration,
}

impl StoreConnectionOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            on_connect: None,
            on_error: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Read `SESSION_STORE_HOST`, `SESSION_STORE_PORT` and
    /// `SESSION_STORE_CONNECT_TIMEOUT_MS`; callbacks still have to be supplied
    pub fn from_env() -> Self {
        let mut options = Self::new(
            get_env_with_prefix("SESSION_STORE_HOST").unwrap_or_default(),
            get_env_with_prefix("SESSION_STORE_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(0),
        );

        if let Some(timeout) = get_env_with_prefix("SESSION_STORE_CONNECT_TIMEOUT_MS")
            && let Ok(ms) = timeout.parse()
        {
            options.connect_timeout = Duration::from_millis(ms);
        }

        options
    }

    pub fn on_connect<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check required fields, in the order callers see them reported
    pub(crate) fn validate(self) -> Result<ValidatedOptions, StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::MissingOption("host"));
        }
        if self.port == 0 {
            return Err(StoreError::MissingOption("port"));
        }
        let on_connect = self.on_connect.ok_or(StoreError::InvalidOptionType {
            option: "on_connect",
            expected: "function",
        })?;
        let on_error = self.on_error.ok_or(StoreError::InvalidOptionType {
            option: "on_error",
            expected: "function",
        })?;

        Ok(ValidatedOptions {
            host: self.host,
            port: self.port,
            on_connect,
            on_error,
            connect_timeout: self.connect_timeout,
        })
    }
}

impl std::fmt::Debug for StoreConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnectionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("on_connect", &self.on_connect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct ValidatedOptions {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) on_connect: ConnectCallback,
    pub(crate) on_error: ErrorCallback,
    pub(crate) connect_timeout: Duration,
}
