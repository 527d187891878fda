//! Quayside - a configurable GraphQL-over-HTTP(S) server factory
//!
//! Quayside assembles an axum server around an async-graphql schema, driven
//! entirely by configuration values.
//!
//! # Features
//!
//! - **GraphQL**: POST and GET endpoint with persisted queries and a per-request
//!   [`RequestContext`]
//! - **Sessions**: signed session cookies via `tower-sessions`, stored in memory or
//!   in a cache client opened through a [`StoreConnector`](store::StoreConnector)
//! - **Cookie fix**: a second session cookie with `SameSite=None;Secure` for
//!   cross-site clients
//! - **CORS**: origin allow-list with credentialed responses
//! - **HTTPS**: rustls listener from PEM material
//! - **Testing**: in-process request scenarios
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use async_graphql::{EmptyMutation, EmptySubscription, Object, Schema};
//! use quayside::{ConfigBuilder, ServerOptions, create_server};
//!
//! struct Query;
//!
//! #[Object]
//! impl Query {
//!     async fn info(&self) -> &str {
//!         "This is the API of a special app"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> quayside::Result<()> {
//!     quayside::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!
//!     let server = create_server(
//!         ServerOptions::builder()
//!             .config(config)
//!             .schema(Schema::build(Query, EmptyMutation, EmptySubscription))
//!             .build()?,
//!     )?;
//!
//!     let started = server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     started.listener.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
mod config;
mod core;
pub mod cors;
mod error;
pub mod graphql;
mod middleware;
pub mod session;
pub mod store;
pub mod testing;
pub mod tls;
pub mod traits;
mod utils;

// Re-exports for public API
pub use cache::{CacheBackend, CacheConfig};
pub use config::{Config, ConfigBuilder, DeploymentMode, LoggingConfig, ServerConfig};
pub use core::{
    GraphQlServer, Installer, ListenerHandle, ServerOptions, ServerOptionsBuilder, SetupFn, StartedServer,
    create_server,
};
pub use cors::{CorsConfig, CorsConfigBuilder};
pub use error::{CREATE_SERVER_USAGE, ConfigError, Error, Result, StoreError};
pub use graphql::{ContextMap, ContextProvider, RequestContext};
pub use middleware::MakeRequestUuid;
pub use session::{SessionConfig, SessionOptions};
pub use store::{StoreConnectionOptions, StoreConnector};
pub use traits::cache::Cache;
pub use traits::client::{CacheClient, CacheClientFactory, ClientListener};
pub use tower_sessions::Session;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: log filter (e.g. "info", "quayside=debug,tower_http=debug")
/// - `QUAYSIDE_LOG_JSON`: "true" for JSON formatted logs
///
/// Calling it when a global subscriber is already installed is a no-op.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| utils::parse_flag(&v))
        .unwrap_or(false);

    install_subscriber(env_filter, json_logs);
}

/// Initialize tracing from a [`LoggingConfig`]
///
/// `RUST_LOG`, when set, still takes precedence over the configured level.
pub fn init_tracing_with_config(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    install_subscriber(env_filter, config.json);
}

fn install_subscriber(env_filter: EnvFilter, json: bool) {
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
