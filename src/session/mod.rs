//! Session management.
//!
//! Sessions are handled by `tower-sessions` with signed id cookies. The store is
//! either process memory or a cache client opened through a
//! [`StoreConnector`](crate::store::StoreConnector); [`SessionCookieFixLayer`]
//! wraps the session layer to re-issue the cookie with `SameSite=None;Secure`.

mod backend;
mod config;
mod cookie_fix;

pub use backend::SessionBackend;
pub use config::{CookieOptions, SessionConfig, SessionOptions, signing_key};
pub use cookie_fix::{SessionCookieFix, SessionCookieFixLayer, ensure_secure_same_site};

use crate::store::SessionCapability;
use axum::Router;
use tower_sessions::{Expiry, SessionManagerLayer};

/// Open the configured session store
///
/// Falls back to an in-memory store when no connector is set.
pub async fn connect_backend(config: &SessionConfig) -> crate::Result<SessionBackend> {
    match &config.create_store {
        Some(connector) => {
            tracing::info!(
                host = %connector.host(),
                port = connector.port(),
                "Connecting session store"
            );
            let store = connector
                .connect(&SessionCapability::from_config(config))
                .await?;
            Ok(SessionBackend::Cache(store))
        }
        None => Ok(SessionBackend::default()),
    }
}

/// Wrap `router` in the session layer and the cookie fix around it
pub(crate) fn install(router: Router, options: &SessionOptions, backend: SessionBackend) -> Router {
    let expiry = match options.cookie.max_age_seconds {
        Some(seconds) => Expiry::OnInactivity(time::Duration::seconds(seconds as i64)),
        None => Expiry::OnSessionEnd,
    };

    let session_layer = SessionManagerLayer::new(backend)
        .with_name(options.name.clone())
        .with_path(options.cookie.path.clone())
        .with_http_only(options.cookie.http_only)
        .with_secure(options.cookie.secure)
        .with_same_site(options.cookie.same_site)
        .with_always_save(options.rolling)
        .with_expiry(expiry)
        .with_signed(options.signing_key().clone());

    router
        .layer(session_layer)
        .layer(SessionCookieFixLayer::new(options))
}
