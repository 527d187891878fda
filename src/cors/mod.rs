//! Cross-Origin Resource Sharing (CORS) middleware.
//!
//! Requests whose `Origin` is outside the allow-set are rejected before any
//! handler runs; allowed origins get credentialed CORS response headers.

mod config;
mod guard;
mod layer;

pub use config::{CorsConfig, CorsConfigBuilder};
pub use guard::{OriginPolicy, reject_disallowed_origin};
pub use layer::build_cors_layer;

use axum::Router;
use axum::middleware::from_fn_with_state;

/// Apply the CORS headers layer with the origin guard outside it
pub(crate) fn install(router: Router, config: &CorsConfig) -> Router {
    let policy = OriginPolicy::new(config.allowed_origins.iter().cloned());
    router
        .layer(build_cors_layer(config))
        .layer(from_fn_with_state(policy, reject_disallowed_origin))
}
