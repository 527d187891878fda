use super::config::CorsConfig;
use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};

/// Build a tower-http CorsLayer from a CorsConfig
///
/// Allowed origins are echoed back in `Access-Control-Allow-Origin`. Entries
/// that are not valid header values are skipped, and so is `*`, which can never
/// match a credentialed request.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let mut layer = CorsLayer::new().allow_origin(origins);

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    if !methods.is_empty() {
        layer = layer.allow_methods(methods);
    }

    if config.allowed_headers.iter().any(|h| h == "*") {
        // A literal wildcard cannot be combined with credentials
        layer = if config.allow_credentials {
            layer.allow_headers(AllowHeaders::mirror_request())
        } else {
            layer.allow_headers(Any)
        };
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        if !headers.is_empty() {
            layer = layer.allow_headers(headers);
        }
    }

    let exposed: Vec<HeaderName> = config
        .exposed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();
    if !exposed.is_empty() {
        layer = layer.expose_headers(exposed);
    }

    if config.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    layer.max_age(Duration::from_secs(config.max_age_seconds))
}
