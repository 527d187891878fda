mod common;

use axum::{Json, routing::get};
use common::{INFO, info_response, options};
use quayside::testing::{self, preflight};
use quayside::{
    ConfigBuilder, ConfigError, ContextMap, ContextProvider, DeploymentMode, Error, ServerConfig, ServerOptions,
    SessionOptions, create_server,
};
use serde_json::json;

#[test]
fn test_default_config_is_documented_object() {
    let server = create_server(options().build().unwrap()).unwrap();

    assert_eq!(
        server.get_config(None).unwrap(),
        json!({
            "host": "localhost",
            "port": 3001,
            "allowed_origins": ["http://127.0.0.1", "http://localhost", "https://localhost"],
            "https": false,
            "ssl_private_key": "",
            "ssl_public_cert": "",
            "ssl_verify_certificates": false,
            "cache_backend": null
        })
    );
    assert_eq!(server.get_config(Some("https")), Some(json!(false)));
    assert_eq!(server.get_config(Some("unknown")), None);
}

#[test]
fn test_config_builder_feeds_server_options() {
    let config = ConfigBuilder::new()
        .with_host("0.0.0.0")
        .with_port(8443)
        .allow_origin("https://app.example.com")
        .with_mode(DeploymentMode::Production)
        .build()
        .unwrap();

    let server = create_server(
        ServerOptions::builder()
            .config(config)
            .schema(common::schema())
            .build()
            .unwrap(),
    )
    .unwrap();

    assert_eq!(server.get_config(Some("port")), Some(json!(8443)));
    assert_eq!(server.server_config().allowed_origins.len(), 4);
    assert!(server.mode().is_production());
    assert!(server.session_options().cookie.secure);
}

#[test]
fn test_https_requires_certificates() {
    let result = create_server(
        options()
            .server_config(ServerConfig {
                https: true,
                ..Default::default()
            })
            .build()
            .unwrap(),
    );

    let err = result.err().unwrap();
    assert!(matches!(err, Error::Config(ConfigError::HttpsFieldsRequired)));
    assert_eq!(
        err.to_string(),
        "In 'https' mode, the 'options.server_config.ssl_private_key' and 'options.server_config.ssl_public_cert' fields are required"
    );
}

#[test]
fn test_missing_port_is_reported() {
    let result = create_server(
        options()
            .server_config(ServerConfig {
                port: 0,
                ..Default::default()
            })
            .build()
            .unwrap(),
    );

    assert_eq!(
        result.err().unwrap().to_string(),
        "The 'options.server_config.port' field is required"
    );
}

#[test]
fn test_wildcard_origin_is_rejected_at_assembly() {
    let result = create_server(
        options()
            .server_config(ServerConfig {
                allowed_origins: vec!["*".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap(),
    );

    assert!(matches!(
        result.err().unwrap(),
        Error::Config(ConfigError::InvalidType {
            field: "options.server_config.allowed_origins",
            ..
        })
    ));
}

#[tokio::test]
async fn test_info_query() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::post(app, "/graphql")
        .graphql("{ info }")
        .execute()
        .await
        .assert_ok()
        .assert_json_content_type()
        .assert_body_json(info_response())
        .await;
}

#[tokio::test]
async fn test_info_query_over_get() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::get(app, "/graphql?query=%7B%20info%20%7D")
        .execute()
        .await
        .assert_ok()
        .assert_json_field("data.info", json!(INFO))
        .await;
}

#[tokio::test]
async fn test_custom_graphql_path() {
    let server = create_server(options().graphql_path("/api").build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::post(app.clone(), "/api")
        .graphql("{ info }")
        .execute()
        .await
        .assert_ok();

    testing::post(app, "/graphql")
        .graphql("{ info }")
        .execute()
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_unknown_path_is_empty_json_404() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::get(app, "/nowhere")
        .execute()
        .await
        .assert_not_found()
        .assert_body_json(json!({}))
        .await;
}

#[tokio::test]
async fn test_static_context_reaches_resolvers() {
    let mut values = ContextMap::new();
    values.insert("environment".to_string(), json!("integration"));

    let server = create_server(options().context(values).build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::post(app.clone(), "/graphql")
        .graphql(r#"{ contextCheck(contextKey: "environment") { key value } }"#)
        .execute()
        .await
        .assert_ok()
        .assert_body_json(json!({
            "data": { "contextCheck": { "key": "environment", "value": "integration" } }
        }))
        .await;

    testing::post(app, "/graphql")
        .graphql(r#"{ contextCheck(contextKey: "missing") { key } }"#)
        .execute()
        .await
        .assert_json_field("data.contextCheck", json!(null))
        .await;
}

#[tokio::test]
async fn test_per_request_context() {
    let provider = ContextProvider::from_fn(|headers| {
        let mut values = ContextMap::new();
        if let Some(agent) = headers.get("user-agent").and_then(|v| v.to_str().ok()) {
            values.insert("agent".to_string(), json!(agent));
        }
        values
    });

    let server = create_server(options().context(provider).build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::post(app, "/graphql")
        .header("user-agent", "quayside-tests")
        .graphql(r#"{ contextCheck(contextKey: "agent") { value } }"#)
        .execute()
        .await
        .assert_json_field("data.contextCheck.value", json!("quayside-tests"))
        .await;
}

#[tokio::test]
async fn test_setup_routes_see_session_options() {
    let server = create_server(
        options()
            .setup(|router, session: &SessionOptions| {
                let name = session.name.clone();
                router.route("/cookie-name", get(move || async move { Json(json!({ "name": name })) }))
            })
            .build()
            .unwrap(),
    )
    .unwrap();
    let app = server.router().await.unwrap();

    let response = testing::get(app, "/cookie-name")
        .execute()
        .await
        .assert_ok()
        .assert_body_json(json!({ "name": "quayside.sid" }))
        .await;
    assert!(response.set_cookies().is_empty());
}

#[tokio::test]
async fn test_registered_installers_are_mounted() {
    let server = create_server(options().build().unwrap()).unwrap();
    server
        .register(|router| router.route("/ping", get(|| async { "pong" })))
        .unwrap();
    let app = server.router().await.unwrap();

    testing::get(app, "/ping")
        .execute()
        .await
        .assert_ok()
        .assert_contains("pong")
        .await;
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    let response = testing::post(app, "/graphql").graphql("{ info }").execute().await;
    assert_eq!(response.header_values("x-request-id").len(), 1);
}

#[tokio::test]
async fn test_allowed_origin_gets_credentialed_cors_headers() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::post(app, "/graphql")
        .origin("http://localhost")
        .graphql("{ info }")
        .execute()
        .await
        .assert_ok()
        .assert_header("access-control-allow-origin", "http://localhost")
        .assert_header("access-control-allow-credentials", "true")
        .assert_body_json(info_response())
        .await;
}

#[tokio::test]
async fn test_disallowed_origin_is_rejected() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::post(app, "/graphql")
        .origin("http://evil.example")
        .graphql("{ info }")
        .execute()
        .await
        .assert_server_error()
        .assert_no_header("access-control-allow-origin")
        .assert_empty_body()
        .await;
}

#[tokio::test]
async fn test_request_without_origin_is_allowed() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    testing::post(app, "/graphql")
        .graphql("{ info }")
        .execute()
        .await
        .assert_ok()
        .assert_no_header("access-control-allow-origin");
}

#[tokio::test]
async fn test_preflight() {
    let server = create_server(options().build().unwrap()).unwrap();
    let app = server.router().await.unwrap();

    preflight(app.clone(), "/graphql", "https://localhost")
        .header("access-control-request-headers", "content-type")
        .execute()
        .await
        .assert_ok()
        .assert_header("access-control-allow-origin", "https://localhost")
        .assert_header("access-control-allow-credentials", "true");

    preflight(app, "/graphql", "https://elsewhere.example")
        .execute()
        .await
        .assert_server_error();
}
