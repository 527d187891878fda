mod common;

use async_trait::async_trait;
use common::{SECRET, info_response, loopback_config, options};
use quayside::cache::InMemoryCache;
use quayside::{
    Cache, CacheClient, ClientListener, Error, ServerConfig, SessionConfig, StoreConnectionOptions, StoreConnector,
    create_server,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// In-memory client whose connect step takes a while
#[derive(Clone)]
struct SlowClient {
    inner: InMemoryCache,
    delay: Duration,
}

#[async_trait]
impl Cache for SlowClient {
    async fn get_bytes(&self, key: &str) -> quayside::Result<Option<Vec<u8>>> {
        self.inner.get_bytes(key).await
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> quayside::Result<()> {
        self.inner.set_bytes(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> quayside::Result<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> quayside::Result<()> {
        self.inner.clear().await
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[async_trait]
impl CacheClient for SlowClient {
    fn on(&self, listener: ClientListener) {
        self.inner.on(listener);
    }

    async fn connect(&self) -> quayside::Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

fn slow_store(delay: Duration) -> StoreConnector {
    let client = SlowClient {
        inner: InMemoryCache::new(100),
        delay,
    };
    StoreConnector::new(
        Some(
            StoreConnectionOptions::new("cache.internal", 6379)
                .on_connect(|| {})
                .on_error(|_| {}),
        ),
        move |_host: &str, _port: u16| -> quayside::Result<Arc<dyn CacheClient>> { Ok(Arc::new(client.clone())) },
    )
    .unwrap()
}

async fn query_info(client: &reqwest::Client, url: &str) -> Value {
    client
        .post(url)
        .json(&json!({ "query": "{ info }" }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_start_serves_info_over_http() {
    let config = loopback_config();
    let port = config.port;
    let server = create_server(options().server_config(config).build().unwrap()).unwrap();

    let started = server.start().await.unwrap();
    assert_eq!(started.listener.local_addr().port(), port);
    assert_eq!(started.listener.url(), format!("http://127.0.0.1:{}/graphql", port));

    let body = query_info(&reqwest::Client::new(), started.listener.url()).await;
    assert_eq!(body, info_response());

    started.listener.shutdown().await;
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let server = create_server(options().server_config(loopback_config()).build().unwrap()).unwrap();

    let first = server.start().await.unwrap();
    let second = server.start().await.unwrap();
    assert_eq!(first.listener.local_addr(), second.listener.local_addr());
    assert_eq!(first.listener.url(), second.listener.url());

    // The started handle exposes the executable schema
    let response = second.graphql.execute("{ info }").await;
    assert_eq!(serde_json::to_value(&response).unwrap(), info_response());

    first.listener.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_starts_bind_once() {
    let server = std::sync::Arc::new(
        create_server(options().server_config(loopback_config()).build().unwrap()).unwrap(),
    );

    let (a, b) = tokio::join!(server.start(), server.start());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.listener.local_addr(), b.listener.local_addr());

    a.listener.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let server = create_server(options().server_config(loopback_config()).build().unwrap()).unwrap();
    let started = server.start().await.unwrap();
    let url = started.listener.url().to_string();

    started.listener.shutdown().await;
    // A second shutdown is a no-op
    started.listener.shutdown().await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    assert!(client.post(&url).json(&json!({"query": "{ info }"})).send().await.is_err());
}

#[tokio::test]
async fn test_bind_failure_is_returned() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let server = create_server(
        options()
            .server_config(ServerConfig {
                host: "127.0.0.1".to_string(),
                port,
                ..Default::default()
            })
            .build()
            .unwrap(),
    )
    .unwrap();

    assert!(matches!(server.start().await, Err(Error::Io(_))));

    // A failed start leaves the server open for registration
    assert!(server.register(|router| router).is_ok());
}

#[tokio::test]
async fn test_register_during_start_is_refused() {
    let server = Arc::new(
        create_server(
            options()
                .server_config(loopback_config())
                .session_config(SessionConfig::new(SECRET).with_store(slow_store(Duration::from_millis(300))))
                .build()
                .unwrap(),
        )
        .unwrap(),
    );

    let starting = tokio::spawn({
        let server = server.clone();
        async move { server.start().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(matches!(server.register(|router| router), Err(Error::AlreadyStarted)));

    let started = starting.await.unwrap().unwrap();
    started.listener.shutdown().await;
}

#[tokio::test]
async fn test_https_serves_info() {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()]).unwrap();

    let config = ServerConfig {
        https: true,
        ssl_private_key: generated.key_pair.serialize_pem(),
        ssl_public_cert: generated.cert.pem(),
        ..loopback_config()
    };
    let server = create_server(options().server_config(config).build().unwrap()).unwrap();

    let started = server.start().await.unwrap();
    assert!(started.listener.url().starts_with("https://127.0.0.1:"));

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();
    let body = query_info(&client, started.listener.url()).await;
    assert_eq!(body, info_response());

    // Plain HTTP against the TLS port does not get a GraphQL response
    let plain_url = started.listener.url().replacen("https://", "http://", 1);
    let plain = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
        .post(&plain_url)
        .json(&json!({"query": "{ info }"}))
        .send()
        .await;
    assert!(plain.is_err());

    started.listener.shutdown().await;
}

#[tokio::test]
async fn test_https_with_client_verification_accepts_anonymous_clients() {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    let config = ServerConfig {
        https: true,
        ssl_private_key: generated.key_pair.serialize_pem(),
        ssl_public_cert: generated.cert.pem(),
        ssl_verify_certificates: true,
        ..loopback_config()
    };
    let server = create_server(options().server_config(config).build().unwrap()).unwrap();
    let started = server.start().await.unwrap();

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();
    assert_eq!(query_info(&client, started.listener.url()).await, info_response());

    started.listener.shutdown().await;
}

#[tokio::test]
async fn test_https_shutdown_drains_open_connections() {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    let config = ServerConfig {
        https: true,
        ssl_private_key: generated.key_pair.serialize_pem(),
        ssl_public_cert: generated.cert.pem(),
        ..loopback_config()
    };
    let server = create_server(options().server_config(config).build().unwrap()).unwrap();
    let started = server.start().await.unwrap();
    let url = started.listener.url().to_string();

    // Keep-alive leaves the connection open after the response
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    assert_eq!(query_info(&client, &url).await, info_response());

    tokio::time::timeout(Duration::from_secs(5), started.listener.shutdown())
        .await
        .expect("shutdown did not finish");

    assert!(client.post(&url).json(&json!({"query": "{ info }"})).send().await.is_err());
}
