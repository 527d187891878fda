#![allow(dead_code)]

use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Schema, SchemaBuilder, SimpleObject};
use axum::{Json, Router, http::StatusCode, routing::post};
use quayside::{
    RequestContext, ServerConfig, ServerOptions, ServerOptionsBuilder, Session, SessionConfig,
};
use serde_json::{Value, json};

pub const INFO: &str = "This is the API of a special app";
pub const SECRET: &str = "integration-test-secret";

#[derive(SimpleObject)]
pub struct ContextObject {
    key: String,
    value: String,
}

pub struct Query;

#[Object]
impl Query {
    async fn info(&self) -> &str {
        INFO
    }

    async fn context_check(&self, ctx: &Context<'_>, context_key: String) -> async_graphql::Result<Option<ContextObject>> {
        let request = ctx.data::<RequestContext>()?;
        Ok(request.get_string(&context_key).map(|value| ContextObject {
            key: context_key,
            value,
        }))
    }

    async fn visits(&self, ctx: &Context<'_>) -> async_graphql::Result<u64> {
        let session = ctx.data::<Session>()?;
        Ok(session.get::<u64>("visits").await?.unwrap_or(0))
    }
}

pub type Builder = ServerOptionsBuilder<Query, EmptyMutation, EmptySubscription>;

pub fn schema() -> SchemaBuilder<Query, EmptyMutation, EmptySubscription> {
    Schema::build(Query, EmptyMutation, EmptySubscription)
}

/// Options with the test schema and a signing secret
pub fn options() -> Builder {
    ServerOptions::builder()
        .schema(schema())
        .session_config(SessionConfig::new(SECRET))
}

/// Loopback config on a port that was free a moment ago
pub fn loopback_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: free_port(),
        ..Default::default()
    }
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Adds `POST /visits`, which counts requests per session, and `POST /logout`
pub fn session_routes(router: Router) -> Router {
    router
        .route("/visits", post(visit))
        .route("/logout", post(logout))
}

async fn visit(session: Session) -> Result<Json<Value>, StatusCode> {
    let visits = session
        .get::<u64>("visits")
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .unwrap_or(0)
        + 1;
    session
        .insert("visits", visits)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "visits": visits })))
}

async fn logout(session: Session) -> Result<StatusCode, StatusCode> {
    session.flush().await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn info_response() -> Value {
    json!({ "data": { "info": INFO } })
}
