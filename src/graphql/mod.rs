//! GraphQL endpoint.
//!
//! Requests are decoded by `async-graphql-axum` (JSON, `application/graphql`
//! and multipart bodies on POST, the query string on GET) and executed against
//! the finished schema. Each request carries a [`RequestContext`] with the
//! configured context values, the request headers and the session.

mod context;
mod persisted;

pub use context::{ContextMap, ContextProvider, RequestContext};
pub use persisted::{DEFAULT_PERSISTED_QUERY_ENTRIES, PersistedQueryStore};

use crate::config::DeploymentMode;
use async_graphql::http::GraphiQLSource;
use async_graphql::{ObjectType, Schema, SubscriptionType};
use async_graphql_axum::rejection::GraphQLRejection;
use async_graphql_axum::{GraphQLBatchRequest, GraphQLRequest, GraphQLResponse};
use axum::{
    Extension, Router,
    extract::{FromRequest, Request, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tower_sessions::Session;

pub(crate) struct GraphQlState<Q, M, S> {
    pub schema: Schema<Q, M, S>,
    pub context: ContextProvider,
    pub path: String,
    pub mode: DeploymentMode,
}

impl<Q, M, S> Clone for GraphQlState<Q, M, S> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            context: self.context.clone(),
            path: self.path.clone(),
            mode: self.mode,
        }
    }
}

impl<Q, M, S> GraphQlState<Q, M, S> {
    fn request_context(&self, headers: HeaderMap, session: Option<Extension<Session>>) -> RequestContext {
        RequestContext::new(
            self.context.resolve(&headers),
            headers,
            session.map(|Extension(session)| session),
        )
    }
}

/// Router serving the GraphQL endpoint at `state.path`
pub(crate) fn routes<Q, M, S>(state: GraphQlState<Q, M, S>) -> Router
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
    S: SubscriptionType + 'static,
{
    let path = state.path.clone();
    Router::new()
        .route(&path, get(graphql_get::<Q, M, S>).post(graphql_post::<Q, M, S>))
        .with_state(state)
}

async fn graphql_post<Q, M, S>(
    State(state): State<GraphQlState<Q, M, S>>,
    headers: HeaderMap,
    session: Option<Extension<Session>>,
    request: Result<GraphQLBatchRequest, GraphQLRejection>,
) -> Response
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
    S: SubscriptionType + 'static,
{
    let batch = match request {
        Ok(request) => request.into_inner(),
        Err(rejection) => {
            tracing::debug!(error = %rejection.0, "Rejected GraphQL request body");
            return rejection.into_response();
        }
    };

    let context = state.request_context(headers, session);
    let mut batch = batch.data(context.clone());
    if let Some(session) = context.session().cloned() {
        batch = batch.data(session);
    }

    GraphQLResponse::from(state.schema.execute_batch(batch).await).into_response()
}

async fn graphql_get<Q, M, S>(
    State(state): State<GraphQlState<Q, M, S>>,
    headers: HeaderMap,
    session: Option<Extension<Session>>,
    request: Request,
) -> Response
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
    S: SubscriptionType + 'static,
{
    if request.uri().query().unwrap_or_default().is_empty() {
        return match state.mode {
            DeploymentMode::Development => Html(GraphiQLSource::build().endpoint(&state.path).finish()).into_response(),
            DeploymentMode::Production => StatusCode::BAD_REQUEST.into_response(),
        };
    }

    let request = match GraphQLRequest::<GraphQLRejection>::from_request(request, &()).await {
        Ok(request) => request.into_inner(),
        Err(rejection) => {
            tracing::debug!(error = %rejection.0, "Rejected GraphQL query string");
            return rejection.into_response();
        }
    };

    let context = state.request_context(headers, session);
    let mut request = request.data(context.clone());
    if let Some(session) = context.session().cloned() {
        request = request.data(session);
    }

    GraphQLResponse::from(state.schema.execute(request).await).into_response()
}
