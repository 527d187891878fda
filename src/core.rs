use crate::{
    config::{Config, DeploymentMode, ServerConfig},
    cors::{self, CorsConfig},
    error::{CREATE_SERVER_USAGE, ConfigError, Error, Result},
    graphql::{self, ContextProvider, GraphQlState, PersistedQueryStore},
    middleware::MakeRequestUuid,
    session::{self, SessionBackend, SessionConfig, SessionOptions},
    tls,
};
use async_graphql::extensions::apollo_persisted_queries::ApolloPersistedQueries;
use async_graphql::{ObjectType, Schema, SchemaBuilder, SubscriptionType};
use axum::{Json, Router, http::StatusCode};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Route installer applied to the session-bearing router when the server starts
pub type Installer = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// Callback that wraps the session-bearing router, e.g. to add routes outside it
pub type SetupFn = Arc<dyn Fn(Router, &SessionOptions) -> Router + Send + Sync>;

const DEFAULT_GRAPHQL_PATH: &str = "/graphql";

/// Everything [`create_server`] needs
pub struct ServerOptions<Q, M, S> {
    pub server_config: ServerConfig,
    pub session_config: SessionConfig,
    pub schema: SchemaBuilder<Q, M, S>,
    pub context: ContextProvider,
    pub setup: Option<SetupFn>,
    pub mode: DeploymentMode,
    pub graphql_path: String,
    /// Response header tuning; origins always come from `server_config`
    pub cors: CorsConfig,
}

impl<Q, M, S> ServerOptions<Q, M, S> {
    pub fn builder() -> ServerOptionsBuilder<Q, M, S> {
        ServerOptionsBuilder::new()
    }
}

/// Builder for [`ServerOptions`]
#[must_use = "builder does nothing until you call build()"]
pub struct ServerOptionsBuilder<Q, M, S> {
    server_config: Option<ServerConfig>,
    session_config: Option<SessionConfig>,
    schema: Option<SchemaBuilder<Q, M, S>>,
    context: Option<ContextProvider>,
    setup: Option<SetupFn>,
    mode: Option<DeploymentMode>,
    graphql_path: Option<String>,
    cors: Option<CorsConfig>,
}

impl<Q, M, S> ServerOptionsBuilder<Q, M, S> {
    pub fn new() -> Self {
        Self {
            server_config: None,
            session_config: None,
            schema: None,
            context: None,
            setup: None,
            mode: None,
            graphql_path: None,
            cors: None,
        }
    }

    /// Take server, session and mode settings from a loaded [`Config`]
    pub fn config(mut self, config: Config) -> Self {
        self.server_config = Some(config.server);
        self.session_config = Some(config.session);
        self.mode = Some(config.mode);
        self
    }

    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = Some(config);
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = Some(config);
        self
    }

    pub fn schema(mut self, schema: SchemaBuilder<Q, M, S>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn context(mut self, context: impl Into<ContextProvider>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(Router, &SessionOptions) -> Router + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(setup));
        self
    }

    pub fn mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn graphql_path(mut self, path: impl Into<String>) -> Self {
        self.graphql_path = Some(path.into());
        self
    }

    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = Some(cors);
        self
    }

    fn is_empty(&self) -> bool {
        self.server_config.is_none()
            && self.session_config.is_none()
            && self.schema.is_none()
            && self.context.is_none()
            && self.setup.is_none()
            && self.mode.is_none()
            && self.graphql_path.is_none()
            && self.cors.is_none()
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidArgument`] when nothing was set,
    /// [`ConfigError::MissingField`] when the schema is missing and
    /// [`ConfigError::InvalidType`] for a GraphQL path without a leading `/`.
    pub fn build(self) -> std::result::Result<ServerOptions<Q, M, S>, ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::InvalidArgument {
                usage: CREATE_SERVER_USAGE,
            });
        }

        let schema = self.schema.ok_or(ConfigError::MissingField("options.schema"))?;

        let graphql_path = self
            .graphql_path
            .unwrap_or_else(|| DEFAULT_GRAPHQL_PATH.to_string());
        if !graphql_path.starts_with('/') {
            return Err(ConfigError::InvalidType {
                field: "options.graphql_path",
                expected: "a path starting with '/'",
            });
        }

        Ok(ServerOptions {
            server_config: self.server_config.unwrap_or_default(),
            session_config: self.session_config.unwrap_or_default(),
            schema,
            context: self.context.unwrap_or_default(),
            setup: self.setup,
            mode: self.mode.unwrap_or_default(),
            graphql_path,
            cors: self.cors.unwrap_or_default(),
        })
    }
}

impl<Q, M, S> Default for ServerOptionsBuilder<Q, M, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble a server from `options` without binding anything
///
/// The configuration is validated, session options derived, TLS material
/// parsed and the schema finished with persisted-query support.
///
/// # Example
///
/// ```rust,ignore
/// let server = quayside::create_server(
///     ServerOptions::builder()
///         .schema(Schema::build(Query, EmptyMutation, EmptySubscription))
///         .session_config(SessionConfig::new("secret"))
///         .build()?,
/// )?;
///
/// let started = server.start().await?;
/// println!("listening on {}", started.listener.url());
/// ```
pub fn create_server<Q, M, S>(options: ServerOptions<Q, M, S>) -> Result<GraphQlServer<Q, M, S>>
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
    S: SubscriptionType + 'static,
{
    let ServerOptions {
        server_config,
        session_config,
        schema,
        context,
        setup,
        mode,
        graphql_path,
        cors,
    } = options;

    server_config.validate()?;

    if session_config.secret.is_empty() {
        tracing::warn!("Session secret is empty; session cookies are signed with a publicly derivable key");
    }
    let session_options = SessionOptions::from_config(&session_config, mode);

    let tls = if server_config.https {
        Some(tls::build_acceptor(
            &server_config.ssl_private_key,
            &server_config.ssl_public_cert,
            server_config.ssl_verify_certificates,
        )?)
    } else {
        None
    };

    let persisted = PersistedQueryStore::for_config(&server_config, mode);
    let schema = schema.extension(ApolloPersistedQueries::new(persisted)).finish();

    let cors = cors.with_origins(server_config.allowed_origins.clone());

    tracing::debug!(
        host = %server_config.host,
        port = server_config.port,
        https = server_config.https,
        ?mode,
        "GraphQL server assembled"
    );

    Ok(GraphQlServer {
        server_config,
        session_config,
        session_options,
        mode,
        cors,
        schema,
        context,
        graphql_path,
        setup,
        tls,
        backend: OnceCell::new(),
        installers: Mutex::new(Vec::new()),
        running: AtomicBool::new(false),
        started: tokio::sync::Mutex::new(None),
    })
}

/// An assembled, not necessarily running, GraphQL server
pub struct GraphQlServer<Q, M, S> {
    server_config: ServerConfig,
    session_config: SessionConfig,
    session_options: SessionOptions,
    mode: DeploymentMode,
    cors: CorsConfig,
    schema: Schema<Q, M, S>,
    context: ContextProvider,
    graphql_path: String,
    setup: Option<SetupFn>,
    tls: Option<TlsAcceptor>,
    /// Opened on first use and shared by every router this server builds
    backend: OnceCell<SessionBackend>,
    installers: Mutex<Vec<Installer>>,
    /// Set under the installer lock once `start` begins
    running: AtomicBool,
    started: tokio::sync::Mutex<Option<StartedServer<Q, M, S>>>,
}

impl<Q, M, S> GraphQlServer<Q, M, S>
where
    Q: ObjectType + 'static,
    M: ObjectType + 'static,
    S: SubscriptionType + 'static,
{
    /// Add routes to the session-bearing router
    ///
    /// Installers run in registration order, inside the session layer, so their
    /// handlers can extract the [`Session`](tower_sessions::Session).
    pub fn register<F>(&self, installer: F) -> Result<()>
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        let mut installers = self
            .installers
            .lock()
            .map_err(|_| Error::internal("installer registry lock poisoned"))?;
        if self.running.load(Ordering::Acquire) {
            return Err(Error::AlreadyStarted);
        }

        installers.push(Arc::new(installer));
        Ok(())
    }

    /// Build the complete router without binding
    ///
    /// The session store is connected on the first call; later calls and
    /// [`start`](Self::start) reuse it, so every router shares sessions.
    pub async fn router(&self) -> Result<Router> {
        let backend = self.session_backend().await?;
        self.build_router(backend)
    }

    async fn session_backend(&self) -> Result<SessionBackend> {
        self.backend
            .get_or_try_init(|| session::connect_backend(&self.session_config))
            .await
            .cloned()
    }

    fn close_registration(&self, closed: bool) -> Result<()> {
        let _installers = self
            .installers
            .lock()
            .map_err(|_| Error::internal("installer registry lock poisoned"))?;
        self.running.store(closed, Ordering::Release);
        Ok(())
    }

    fn build_router(&self, backend: SessionBackend) -> Result<Router> {
        let installers = self
            .installers
            .lock()
            .map_err(|_| Error::internal("installer registry lock poisoned"))?
            .clone();

        let mut app = graphql::routes(GraphQlState {
            schema: self.schema.clone(),
            context: self.context.clone(),
            path: self.graphql_path.clone(),
            mode: self.mode,
        });
        for installer in &installers {
            app = installer(app);
        }
        let app = app.fallback(not_found);

        let app = session::install(app, &self.session_options, backend);

        let app = match &self.setup {
            Some(setup) => setup(app, &self.session_options),
            None => app,
        };

        let app = cors::install(app, &self.cors);

        // Outermost last: the request id is assigned before tracing sees the request
        Ok(app
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http()))
    }

    /// Connect the store, bind the listener and start serving
    ///
    /// Calling it again returns the running instance without re-binding.
    pub async fn start(&self) -> Result<StartedServer<Q, M, S>> {
        let mut started = self.started.lock().await;
        if let Some(existing) = started.as_ref() {
            tracing::info!("Server already running at {}", existing.listener.url());
            return Ok(existing.clone());
        }

        self.close_registration(true)?;
        let server = match self.launch().await {
            Ok(server) => server,
            Err(e) => {
                self.close_registration(false)?;
                return Err(e);
            }
        };

        *started = Some(server.clone());
        Ok(server)
    }

    async fn launch(&self) -> Result<StartedServer<Q, M, S>> {
        let router = self.router().await?;

        let listener = TcpListener::bind((self.server_config.host.as_str(), self.server_config.port)).await?;
        let local_addr = listener.local_addr()?;
        let url = self.server_config.url(&self.graphql_path);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = match &self.tls {
            Some(acceptor) => tokio::spawn(tls::serve(listener, acceptor.clone(), router, shutdown_rx)),
            None => tokio::spawn(serve_http(listener, router, shutdown_rx)),
        };

        tracing::info!("Server ready at {}", url);

        Ok(StartedServer {
            listener: ListenerHandle::new(local_addr, url, shutdown_tx, task),
            graphql: self.schema.clone(),
        })
    }
}

impl<Q, M, S> GraphQlServer<Q, M, S> {
    /// The server configuration as JSON, or one field of it
    ///
    /// Unknown keys give `None`.
    pub fn get_config(&self, key: Option<&str>) -> Option<Value> {
        let config = serde_json::to_value(&self.server_config).ok()?;
        match key {
            None => Some(config),
            Some(key) => config.get(key).cloned(),
        }
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.server_config
    }

    pub fn session_options(&self) -> &SessionOptions {
        &self.session_options
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn schema(&self) -> &Schema<Q, M, S> {
        &self.schema
    }
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(Value::Object(Default::default())))
}

async fn serve_http(listener: TcpListener, router: Router, mut shutdown: watch::Receiver<bool>) {
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP listener failed");
    }
}

/// Result of [`GraphQlServer::start`]
pub struct StartedServer<Q, M, S> {
    pub listener: ListenerHandle,
    pub graphql: Schema<Q, M, S>,
}

impl<Q, M, S> Clone for StartedServer<Q, M, S> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            graphql: self.graphql.clone(),
        }
    }
}

/// Handle on a bound listener
#[derive(Clone)]
pub struct ListenerHandle {
    inner: Arc<ListenerInner>,
}

struct ListenerInner {
    local_addr: SocketAddr,
    url: String,
    shutdown: watch::Sender<bool>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ListenerHandle {
    fn new(local_addr: SocketAddr, url: String, shutdown: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                local_addr,
                url,
                shutdown,
                task: tokio::sync::Mutex::new(Some(task)),
            }),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Public URL of the GraphQL endpoint
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Stop accepting connections and wait for the serve loop to finish
    pub async fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);

        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Listener task ended abnormally");
            }
            tracing::info!(url = %self.inner.url, "Server stopped");
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("local_addr", &self.inner.local_addr)
            .field("url", &self.inner.url)
            .finish()
    }
}
