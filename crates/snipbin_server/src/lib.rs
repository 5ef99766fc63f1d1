//! HTTP server wiring for snipbin (API, handlers, and shared state).

/// HTTP error mapping for API handlers.
pub mod error;
/// HTTP handlers for document and webhook endpoints.
pub mod handlers;

pub use snipbin_core::{
    config, db, models, AppError, CleanupScheduler, Config, Database, PermissionTokenService,
    WebhookDispatcher, DEFAULT_PORT,
};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Headroom on top of the document limit for JSON escaping and other fields.
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub tokens: Arc<PermissionTokenService>,
    pub webhooks: WebhookDispatcher,
}

impl AppState {
    /// Construct shared application state.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `db`: Open database handle.
    ///
    /// # Returns
    /// A new [`AppState`] with a token service and webhook dispatcher built
    /// from `config`.
    ///
    /// # Errors
    /// Returns an error when `jwt_secret` is empty or the webhook HTTP client
    /// cannot be built.
    pub fn new(config: Config, db: Database) -> Result<Self, AppError> {
        Self::with_shared_db(config, Arc::new(db))
    }

    /// Like [`AppState::new`], sharing a database handle with other tasks.
    ///
    /// # Errors
    /// See [`AppState::new`].
    pub fn with_shared_db(config: Config, db: Arc<Database>) -> Result<Self, AppError> {
        let tokens = PermissionTokenService::new(&config.jwt_secret)?;
        let webhooks = WebhookDispatcher::new(config.webhook_timeout)?;
        Ok(Self {
            db,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            webhooks,
        })
    }
}

/// Create the application router with all routes and middleware.
///
/// # Arguments
/// - `state`: Shared application state.
/// - `allow_public_access`: Whether to allow cross-origin requests from any origin.
///
/// # Returns
/// Configured `axum::Router`.
pub fn create_app(state: AppState, allow_public_access: bool) -> Router {
    let cors_port = state.config.port;
    create_app_with_cors_port(state, allow_public_access, cors_port)
}

/// Resolve the listener address from env var overrides and security policy.
///
/// # Arguments
/// - `config`: Server configuration containing the configured `port`.
/// - `allow_public_access`: Whether non-loopback bind targets are permitted.
///
/// # Returns
/// A validated socket address that enforces loopback when public access is disabled.
pub fn resolve_bind_address(config: &Config, allow_public_access: bool) -> SocketAddr {
    let default_bind = SocketAddr::from(([127, 0, 0, 1], config.port));
    let requested = match std::env::var("BIND") {
        Ok(value) => match value.trim().parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(
                    "Invalid BIND='{}': {}. Falling back to {}",
                    value,
                    err,
                    default_bind
                );
                default_bind
            }
        },
        Err(_) => default_bind,
    };

    if allow_public_access || requested.ip().is_loopback() {
        return requested;
    }

    tracing::warn!(
        "Non-loopback bind {} requested without ALLOW_PUBLIC_ACCESS; forcing 127.0.0.1",
        requested
    );
    SocketAddr::from(([127, 0, 0, 1], requested.port()))
}

fn body_limit(max_document_size: usize) -> DefaultBodyLimit {
    if max_document_size == 0 {
        return DefaultBodyLimit::disable();
    }
    // A char is at most four UTF-8 bytes.
    DefaultBodyLimit::max(
        max_document_size
            .saturating_mul(4)
            .saturating_add(BODY_LIMIT_OVERHEAD),
    )
}

fn cors_layer(allow_public_access: bool, cors_port: u16) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PATCH, Method::DELETE];
    if allow_public_access {
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any);
    }

    let origins: Vec<HeaderValue> = [
        format!("http://localhost:{}", cors_port),
        format!("http://127.0.0.1:{}", cors_port),
    ]
    .iter()
    .filter_map(|origin| HeaderValue::from_str(origin).ok())
    .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
}

fn create_app_with_cors_port(state: AppState, allow_public_access: bool, cors_port: u16) -> Router {
    use handlers::{document, webhook};

    let body_limit = body_limit(state.config.max_document_size);

    Router::new()
        .route("/documents", post(document::create_document))
        .route(
            "/documents/:id",
            get(document::get_document)
                .patch(document::update_document)
                .delete(document::delete_document),
        )
        .route("/documents/:id/versions", get(document::list_versions))
        .route("/documents/:id/versions/count", get(document::count_versions))
        .route(
            "/documents/:id/versions/:version",
            get(document::get_version).delete(document::delete_version),
        )
        .route("/documents/:id/share", post(document::share_document))
        .route("/documents/:id/webhooks", post(webhook::create_webhook))
        .route(
            "/documents/:id/webhooks/:webhook_id",
            get(webhook::get_webhook)
                .patch(webhook::update_webhook)
                .delete(webhook::delete_webhook),
        )
        .route("/:id", get(document::open_share_link))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(body_limit)
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(allow_public_access, cors_port))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
}

fn listener_cors_port(listener: &tokio::net::TcpListener, fallback_port: u16) -> u16 {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(fallback_port)
}

/// Run the Axum server with graceful shutdown support.
///
/// After the listener stops, in-flight webhook deliveries are drained before
/// returning.
///
/// # Arguments
/// - `listener`: Bound TCP listener for the server.
/// - `state`: Shared application state.
/// - `allow_public_access`: Whether to allow cross-origin requests from any origin.
/// - `shutdown_signal`: Future that resolves when shutdown should start.
///
/// # Returns
/// `Ok(())` when the server exits cleanly.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    allow_public_access: bool,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let cors_port = listener_cors_port(&listener, state.config.port);
    let dispatcher = state.webhooks.clone();
    let app = create_app_with_cors_port(state, allow_public_access, cors_port);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await;

    let pending = dispatcher.in_flight();
    if pending > 0 {
        tracing::info!(pending, "Waiting for webhook deliveries");
    }
    dispatcher.drain().await;
    result
}
