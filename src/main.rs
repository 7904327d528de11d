//! tandem service entry point
//!
//! Bootstraps configuration, connects Postgres and Redis, wires the
//! hand-off handlers, starts the expiry worker and serves the HTTP API.
//! The worker and the server share a shutdown signal so in-flight
//! expiry batches drain before the process exits.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tandem::adapters::events::RedisEventPublisher;
use tandem::adapters::gateway::{HttpDeliveryGateway, HttpGatewayConfig};
use tandem::adapters::http::{handoff_routes, HandoffHandlers};
use tandem::adapters::postgres::{
    PostgresConversationStore, PostgresExpiryQueue, PostgresMessageStore,
};
use tandem::adapters::worker::{ExpiryWorker, ExpiryWorkerConfig};
use tandem::application::handlers::handoff::{
    ExpireControlHandler, GetControlStateHandler, HandoffPolicy, ReleaseControlHandler,
    SendOperatorMessageHandler, TakeControlHandler,
};
use tandem::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    let filter = EnvFilter::new(&config.server.log_level);
    if config.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        environment = ?config.server.environment,
        "Starting tandem"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_tokio_connection().await?;
    let events = Arc::new(RedisEventPublisher::new(redis_conn));

    let store = Arc::new(PostgresConversationStore::new(pool.clone()));
    let messages = Arc::new(PostgresMessageStore::new(pool.clone()));
    let expiry_queue = Arc::new(PostgresExpiryQueue::new(pool));

    let gateway_config = HttpGatewayConfig::new(
        config.gateway.api_token.clone(),
        config.gateway.base_url.clone(),
    )
    .with_request_timeout(config.gateway.request_timeout());
    let gateway = Arc::new(HttpDeliveryGateway::new(gateway_config));

    let policy = HandoffPolicy {
        default_hold_minutes: config.takeover.default_hold_minutes,
        max_hold_minutes: config.takeover.max_hold_minutes,
        max_message_chars: config.takeover.max_message_chars,
        handoff_notice: config.takeover.handoff_notice.clone(),
        resume_notice: config.takeover.resume_notice.clone(),
    };

    let handlers = HandoffHandlers::new(
        Arc::new(TakeControlHandler::new(
            store.clone(),
            gateway.clone(),
            events.clone(),
            policy.clone(),
        )),
        Arc::new(SendOperatorMessageHandler::new(
            store.clone(),
            messages,
            gateway.clone(),
            events.clone(),
            policy.clone(),
        )),
        Arc::new(ReleaseControlHandler::new(
            store.clone(),
            gateway.clone(),
            events.clone(),
            policy.clone(),
        )),
        Arc::new(GetControlStateHandler::new(store.clone())),
    );

    let worker_config = ExpiryWorkerConfig::default()
        .with_poll_interval(config.worker.poll_interval())
        .with_batch_size(config.worker.batch_size)
        .with_retry_base(config.worker.retry_base())
        .with_max_attempts(config.worker.max_attempts);
    let expire_handler = ExpireControlHandler::new(store, gateway, events, policy);
    let worker = ExpiryWorker::with_config(expiry_queue, expire_handler, worker_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    // Request ids are stamped before tracing so spans carry them.
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors_layer(&config))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(CompressionLayer::new());

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/conversations", handoff_routes(handlers))
        .layer(middleware);

    let addr = config.server.socket_addr();
    tracing::info!(%addr, "Listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, draining expiry worker");
    shutdown_tx.send(true).ok();
    worker_handle.await?;

    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

/// Build the CORS layer from server configuration.
///
/// With no configured origins every origin is allowed, which suits
/// development. Production deployments list the operator console
/// origins explicitly.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-tandem-tenant"),
            HeaderName::from_static("x-tandem-operator"),
        ]);

    let origins = config.server.cors_origins_list();
    if origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", origins);
        let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("Received Ctrl+C, shutting down");
    }
}
