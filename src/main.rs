use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use velvet_backend::api;
use velvet_backend::cache::SystemClock;
use velvet_backend::config::AppConfig;
use velvet_backend::database::{
    self, activity_log_repository::ActivityLogRepository, chat_repository::ChatRepository,
    payment_repository::PaymentRepository, post_repository::PostRepository,
    user_repository::UserRepository,
};
use velvet_backend::gateway::client::GatewayClient;
use velvet_backend::health::{HealthChecker, HealthState, HealthStatus};
use velvet_backend::logging::init_tracing;
use velvet_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use velvet_backend::services::chats::ChatService;
use velvet_backend::services::notification::NotificationService;
use velvet_backend::services::payments::PaymentService;
use velvet_backend::services::webhooks::WebhookService;
use velvet_backend::workers::scheduled_publisher::{
    ScheduledPublisherConfig, ScheduledPublisherWorker,
};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "🚀 Starting velvet backend service"
    );

    info!("📊 Initializing database connection pool...");
    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!("database init failed: {e}")
        })?;
    info!("✅ Database connection pool initialized");

    let gateway = Arc::new(
        GatewayClient::new(config.gateway.clone())
            .map_err(|e| anyhow::anyhow!("gateway client init failed: {e}"))?,
    );
    info!("✅ Payment gateway client initialized");

    let health_checker = HealthChecker::new(db_pool.clone());

    let payment_service = Arc::new(PaymentService::new(
        PaymentRepository::new(db_pool.clone()),
        UserRepository::new(db_pool.clone()),
        ActivityLogRepository::new(db_pool.clone()),
        gateway,
        NotificationService::new(ActivityLogRepository::new(db_pool.clone())),
        config.vip.clone(),
        &config.server,
    ));

    let webhook_service = Arc::new(WebhookService::new(
        PaymentRepository::new(db_pool.clone()),
        UserRepository::new(db_pool.clone()),
        ActivityLogRepository::new(db_pool.clone()),
    ));

    let cache_ttl = Duration::from_secs(
        std::env::var("CHAT_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
    );
    let chat_service = Arc::new(ChatService::new(
        ChatRepository::new(db_pool.clone()),
        config.support.clone(),
        cache_ttl,
        Arc::new(SystemClock),
    ));

    // Scheduled post publisher; the chat cache purge rides its tick
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let publisher_enabled = std::env::var("PUBLISHER_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let mut publisher_handle = None;
    if publisher_enabled {
        let publisher_config = ScheduledPublisherConfig::from_env();
        info!(
            poll_interval_secs = publisher_config.poll_interval.as_secs(),
            "Starting scheduled post publisher"
        );
        let cache_owner = chat_service.clone();
        let worker =
            ScheduledPublisherWorker::new(PostRepository::new(db_pool.clone()), publisher_config)
                .with_housekeeping(move || {
                    cache_owner.purge_expired_cache();
                });
        publisher_handle = Some(tokio::spawn(worker.run(worker_shutdown_rx)));
    } else {
        info!("Scheduled post publisher disabled (PUBLISHER_ENABLED=false)");
    }

    info!("🛣️  Setting up application routes...");

    let payments_routes = Router::new()
        .route("/api/vip/purchase", post(api::payments::purchase_vip))
        .route(
            "/api/vip/purchase/white-label",
            post(api::payments::purchase_vip_white_label),
        )
        .route(
            "/api/payments/{order_id}/status",
            get(api::payments::payment_status),
        )
        .route("/api/payments/pending", get(api::payments::pending_payments))
        .route(
            "/api/payments/{order_id}/cancel",
            post(api::payments::cancel_payment),
        )
        .with_state(api::payments::PaymentsState {
            service: payment_service,
        });

    let webhook_routes = Router::new()
        .route(
            "/api/webhooks/payment",
            post(api::webhooks::handle_payment_webhook),
        )
        .with_state(api::webhooks::WebhookState {
            service: webhook_service,
        });

    let chat_routes = Router::new()
        .route("/api/chats", post(api::chats::open_chat).get(api::chats::list_chats))
        .route("/api/chats/support", post(api::chats::open_support_chat))
        .route("/api/chats/requests", get(api::chats::list_pending_requests))
        .route(
            "/api/chats/requests/{id}/accept",
            post(api::chats::accept_request),
        )
        .route(
            "/api/chats/requests/{id}/reject",
            post(api::chats::reject_request),
        )
        .route(
            "/api/chats/{id}/messages",
            get(api::chats::list_messages).post(api::chats::send_message),
        )
        .route("/api/chats/{id}/read", post(api::chats::mark_read))
        .route("/api/chats/unread-count", get(api::chats::unread_count))
        .with_state(api::chats::ChatsState {
            service: chat_service,
        });

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .merge(payments_routes)
        .merge(webhook_routes)
        .merge(chat_routes)
        .with_state(health_checker)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = publisher_handle {
        if let Err(e) = tokio::time::timeout(Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for publisher shutdown");
        }
    }

    info!("👋 Server shutdown complete");
    Ok(())
}

// Handlers

async fn root() -> &'static str {
    "Welcome to the Velvet API"
}

async fn health(
    axum::extract::State(checker): axum::extract::State<HealthChecker>,
) -> Result<axum::Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = checker.check_health().await;

    if matches!(health_status.status, HealthState::Unhealthy) {
        error!("❌ Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(axum::Json(health_status))
    }
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<HealthChecker>,
) -> Result<axum::Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks if the service is alive
async fn liveness() -> &'static str {
    "OK"
}
