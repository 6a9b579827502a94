//! Application startup and lifecycle management.
//!
//! Wires the durable store, bill store, settings, channels, dispatcher and
//! retry queue together, binds the HTTP listener, and runs the server with
//! the retry worker alongside it.

use crate::config::Config;
use crate::error::AppError;
use crate::handlers::{self, bills, notifications, settings, system};
use crate::services::channels::{SmsChannel, WhatsAppChannel};
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::retry::{run_retry_worker, RetryQueue};
use crate::services::settings::SettingsStore;
use crate::services::storage::Storage;
use crate::services::store::BillStore;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Storage,
    pub store: BillStore,
    pub settings: SettingsStore,
    pub dispatcher: NotificationDispatcher,
    pub retries: RetryQueue,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        // Initialize metrics
        crate::services::init_metrics();

        let storage = Storage::open(&config.storage.data_dir).await?;
        let store = BillStore::load(storage.clone()).await?;
        let settings = SettingsStore::load(storage.clone(), &config).await?;
        let retries = RetryQueue::load(storage.clone()).await?;

        let whatsapp = Arc::new(WhatsAppChannel::new(&config, storage.clone()));
        let sms = Arc::new(SmsChannel::new(&config, settings.clone()));
        let dispatcher = NotificationDispatcher::new(
            store.clone(),
            settings.clone(),
            whatsapp,
            sms,
            retries.clone(),
        );

        let state = AppState {
            config: config.clone(),
            storage,
            store,
            settings,
            dispatcher,
            retries,
        };

        // Port 0 binds a random free port, used by the test harness.
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();
        tracing::info!("billdesk listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
            shutdown: CancellationToken::new(),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state for sharing with the test harness.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    ///
    /// The retry worker runs alongside the HTTP server and is cancelled when
    /// the server exits.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let worker = tokio::spawn(run_retry_worker(
            self.state.dispatcher.clone(),
            self.state.retries.clone(),
            self.state.store.clone(),
            Duration::from_millis(self.state.config.retry.poll_interval_ms),
            self.shutdown.clone(),
        ));

        let router = build_router(self.state.clone());
        let result = axum::serve(self.listener, router).await;

        self.shutdown.cancel();
        if let Err(e) = worker.await {
            tracing::error!("Retry worker task failed: {}", e);
        }
        result
    }
}

fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(
        |request: &axum::http::Request<axum::body::Body>| {
            let request_id = uuid::Uuid::new_v4();
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                %request_id
            )
        },
    );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/bills",
            post(bills::create_bill)
                .get(bills::list_bills)
                .delete(bills::clear_bills),
        )
        .route(
            "/bills/:bill_id",
            get(bills::get_bill).delete(bills::delete_bill),
        )
        .route("/bills/:bill_id/status", patch(bills::update_bill_status))
        .route("/bills/:bill_id/pay", post(bills::pay_bill))
        .route("/bills/:bill_id/receipt", get(bills::bill_receipt))
        .route(
            "/bills/:bill_id/notify",
            post(notifications::send_bill_notification),
        )
        .route("/receipts", get(bills::list_receipts))
        .route("/stats", get(bills::dashboard_stats))
        .route("/products", get(bills::list_products))
        .route("/settings", get(settings::get_settings))
        .route("/settings/sms", put(settings::update_sms_settings))
        .route("/settings/whatsapp", put(settings::update_whatsapp))
        .route("/notifications/test", post(notifications::send_test_message))
        .route("/system/reset", post(system::reset_system))
        .layer(CorsLayer::permissive())
        .layer(trace_layer)
        .with_state(state)
}
