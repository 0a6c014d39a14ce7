//! # pixcheckout: Pix checkout backend
//!
//! `pixcheckout` runs the backend of a small storefront that sells products and services paid
//! through Pix. Buyers create orders on a public checkout page, the payment gateway pushes
//! signed status updates back, and store admins manage the catalog, coupons, messaging, reports
//! and automation through an authenticated API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐   ┌────────────────────────────┐
//! │ Storefront (/api/v1)        │   │ Admin dashboard            │
//! │ checkout, status polling    │   │ (/admin/api/v1, cookies)   │
//! └──────────────┬──────────────┘   └──────────────┬─────────────┘
//!                ↓                                 ↓
//! ┌──────────────────────────────────────────────────────────────┐
//! │ axum router: CORS, tracing, optional Prometheus metrics      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Domain services: checkout, coupons, webhooks, reports,       │
//! │ automation, analytics, storage, messaging                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Repositories (db::handlers) over PostgreSQL                  │
//! └──────────────────────────────────────────────────────────────┘
//!                ↑                                 ↑
//! ┌──────────────┴──────────────┐   ┌──────────────┴─────────────┐
//! │ Gateway webhook             │   │ Background services        │
//! │ (/webhooks/primepag, HMAC)  │   │ order expiry, reports      │
//! └─────────────────────────────┘   └────────────────────────────┘
//! ```
//!
//! ## Request flow
//!
//! 1. The buyer submits the checkout form. The form is validated, the IP is rate limited and
//!    checked against the block list, fraud heuristics run, and a pending order is stored.
//! 2. A Pix charge is requested from the gateway (or the mock provider when simulation is
//!    enabled) and the QR code is returned to the buyer.
//! 3. The gateway posts a signed webhook when the charge is paid. The order is updated, the
//!    buyer is emailed, and admins get a notification.
//! 4. Pending orders that are never paid are expired by a background sweeper.
//!
//! ## Background services
//!
//! With leader election enabled, only one replica runs the order expiry sweeper and the report
//! scheduler. Leadership is a PostgreSQL advisory lock held on a dedicated connection.
//!
//! ## Getting started
//!
//! ```no_run
//! use pixcheckout::{Application, Config, config::Args};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(&Args::parse())?;
//!     pixcheckout::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async { tokio::signal::ctrl_c().await.ok(); }).await
//! }
//! ```

pub mod analytics;
pub mod api;
pub mod audit;
pub mod auth;
pub mod automation;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod crypto;
pub mod db;
pub mod email;
pub mod errors;
pub mod jobs;
mod leader_election;
pub mod limits;
pub mod notifications;
pub mod openapi;
pub mod payment_providers;
pub mod reports;
pub mod security;
pub mod settings;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod validation;
pub mod webhooks;
pub mod whatsapp;

#[cfg(test)]
pub mod test_utils;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue, Method},
    routing::{delete, get, patch, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers,
    auth::password::{self, Argon2Params},
    config::CorsOrigin,
    crypto::SecretCipher,
    db::{
        handlers::{Users, file_storage::FileStorage, file_storage::LocalFileStorage},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    email::EmailService,
    errors::Error,
    limits::Limiters,
    openapi::ApiDoc,
    whatsapp::WhatsAppClient,
};

pub use config::Config;
pub use types::UserId;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config.clone())
///     .cipher(Arc::new(SecretCipher::new("secret")))
///     .email(Arc::new(EmailService::new(&config.email)?))
///     .whatsapp(WhatsAppClient::new(&config.whatsapp))
///     .storage(Arc::new(LocalFileStorage::new(config.storage.path.clone())))
///     .limiters(Limiters::new(&config.limits))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Encrypts gateway and WhatsApp credentials at rest
    pub cipher: Arc<SecretCipher>,
    pub email: Arc<EmailService>,
    pub whatsapp: WhatsAppClient,
    pub storage: Arc<dyn FileStorage>,
    pub limiters: Limiters,
}

impl AppState {
    /// Build the state from configuration, wiring every service against `pool`.
    pub fn from_config(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let secret_key = config
            .secret_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("secret_key must be configured")?;

        Ok(Self::builder()
            .db(pool)
            .cipher(Arc::new(SecretCipher::new(secret_key)))
            .email(Arc::new(EmailService::new(&config.email)?))
            .whatsapp(WhatsAppClient::new(&config.whatsapp))
            .storage(Arc::new(LocalFileStorage::new(config.storage.path.clone())))
            .limiters(Limiters::new(&config.limits))
            .config(config)
            .build())
    }
}

/// Install the aws-lc-rs rustls provider used by every outbound TLS client. Calls after the
/// first are no-ops.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Get the pixcheckout database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user, or reset its password if it already exists.
///
/// Idempotent: called on every startup so the configured admin account always exists. When
/// `password` is `None` an existing password is left alone.
#[instrument(skip_all, fields(email = %email))]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, params: Argon2Params, db: &PgPool) -> errors::Result<UserId> {
    let email = email.trim().to_lowercase();
    let password_hash = password.map(|pwd| password::hash_string_with_params(pwd, Some(params))).transpose()?;

    let mut tx = db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut tx);

    let user_id = match users.get_user_by_email(&email).await? {
        Some(existing) => {
            if password_hash.is_some() || !existing.is_admin {
                users
                    .update(
                        existing.id,
                        &UserUpdateDBRequest {
                            password_hash,
                            is_admin: Some(true),
                            ..Default::default()
                        },
                    )
                    .await?;
                debug!("Updated existing admin user");
            }
            existing.id
        }
        None => {
            let created = users
                .create(&UserCreateDBRequest {
                    email: email.clone(),
                    display_name: None,
                    password_hash,
                    is_admin: true,
                })
                .await?;
            info!("Created initial admin user");
            created.id
        }
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(user_id)
}

/// Connect to PostgreSQL (unless a pool is supplied), run migrations and ensure the admin user.
async fn setup_database(config: &Config, pool: Option<PgPool>) -> anyhow::Result<PgPool> {
    let pool = match pool {
        Some(pool) => pool,
        None => {
            let settings = &config.database.pool;
            let mut options = PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .min_connections(settings.min_connections)
                .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
            if settings.idle_timeout_secs > 0 {
                options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
            }
            if settings.max_lifetime_secs > 0 {
                options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
            }
            options
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?
        }
    };

    migrator().run(&pool).await.context("Failed to run migrations")?;
    create_initial_admin_user(
        &config.admin_email,
        config.admin_password.as_deref(),
        Argon2Params::from(&config.auth.native.password),
        &pool,
    )
    .await?;

    Ok(pool)
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;
    let mut origins = Vec::new();
    for origin in &cors_config.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Browsers send the origin without a trailing slash
            CorsOrigin::Url(url) => url.origin().ascii_serialization().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers([http::header::LOCATION, http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Body limit for upload routes. Zero in config means unlimited.
fn upload_body_limit(config: &Config) -> DefaultBodyLimit {
    match config.limits.files.max_file_size {
        0 => DefaultBodyLimit::disable(),
        // Leave headroom for multipart boundaries and text fields
        max => DefaultBodyLimit::max(usize::try_from(max).unwrap_or(usize::MAX).saturating_add(64 * 1024)),
    }
}

/// Build the main application router.
///
/// - `/api/v1`: public storefront
/// - `/authentication`: admin login and session
/// - `/admin/api/v1`: admin API, documented at `/admin/docs`
/// - `/webhooks/primepag`: gateway callbacks
/// - `/internal/metrics`: Prometheus metrics when enabled
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let storefront_routes = Router::new()
        .route("/products/{id}", get(handlers::products::get_public_product))
        .route("/checkout", post(handlers::checkout::create_checkout))
        .route("/orders/{id}/status", get(handlers::checkout::get_order_status))
        .route("/orders/{id}/simulate", post(handlers::checkout::simulate_payment))
        .route("/coupons/validate", post(handlers::checkout::validate_coupon_preview))
        .route("/payment-links/{token}", get(handlers::checkout::resolve_payment_link));

    let auth_routes = Router::new()
        .route("/authentication/login", post(handlers::auth::login))
        .route("/authentication/logout", post(handlers::auth::logout))
        .route("/authentication/me", get(handlers::auth::me));

    let body_limit = upload_body_limit(&state.config);
    let upload_routes = Router::new()
        .route("/files", post(handlers::files::upload_file))
        .route("/backups/restore/upload", post(handlers::backups::restore_uploaded_backup))
        .layer(body_limit);

    let admin_routes = Router::new()
        .merge(upload_routes)
        // Catalog
        .route("/products", get(handlers::products::list_products).post(handlers::products::create_product))
        .route(
            "/products/{id}",
            get(handlers::products::get_product)
                .patch(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        // Orders and customers
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route("/orders/{id}/status", patch(handlers::orders::update_order_status))
        .route("/orders/{id}/cancel", post(handlers::orders::cancel_order))
        .route("/customers", get(handlers::customers::list_customers))
        .route("/customers/{id}", get(handlers::customers::get_customer))
        // Coupons and payment links
        .route("/coupons", get(handlers::coupons::list_coupons).post(handlers::coupons::create_coupon))
        .route(
            "/coupons/{id}",
            get(handlers::coupons::get_coupon)
                .patch(handlers::coupons::update_coupon)
                .delete(handlers::coupons::delete_coupon),
        )
        .route(
            "/payment-links",
            get(handlers::payment_links::list_payment_links).post(handlers::payment_links::create_payment_link),
        )
        .route("/payment-links/{id}/deactivate", post(handlers::payment_links::deactivate_payment_link))
        // Inbox and audit trail
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route("/notifications/read-all", post(handlers::notifications::mark_all_notifications_read))
        .route("/notifications/{id}", delete(handlers::notifications::delete_notification))
        .route("/notifications/{id}/read", post(handlers::notifications::mark_notification_read))
        .route("/audit-logs", get(handlers::audit_logs::list_audit_logs))
        // Settings
        .route("/settings", get(handlers::settings::get_settings))
        .route("/settings/payment", put(handlers::settings::update_payment_settings))
        .route("/settings/whatsapp", put(handlers::settings::update_whatsapp_settings))
        .route("/settings/notification", put(handlers::settings::update_notification_settings))
        // Messaging
        .route("/email/send", post(handlers::messaging::send_email))
        .route("/email/logs", get(handlers::messaging::list_email_logs))
        .route("/whatsapp/send", post(handlers::messaging::send_whatsapp))
        .route("/whatsapp/logs", get(handlers::messaging::list_whatsapp_logs))
        .route("/whatsapp/resend", post(handlers::messaging::resend_failed_whatsapp))
        // Reports
        .route(
            "/reports/schedules",
            get(handlers::reports::list_schedules).post(handlers::reports::create_schedule),
        )
        .route(
            "/reports/schedules/{id}",
            get(handlers::reports::get_schedule)
                .patch(handlers::reports::update_schedule)
                .delete(handlers::reports::delete_schedule),
        )
        .route("/reports/schedules/{id}/generate", post(handlers::reports::generate_report))
        .route("/reports/logs", get(handlers::reports::list_report_logs))
        .route("/reports/dashboard", get(handlers::reports::dashboard_stats))
        .route("/reports/daily-summary", post(handlers::reports::send_daily_summary))
        // Analytics
        .route(
            "/analytics/events",
            get(handlers::analytics::list_events).post(handlers::analytics::track_event),
        )
        .route("/analytics/metrics/calculate", post(handlers::analytics::calculate_metrics))
        .route("/analytics/metrics/{name}", get(handlers::analytics::metric_history))
        .route("/analytics/predictions", post(handlers::analytics::generate_prediction))
        .route(
            "/analytics/dashboards",
            get(handlers::analytics::list_dashboards).post(handlers::analytics::create_dashboard),
        )
        .route("/analytics/dashboards/{id}", delete(handlers::analytics::delete_dashboard))
        .route("/analytics/dashboards/{id}/data", get(handlers::analytics::dashboard_data))
        // Automation
        .route(
            "/automation/workflows",
            get(handlers::automation::list_workflows).post(handlers::automation::create_workflow),
        )
        .route(
            "/automation/workflows/{id}",
            get(handlers::automation::get_workflow)
                .patch(handlers::automation::update_workflow)
                .delete(handlers::automation::delete_workflow),
        )
        .route("/automation/workflows/{id}/execute", post(handlers::automation::execute_workflow))
        .route(
            "/automation/rules",
            get(handlers::automation::list_rules).post(handlers::automation::create_rule),
        )
        .route("/automation/rules/evaluate", post(handlers::automation::evaluate_rules))
        .route(
            "/automation/rules/{id}",
            get(handlers::automation::get_rule)
                .patch(handlers::automation::update_rule)
                .delete(handlers::automation::delete_rule),
        )
        .route("/automation/executions", get(handlers::automation::list_executions))
        // Files and backups
        .route("/files", get(handlers::files::list_files))
        .route(
            "/files/{id}",
            get(handlers::files::get_file)
                .patch(handlers::files::update_file_metadata)
                .delete(handlers::files::delete_file),
        )
        .route("/files/{id}/download", get(handlers::files::download_file))
        .route("/backups", post(handlers::backups::create_backup))
        .route("/backups/logs", get(handlers::backups::list_backup_logs))
        .route("/backups/restore", post(handlers::backups::restore_backup))
        // Security and maintenance
        .route(
            "/security/blocked-ips",
            get(handlers::security::list_blocked_ips).post(handlers::security::block_ip),
        )
        .route("/security/blocked-ips/{id}", delete(handlers::security::unblock_ip))
        .route("/security/login-attempts", get(handlers::security::list_login_attempts))
        .route("/jobs/expire-orders", post(handlers::jobs::expire_orders));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        // Gateway callbacks (external service, signed)
        .route("/webhooks/primepag", post(handlers::webhooks::primepag_webhook))
        .merge(auth_routes)
        .nest("/api/v1", storefront_routes)
        .nest("/admin/api/v1", admin_routes)
        .with_state(state.clone())
        .route("/admin/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/admin/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Leader-only tasks, started when leadership is gained and cancelled when it is lost.
fn spawn_leader_tasks(state: &AppState, token: &CancellationToken) -> Vec<JoinHandle<()>> {
    let services = &state.config.background_services;
    let mut handles = Vec::new();

    if services.order_expiry.enabled {
        handles.push(tokio::spawn(jobs::run_order_expiry(
            state.db.clone(),
            services.order_expiry.interval,
            token.clone(),
        )));
    }
    if services.report_scheduler.enabled {
        handles.push(tokio::spawn(reports::run_scheduler(
            state.clone(),
            services.report_scheduler.poll_interval,
            token.clone(),
        )));
    }
    handles
}

/// Purge idle checkout rate-limit windows so the map does not grow with every visitor.
async fn run_rate_limit_purge(limiters: Limiters, window: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(window.max(Duration::from_secs(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let purged = limiters.checkout.purge_expired(window);
                if purged > 0 {
                    debug!(purged, "Purged expired checkout rate-limit windows");
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

/// Background tasks that run alongside the HTTP server.
///
/// Dropping this struct cancels the shutdown token through `drop_guard`, which stops every task.
pub struct BackgroundServices {
    is_leader: Arc<AtomicBool>,
    background_tasks: Vec<JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::Relaxed)
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Leader election lock ID ("PIXCHKOT" in hex)
const LEADER_LOCK_ID: i64 = 0x5049_5843_484B_4F54_i64;
const LEADER_CHECK_INTERVAL: Duration = Duration::from_secs(10);

fn setup_background_services(state: &AppState, shutdown_token: CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    background_tasks.push(tokio::spawn(run_rate_limit_purge(
        state.limiters.clone(),
        state.config.checkout.rate_limit.window,
        shutdown_token.clone(),
    )));

    let is_leader = Arc::new(AtomicBool::new(false));

    if !state.config.background_services.leader_election.enabled {
        info!("Launching without leader election: running as leader");
        is_leader.store(true, Ordering::Relaxed);
        background_tasks.extend(spawn_leader_tasks(state, &shutdown_token));
    } else {
        info!("Starting leader election - will attempt to acquire leadership");

        // Cancelled when leadership is lost, replaced when it is regained
        let session: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
        let session_gain = session.clone();
        let session_lose = session.clone();
        let state_gain = state.clone();
        let parent_token = shutdown_token.clone();

        background_tasks.push(tokio::spawn(leader_election::leader_election_task(
            state.db.clone(),
            is_leader.clone(),
            LEADER_LOCK_ID,
            LEADER_CHECK_INTERVAL,
            shutdown_token.clone(),
            move || {
                let session = session_gain.clone();
                let state = state_gain.clone();
                let token = parent_token.child_token();
                async move {
                    spawn_leader_tasks(&state, &token);
                    *session.lock().await = Some(token);
                    info!("Leader tasks started");
                    Ok(())
                }
            },
            move || {
                let session = session_lose.clone();
                async move {
                    if let Some(token) = session.lock().await.take() {
                        token.cancel();
                        info!("Leader tasks stopped");
                    }
                    Ok(())
                }
            },
        )));
    }

    BackgroundServices {
        is_leader,
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns the router, the pool and the background services.
///
/// 1. [`Application::new`] connects to the database, runs migrations, ensures the admin user
///    and starts background services
/// 2. [`Application::serve`] binds the TCP listener and serves until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool (used by tests)
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting pixcheckout with configuration: {:#?}", config);

        let pool = setup_database(&config, pool).await?;
        let state = AppState::from_config(pool.clone(), config.clone())?;
        let bg_services = setup_background_services(&state, CancellationToken::new());
        let router = build_router(&state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "pixcheckout listening on http://{}, available at {}",
            bind_addr, self.config.public_url
        );

        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_ADMIN_PASSWORD, create_test_config, create_test_server, create_test_state};
    use axum::http::StatusCode;

    #[test]
    fn test_outbound_clients_install_crypto_provider() {
        let _whatsapp = WhatsAppClient::new(&config::WhatsAppConfig::default());
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());

        // Repeated installs are harmless
        install_crypto_provider();
        install_crypto_provider();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_initial_admin_user_is_idempotent(pool: PgPool) {
        let params = Argon2Params {
            memory_kib: 128,
            iterations: 1,
            parallelism: 1,
        };
        let first = create_initial_admin_user("Owner@Example.com", Some("first-password"), params, &pool)
            .await
            .unwrap();
        let second = create_initial_admin_user("owner@example.com", Some("second-password"), params, &pool)
            .await
            .unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).get_user_by_email("owner@example.com").await.unwrap().unwrap();
        assert!(user.is_admin);
        let hash = user.password_hash.unwrap();
        assert!(password::verify_string("second-password", &hash).unwrap());

        // No password keeps the existing one
        create_initial_admin_user("owner@example.com", None, params, &pool).await.unwrap();
        let user = Users::new(&mut conn).get_user_by_email("owner@example.com").await.unwrap().unwrap();
        assert_eq!(user.password_hash.unwrap(), hash);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_boots_and_logs_in_configured_admin(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_email = "boot@example.com".to_string();
        config.admin_password = Some(TEST_ADMIN_PASSWORD.to_string());

        let app = Application::new_with_pool(config, Some(pool)).await.unwrap();
        let (server, bg_services) = app.into_test_server();
        assert!(bg_services.is_leader());

        server.get("/healthz").await.assert_text("OK");

        let response = server
            .post("/authentication/login")
            .json(&serde_json::json!({"email": "boot@example.com", "password": TEST_ADMIN_PASSWORD}))
            .await;
        response.assert_status_ok();

        bg_services.shutdown().await;
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_docs_and_admin_guard(pool: PgPool) {
        let state = create_test_state(pool).await;
        let server = create_test_server(state);

        server.get("/admin/docs").await.assert_status_ok();
        let doc: serde_json::Value = server.get("/admin/openapi.json").await.json();
        assert!(doc["paths"]["/api/v1/checkout"].is_object());

        server.get("/admin/api/v1/orders").await.assert_status(StatusCode::UNAUTHORIZED);
        server.get("/api/v1/does-not-exist").await.assert_status_not_found();
    }

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let mut config = Config::default();
        assert!(create_cors_layer(&config).is_ok());

        config.auth.security.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.auth.security.cors.allow_credentials = false;
        config.auth.security.cors.max_age = None;
        assert!(create_cors_layer(&config).is_ok());
    }
}
