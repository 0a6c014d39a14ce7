//! Test fixtures: configuration, application state and seeded rows.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum_test::TestServer;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{password, session},
    config::{
        AuthConfig, BackgroundServicesConfig, Config, EmailConfig, EmailTransportConfig, LeaderElectionConfig, NativeAuthConfig,
        PasswordConfig, PaymentConfig, PoolSettings, SessionConfig, StorageConfig,
    },
    db::{
        handlers::{Customers, Orders, Products, Repository, Users},
        models::{
            customers::{Customer, CustomerUpsertDBRequest},
            orders::{Order, OrderCreateDBRequest, OrderPaymentUpdate, OrderStatus},
            products::{Product, ProductCreateDBRequest, ProductType},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    types::{CustomerId, ProductId},
};

pub const TEST_ADMIN_PASSWORD: &str = "correct-horse-battery";

fn scratch_dir(kind: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pixcheckout-test-{kind}-{}", Uuid::new_v4()))
}

pub fn create_test_config() -> Config {
    crate::install_crypto_provider();
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: AuthConfig {
            native: NativeAuthConfig {
                enabled: true,
                // Cheap hashing keeps login tests fast
                password: PasswordConfig {
                    argon2_memory_kib: 128,
                    argon2_iterations: 1,
                    argon2_parallelism: 1,
                    ..Default::default()
                },
                session: SessionConfig {
                    cookie_secure: false,
                    ..Default::default()
                },
            },
            ..Default::default()
        },
        payment: PaymentConfig {
            allow_simulation: true,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        storage: StorageConfig {
            path: scratch_dir("storage"),
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: scratch_dir("emails").to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        background_services: BackgroundServicesConfig {
            leader_election: LeaderElectionConfig { enabled: false },
            ..Default::default()
        },
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    };
    config.database.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..Default::default()
    };
    config
}

pub async fn create_test_state(pool: PgPool) -> AppState {
    AppState::from_config(pool, create_test_config()).expect("Failed to build test state")
}

pub fn create_test_server(state: AppState) -> TestServer {
    let router = crate::build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Server listening on a real socket, so handlers see the peer address through `ConnectInfo`.
pub fn create_test_http_server(state: AppState) -> TestServer {
    let app = crate::build_router(&state)
        .expect("Failed to build router")
        .into_make_service_with_connect_info::<SocketAddr>();
    TestServer::builder()
        .http_transport()
        .build(app)
        .expect("Failed to create test server")
}

/// Admin account with [`TEST_ADMIN_PASSWORD`] and a unique email.
pub async fn create_test_admin_user(pool: &PgPool) -> UserDBResponse {
    let config = create_test_config();
    let hash = password::hash_string_with_params(TEST_ADMIN_PASSWORD, Some((&config.auth.native.password).into()))
        .expect("Failed to hash password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: format!("admin-{}@example.com", Uuid::new_v4().simple()),
            display_name: Some("Test Admin".to_string()),
            password_hash: Some(hash),
            is_admin: true,
        })
        .await
        .expect("Failed to create admin user")
}

/// `cookie` header value carrying a session for `user`.
pub fn admin_cookie(config: &Config, user: &UserDBResponse) -> String {
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        is_admin: user.is_admin,
    };
    let token = session::create_session_token(&current, config).expect("Failed to create session token");
    format!("{}={token}", config.auth.native.session.cookie_name)
}

pub async fn create_test_customer(pool: &PgPool) -> Customer {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Customers::new(&mut conn)
        .upsert_by_email(&CustomerUpsertDBRequest {
            name: "Maria Silva".to_string(),
            email: format!("cliente-{}@example.com", Uuid::new_v4().simple()),
            cpf: "52998224725".to_string(),
            phone: "11987654321".to_string(),
        })
        .await
        .expect("Failed to create customer")
}

pub async fn create_test_product(pool: &PgPool, price: Decimal) -> Product {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Products::new(&mut conn)
        .create(&ProductCreateDBRequest {
            name: "Curso de Fotografia".to_string(),
            description: "Acesso vitalicio".to_string(),
            price,
            image_url: "https://example.com/curso.png".to_string(),
            product_type: ProductType::Service,
            active: true,
        })
        .await
        .expect("Failed to create product")
}

/// Order for the full product price, then moved to `status`.
pub async fn create_test_order(pool: &PgPool, customer_id: CustomerId, product_id: ProductId, status: OrderStatus) -> Order {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let product = Products::new(&mut conn)
        .get_by_id(product_id)
        .await
        .expect("Failed to load product")
        .expect("Product not found");

    let mut orders = Orders::new(&mut conn);
    let order = orders
        .create(&OrderCreateDBRequest {
            id: Uuid::new_v4(),
            customer_id,
            product_id,
            total_amount: product.price,
            discount_amount: Decimal::ZERO,
            coupon_id: None,
            expires_at: Utc::now() + chrono::Duration::minutes(30),
        })
        .await
        .expect("Failed to create order");

    match status {
        OrderStatus::Pending => order,
        OrderStatus::Paid => orders
            .apply_payment_update(
                order.id,
                &OrderPaymentUpdate {
                    status,
                    paid_at: Some(Utc::now()),
                    transaction_id: format!("txn_{}", Uuid::new_v4().simple()),
                    payment_method: Some("pix".to_string()),
                },
            )
            .await
            .expect("Failed to mark order paid")
            .expect("Order was already paid"),
        other => orders.update_status(order.id, other).await.expect("Failed to update order status"),
    }
}
