use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use beach_tickets::config::Config;
use beach_tickets::gateway::XenditClient;
use beach_tickets::routes::create_routes;
use beach_tickets::services::{CheckoutSessions, LogNotifier, OrderService, PromoEvaluator};
use beach_tickets::store::PgStore;
use beach_tickets::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    if config.gateway.callback_token.is_empty() {
        tracing::warn!("XENDIT_CALLBACK_TOKEN is not set; every invoice webhook will be rejected");
    }
    if config.gateway.secret_key.is_empty() {
        tracing::warn!("XENDIT_SECRET_KEY is not set; invoice creation will fail");
    }

    let store = Arc::new(PgStore::new(pool));
    let gateway =
        XenditClient::new(&config.gateway).expect("Failed to build payment gateway client");

    let sessions = CheckoutSessions::new(config.checkout_session_ttl);
    sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL);

    let state = AppState {
        orders: OrderService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(gateway),
            Arc::new(LogNotifier),
            config.app_url.clone(),
        ),
        promos: PromoEvaluator::new(store.clone()),
        catalog: store,
        sessions,
        app_env: config.app_env,
        callback_token: Arc::from(config.gateway.callback_token.as_str()),
    };

    let app: Router = create_routes(state, &config.cors_allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(env = ?config.app_env, "Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
