use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use storefront_api::{app, state::{AppState, AuthConfig}};
use storefront_core::payment::MockPaymentGateway;
use storefront_core::PaymentGateway;
use storefront_order::OrderReconciler;
use storefront_store::app_config::{Config, PaymentProvider};
use storefront_store::{DbClient, MercadoPagoClient, StoreOrderRepository, StoreProductRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Storefront API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let gateway: Arc<dyn PaymentGateway> = match config.payments.provider {
        PaymentProvider::MercadoPago => Arc::new(
            MercadoPagoClient::new(&config.payments).context("Failed to build Mercado Pago client")?,
        ),
        PaymentProvider::Mock => {
            tracing::warn!("Using mock payment gateway; no real payments will be processed");
            Arc::new(MockPaymentGateway::new())
        }
    };

    let reconciler = OrderReconciler::new(
        Arc::new(StoreOrderRepository::new(db.pool.clone())),
        Arc::new(StoreProductRepository::new(db.pool.clone())),
        gateway,
    )
    .with_gateway_timeout(config.payments.timeout());

    let app_state = AppState {
        reconciler: Arc::new(reconciler),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
