use dotenv::dotenv;
use paygate::config::AppConfig;
use paygate::database::{init_pool, PoolConfig, Stores};
use paygate::logging::init_tracing;
use paygate::providers::adapter::ProviderAdapter;
use paygate::providers::card_rail::{CardRailAdapter, CardRailConfig};
use paygate::providers::mobile_money::{MobileMoneyAdapter, MobileMoneyConfig};
use paygate::providers::types::ProviderFamily;
use paygate::{router, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

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

    info!("shutdown signal received, starting graceful shutdown");
}

fn build_adapters() -> HashMap<ProviderFamily, Arc<dyn ProviderAdapter>> {
    let mut adapters: HashMap<ProviderFamily, Arc<dyn ProviderAdapter>> = HashMap::new();

    match MobileMoneyConfig::from_env().map(MobileMoneyAdapter::new) {
        Some(Ok(adapter)) => {
            adapters.insert(ProviderFamily::MobileMoney, Arc::new(adapter));
            info!("mobile-money adapter configured");
        }
        Some(Err(err)) => warn!(error = %err, "mobile-money adapter failed to initialize"),
        None => warn!("mobile-money credentials not set, live charges for this family will fail"),
    }

    match CardRailConfig::from_env().map(CardRailAdapter::new) {
        Some(Ok(adapter)) => {
            adapters.insert(ProviderFamily::CardRail, Arc::new(adapter));
            info!("card-rail adapter configured");
        }
        Some(Err(err)) => warn!(error = %err, "card-rail adapter failed to initialize"),
        None => warn!("card-rail credentials not set, live charges for this family will fail"),
    }

    adapters
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "starting payment gateway"
    );

    let stores = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = init_pool(&database_url, Some(PoolConfig::default())).await?;
            Stores::postgres(pool)
        }
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory stores");
            Stores::in_memory()
        }
    };

    let state = AppState::new(config.clone(), stores, build_adapters());
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shutdown complete");
    Ok(())
}
