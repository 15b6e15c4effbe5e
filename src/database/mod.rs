pub mod error;
pub mod memory;
pub mod partner_store;
pub mod payment_store;
pub mod refund_store;
pub mod usage_log_store;

use crate::database::error::StoreError;
use crate::database::memory::{
    InMemoryPartnerStore, InMemoryPaymentStore, InMemoryRefundStore, InMemoryUsageLogStore,
};
use crate::database::partner_store::{PartnerStore, PgPartnerStore};
use crate::database::payment_store::{PaymentStore, PgPaymentStore};
use crate::database::refund_store::{PgRefundStore, RefundStore};
use crate::database::usage_log_store::{PgUsageLogStore, UsageLogStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error as log_error, info};

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 5,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Initialize the database connection pool
pub async fn init_pool(database_url: &str, config: Option<PoolConfig>) -> Result<PgPool, StoreError> {
    let config = config.unwrap_or_default();

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "initializing database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("failed to initialize database pool: {}", e);
            StoreError::from_sqlx(e)
        })?;

    pool.acquire().await.map_err(StoreError::from_sqlx)?;

    info!("database pool initialized");
    Ok(pool)
}

/// The store bundle every component works against. Backed by Postgres in
/// production and by the in-memory implementations when no database is
/// configured or under test.
#[derive(Clone)]
pub struct Stores {
    pub partners: Arc<dyn PartnerStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub refunds: Arc<dyn RefundStore>,
    pub usage_logs: Arc<dyn UsageLogStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            partners: Arc::new(PgPartnerStore::new(pool.clone())),
            payments: Arc::new(PgPaymentStore::new(pool.clone())),
            refunds: Arc::new(PgRefundStore::new(pool.clone())),
            usage_logs: Arc::new(PgUsageLogStore::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            partners: Arc::new(InMemoryPartnerStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
            refunds: Arc::new(InMemoryRefundStore::new()),
            usage_logs: Arc::new(InMemoryUsageLogStore::new()),
        }
    }
}
