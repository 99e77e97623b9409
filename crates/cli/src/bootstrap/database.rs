use sentinel_dns_domain::config::DatabaseConfig;
use sentinel_dns_infrastructure::database::{create_pool, init_schema};
use sqlx::SqlitePool;
use tracing::info;

pub async fn init_database(cfg: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    info!(path = %cfg.path, "Initializing database");

    let pool = create_pool(&cfg.path, cfg.max_connections).await?;
    init_schema(&pool).await?;

    info!(max_connections = cfg.max_connections, "Database initialized");
    Ok(pool)
}
