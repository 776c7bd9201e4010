use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

pub async fn init_db(database_url: &str) -> anyhow::Result<Pool<Postgres>> {
    let max_conns: u32 = std::env::var("SHIPWATCH_DB_MAX_CONNS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_conns)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    info!("migrations applied");
    Ok(pool)
}
