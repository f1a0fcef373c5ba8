use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    pub async fn setup_connection() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("[PostgresClient::setup_connection] DATABASE_URL is not set")?;
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(&database_url)
            .await
            .context("[PostgresClient::setup_connection] failed to connect")?;
        Ok(Self { pool })
    }

    pub fn get_client(&self) -> &PgPool {
        &self.pool
    }
}
