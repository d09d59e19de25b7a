use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::time::Duration;
use tracing::info;

use crate::visits_repo::PgPool;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

/// Sets `statement_timeout` on every new pooled connection, so the server
/// cancels and rolls back a statement the caller has already given up on
#[derive(Debug, Clone, Copy)]
pub struct StatementTimeout(pub Duration);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query(format!("SET statement_timeout = {}", self.0.as_millis()))
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Build the connection pool; fails if no connection can be made within `connection_timeout`
pub fn create_pool(
    database_url: &str,
    max_size: u32,
    connection_timeout: Duration,
    statement_timeout: Option<StatementTimeout>,
) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let mut builder = PgPool::builder()
        .max_size(max_size)
        .connection_timeout(connection_timeout);
    if let Some(timeout) = statement_timeout {
        builder = builder.connection_customizer(Box::new(timeout));
    }
    let pool = builder
        .build(manager)
        .context("Failed to create database connection pool")?;

    info!("Database connection pool created (max {} connections)", max_size);
    Ok(pool)
}

/// Apply any pending embedded migrations
pub async fn run_migrations(pool: &PgPool) -> Result<usize> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .context("Failed to get database connection for migrations")?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

        for version in &applied {
            info!("Applied migration {}", version);
        }
        Ok::<_, anyhow::Error>(applied.len())
    })
    .await?
}

