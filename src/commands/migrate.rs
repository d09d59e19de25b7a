use anyhow::Result;
use std::time::Duration;
use tracing::info;

use skylog::config::DatabaseArgs;
use skylog::db;

#[tracing::instrument(skip_all)]
pub async fn handle_migrate(database: DatabaseArgs) -> Result<()> {
    let pool = db::create_pool(&database.database_url, 1, Duration::from_secs(10), None)?;
    let applied = db::run_migrations(&pool).await?;

    if applied == 0 {
        info!("Database schema is up to date");
    } else {
        info!("Applied {} migration(s)", applied);
    }
    Ok(())
}
