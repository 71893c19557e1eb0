//! Database pool setup and migrations.
//!
//! DESIGN
//! ======
//! One `PgPool` for the whole process, created at startup. Migrations are
//! embedded with `sqlx::migrate!` and run before the server binds, so a
//! booted process always sees the current schema.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::services::registry::env_parse;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connect to Postgres and run embedded migrations.
///
/// # Errors
///
/// Returns `sqlx::Error` when the database is unreachable or a migration
/// fails to apply.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    info!(max_connections, "database pool ready");

    Ok(pool)
}
