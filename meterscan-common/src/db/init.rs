//! Database initialization
//!
//! Opens (or creates) the SQLite database named by `DATABASE_URL` and
//! brings the schema up to date. Table creation is idempotent, so this
//! runs on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Connect to the database and create tables if needed
pub async fn init_database(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("Opened database: {}", redact_url(database_url));

    // WAL allows concurrent readers alongside the single writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema.
///
/// Limited to one connection that is never recycled: every SQLite
/// `:memory:` connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_measures_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the measures table
///
/// `measure_month` is the UTC calendar month of `measure_datetime`
/// ("YYYY-MM"); the table-level UNIQUE constraint allows one reading per
/// customer, meter type and month even under concurrent inserts.
pub async fn create_measures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measures (
            id TEXT PRIMARY KEY,
            measure_uuid TEXT NOT NULL UNIQUE,
            customer_code TEXT NOT NULL CHECK (length(trim(customer_code)) > 0),
            measure_datetime TEXT NOT NULL,
            measure_month TEXT NOT NULL,
            measure_type TEXT NOT NULL CHECK (measure_type IN ('WATER', 'GAS')),
            image_url TEXT NOT NULL,
            measure_value REAL CHECK (measure_value IS NULL OR measure_value >= 0),
            has_confirmed INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (customer_code, measure_type, measure_month)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_measures_customer ON measures(customer_code, measure_datetime)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Strip credentials from a database URL before logging it
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
