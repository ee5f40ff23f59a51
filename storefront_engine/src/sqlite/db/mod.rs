//! # SQLite database methods
//!
//! Low-level SQLite interactions, written as free functions that take a `&mut SqliteConnection`. Callers pass a
//! pooled connection for one-off reads, or `&mut *tx` when several calls must commit together.
//!
//! Every counter update is a single conditional statement ("subtract if sufficient", "set Paid if Unpaid"), so
//! concurrent requests can only ever observe a whole change or none of it.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod affiliates;
pub mod orders;
pub mod products;
pub mod stores;

const SQLITE_DB_URL: &str = "sqlite://data/storefront.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_url() -> String {
    let result = env::var("SF_DATABASE_URL").unwrap_or_else(|_| {
        info!("SF_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Opens a pool in WAL mode with foreign keys enforced. Writers that collide wait on the busy timeout rather than
/// failing immediately.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
