//! # SQLite Database methods
//!
//! Low-level ledger queries. Each is a plain function taking a `&mut SqliteConnection`, so callers can use a pooled
//! connection or run several of them inside a transaction without any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod invoices;

const SQLITE_DB_URL: &str = "sqlite://data/invoices.db";

pub fn db_url() -> String {
    let result = env::var("IPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ IPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
