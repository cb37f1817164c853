//! `SqliteDatabase` is the SQLite implementation of [`LedgerStore`].
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{db_url, invoices, new_pool};
use crate::{
    db_types::{InvoiceId, InvoiceRecord, InvoiceUpdate, NewInvoice},
    traits::{LedgerError, LedgerStore},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl LedgerStore for SqliteDatabase {
    async fn find(&self, invoice_id: &InvoiceId) -> Result<Option<InvoiceRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        invoices::fetch_invoice(invoice_id, &mut conn).await
    }

    async fn append(&self, invoice: NewInvoice) -> Result<(InvoiceRecord, bool), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        invoices::idempotent_insert(invoice, &mut conn).await
    }

    async fn update_fields(
        &self,
        invoice_id: &InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Option<InvoiceRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        invoices::update_invoice(invoice_id, update, Utc::now(), &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `IPG_DATABASE_URL` or the default url.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
