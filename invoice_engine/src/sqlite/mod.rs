//! SQLite ledger backend for the invoice engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
