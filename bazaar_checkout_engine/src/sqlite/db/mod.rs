//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite interactions.
//!
//! All interactions are maintained by simple functions (rather than stateful structs) that accept
//! a `&mut SqliteConnection` argument. Callers obtain a connection from a pool, or open a
//! transaction when a flow needs atomicity, and pass `&mut *tx` through without any other
//! changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod carts;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod variants;

const SQLITE_DB_URL: &str = "sqlite://data/bazaar_store.db";

pub fn db_url() -> String {
    let result = env::var("BCG_DATABASE_URL").unwrap_or_else(|_| {
        info!("BCG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
