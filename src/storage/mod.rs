//! # Persistence
//!
//! Product and user operations backed by SQLite through `sqlx`.
//!
//! Each entity has a `*Store` trait (the seam the dispatcher depends on) and
//! a `Sql*Repository` implementing it against a [`Db`].
//!
//! ## Transactions
//!
//! Writes follow one shape:
//!
//! ```rust,ignore
//! let mut tx = self.db.begin().await?;
//! // reads and writes through `&mut *tx`
//! tx.commit().await?;
//! ```
//!
//! `commit` is only reached on the success path. Any `?` or `return Err(..)`
//! before it drops the transaction, and sqlx rolls back a transaction that
//! is dropped without being committed. The same happens if the task panics
//! while the transaction is alive.
//!
//! ## Schema
//!
//! The tables are expected to exist. [`Db::ensure_schema`] creates them when
//! missing, for tests and first runs; it never alters existing tables.

pub mod products;
pub mod users;

pub use products::*;
pub use users::*;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

const CREATE_PRODUCTS_SQL: &str = "CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id TEXT NOT NULL,
    name TEXT NOT NULL UNIQUE,
    price INTEGER NOT NULL,
    stock INTEGER NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL
)";

const CREATE_USERS_SQL: &str = "CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE
)";

/// Handle to the connection pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url`, creating the database file if needed.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or no connection can be made.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        info!(database_url, max_connections, "Database connected");
        Ok(Self::new(pool))
    }

    /// A private in-memory database with the schema in place.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// every SQLite in-memory connection is its own database.
    ///
    /// # Errors
    /// Returns an error if the connection or the schema bootstrap fails.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self::new(pool);
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Creates the `products` and `users` tables if they do not exist.
    ///
    /// # Errors
    /// Returns the underlying error if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_PRODUCTS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_USERS_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Starts a transaction. It rolls back unless `commit` is called.
    ///
    /// # Errors
    /// Returns an error if no connection is available or `BEGIN` fails.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
