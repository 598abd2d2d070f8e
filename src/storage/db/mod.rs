//! Database connection layer.
//!
//! Currently supports SQLite through sqlx.
//!
//! - `SqlitePool`: Connection pool wrapper for SQLite, with embedded migrations
//!
//! # Example
//!
//! ```ignore
//! let pool = SqlitePool::connect("sqlite:data/cloudmetrics.db?mode=rwc").await?;
//! pool.migrate().await?;
//! let row = sqlx::query("SELECT 1").fetch_one(pool.inner()).await?;
//! ```

mod sqlite;

pub(crate) use sqlite::is_memory_url;
pub use sqlite::{DEFAULT_MAX_CONNECTIONS, SqlitePool};
