//! Database layer
//!
//! SQLite is the default backend; MySQL is selected through
//! `database.driver` in the configuration. Both sit behind the
//! `DatabasePool` trait so repositories pick the SQL dialect at runtime.
//!
//! ```ignore
//! use signlearn::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
