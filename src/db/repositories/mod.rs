//! Database repositories
//!
//! One repository per table, each a trait plus an SQLx implementation that
//! serves both SQLite and MySQL.

pub mod account;
pub mod session;

pub use account::{AccountRepository, SqlxAccountRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
