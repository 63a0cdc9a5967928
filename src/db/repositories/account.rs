//! Account repository
//!
//! Database access for the `user_account` table.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{NewAccount, UserAccount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const ACCOUNT_COLUMNS: &str = "id, username, email, password, created_at";

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account and return the stored row
    async fn create(&self, account: &NewAccount) -> Result<UserAccount>;

    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>>;

    /// First account whose username OR email equals `identifier`
    async fn find_by_login(&self, identifier: &str) -> Result<Option<UserAccount>>;
}

/// SQLx-based account repository for SQLite and MySQL
pub struct SqlxAccountRepository {
    pool: DynDatabasePool,
}

impl SqlxAccountRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccountRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool unavailable")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool unavailable")
    }
}

#[async_trait]
impl AccountRepository for SqlxAccountRepository {
    async fn create(&self, account: &NewAccount) -> Result<UserAccount> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_account_sqlite(self.sqlite()?, account).await,
            DatabaseDriver::Mysql => create_account_mysql(self.mysql()?, account).await,
        }
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        let sql = "SELECT 1 FROM user_account WHERE username = ? LIMIT 1";
        let exists = match self.pool.driver() {
            DatabaseDriver::Sqlite => exists_sqlite(self.sqlite()?, sql, username).await,
            DatabaseDriver::Mysql => exists_mysql(self.mysql()?, sql, username).await,
        };
        exists.context("Failed to check username")
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let sql = "SELECT 1 FROM user_account WHERE email = ? LIMIT 1";
        let exists = match self.pool.driver() {
            DatabaseDriver::Sqlite => exists_sqlite(self.sqlite()?, sql, email).await,
            DatabaseDriver::Mysql => exists_mysql(self.mysql()?, sql, email).await,
        };
        exists.context("Failed to check email")
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_by_username_sqlite(self.sqlite()?, username).await
            }
            DatabaseDriver::Mysql => find_by_username_mysql(self.mysql()?, username).await,
        }
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<UserAccount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_by_login_sqlite(self.sqlite()?, identifier).await,
            DatabaseDriver::Mysql => find_by_login_mysql(self.mysql()?, identifier).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_account_sqlite(pool: &SqlitePool, account: &NewAccount) -> Result<UserAccount> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO user_account (username, email, password, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    Ok(UserAccount {
        id: result.last_insert_rowid(),
        username: account.username.clone(),
        email: account.email.clone(),
        password: account.password_hash.clone(),
        created_at: now,
    })
}

async fn exists_sqlite(pool: &SqlitePool, sql: &str, value: &str) -> Result<bool> {
    let row = sqlx::query(sql).bind(value).fetch_optional(pool).await?;
    Ok(row.is_some())
}

async fn find_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<UserAccount>> {
    let sql = format!("SELECT {} FROM user_account WHERE username = ? LIMIT 1", ACCOUNT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get account by username")?;

    Ok(row.as_ref().map(row_to_account_sqlite))
}

async fn find_by_login_sqlite(pool: &SqlitePool, identifier: &str) -> Result<Option<UserAccount>> {
    let sql = format!(
        "SELECT {} FROM user_account WHERE username = ? OR email = ? ORDER BY id LIMIT 1",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .context("Failed to get account by username or email")?;

    Ok(row.as_ref().map(row_to_account_sqlite))
}

fn row_to_account_sqlite(row: &sqlx::sqlite::SqliteRow) -> UserAccount {
    UserAccount {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password: row.get("password"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_account_mysql(pool: &MySqlPool, account: &NewAccount) -> Result<UserAccount> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO user_account (username, email, password, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    Ok(UserAccount {
        id: result.last_insert_id() as i64,
        username: account.username.clone(),
        email: account.email.clone(),
        password: account.password_hash.clone(),
        created_at: now,
    })
}

async fn exists_mysql(pool: &MySqlPool, sql: &str, value: &str) -> Result<bool> {
    let row = sqlx::query(sql).bind(value).fetch_optional(pool).await?;
    Ok(row.is_some())
}

async fn find_by_username_mysql(pool: &MySqlPool, username: &str) -> Result<Option<UserAccount>> {
    let sql = format!("SELECT {} FROM user_account WHERE username = ? LIMIT 1", ACCOUNT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get account by username")?;

    Ok(row.as_ref().map(row_to_account_mysql))
}

async fn find_by_login_mysql(pool: &MySqlPool, identifier: &str) -> Result<Option<UserAccount>> {
    let sql = format!(
        "SELECT {} FROM user_account WHERE username = ? OR email = ? ORDER BY id LIMIT 1",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .context("Failed to get account by username or email")?;

    Ok(row.as_ref().map(row_to_account_mysql))
}

fn row_to_account_mysql(row: &sqlx::mysql::MySqlRow) -> UserAccount {
    UserAccount {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password: row.get("password"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxAccountRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAccountRepository::new(pool)
    }

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$v=19$stub".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_account() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&new_account("signer", "signer@example.com"))
            .await
            .expect("Failed to create account");

        assert!(created.id > 0);
        assert_eq!(created.username, "signer");
        assert_eq!(created.password, "$argon2id$v=19$stub");
    }

    #[tokio::test]
    async fn test_create_duplicate_username_fails() {
        let repo = setup_test_repo().await;
        repo.create(&new_account("signer", "a@example.com")).await.unwrap();

        let result = repo.create(&new_account("signer", "b@example.com")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exists_checks() {
        let repo = setup_test_repo().await;
        repo.create(&new_account("signer", "signer@example.com")).await.unwrap();

        assert!(repo.exists_by_username("signer").await.unwrap());
        assert!(!repo.exists_by_username("other").await.unwrap());
        assert!(repo.exists_by_email("signer@example.com").await.unwrap());
        assert!(!repo.exists_by_email("other@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_username() {
        let repo = setup_test_repo().await;
        repo.create(&new_account("signer", "signer@example.com")).await.unwrap();

        let found = repo
            .find_by_username("signer")
            .await
            .unwrap()
            .expect("Account not found");
        assert_eq!(found.email, "signer@example.com");

        assert!(repo.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_login_matches_username_or_email() {
        let repo = setup_test_repo().await;
        repo.create(&new_account("signer", "signer@example.com")).await.unwrap();

        let by_name = repo.find_by_login("signer").await.unwrap().unwrap();
        let by_email = repo.find_by_login("signer@example.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, by_email.id);

        assert!(repo.find_by_login("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_login_returns_first_row() {
        let repo = setup_test_repo().await;
        // One account's email is another account's username
        let first = repo
            .create(&new_account("alpha", "shared@example.com"))
            .await
            .unwrap();
        repo.create(&new_account("shared@example.com", "beta@example.com"))
            .await
            .unwrap();

        let found = repo.find_by_login("shared@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }
}
