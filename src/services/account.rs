//! Account service
//!
//! Registration, login, logout and profile lookup for `user_account`,
//! plus the session bookkeeping behind the login cookie.

use crate::db::repositories::{AccountRepository, SessionRepository};
use crate::models::{AccountProfile, NewAccount, Session};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 14;

const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

const CREATE_FAILED_MESSAGE: &str =
    "Could not create account. Please check the database/table and try again.";
const PASSWORD_COLUMN_MESSAGE: &str = "Could not create account because the database column \
     `user_account.password` is too short for a secure password hash. \
     Update that column to VARCHAR(255) (or larger) and try again.";

/// Errors surfaced to the login form.
///
/// The `Display` text of each variant is the message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Please enter your username/email and password.")]
    MissingCredentials,

    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,

    #[error("Database error while logging in. Please try again.")]
    Database(#[source] anyhow::Error),
}

/// Field name to message map rendered next to each form input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Registration form as posted by the browser
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Login form; `username` accepts a username or an email address
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// Account service for registration, login and sessions
pub struct AccountService {
    account_repo: Arc<dyn AccountRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl AccountService {
    pub fn new(
        account_repo: Arc<dyn AccountRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(account_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        account_repo: Arc<dyn AccountRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            account_repo,
            session_repo,
            session_expiration_days,
        }
    }

    pub fn session_expiration_days(&self) -> i64 {
        self.session_expiration_days
    }

    /// Validate the form, create the account and log it in.
    ///
    /// Every problem is reported as `FormErrors`, keyed by form field, or
    /// by `database` when the insert itself failed.
    pub async fn register(&self, form: &RegisterForm) -> Result<Session, FormErrors> {
        let username = form.username.trim();
        let email = form.email.trim();

        let errors = self.validate_registration(username, email, form).await;
        if !errors.is_empty() {
            return Err(errors);
        }

        let password_hash = match hash_password(&form.password) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!("Password hashing failed during registration: {:#}", e);
                return Err(database_form_error(CREATE_FAILED_MESSAGE));
            }
        };

        let account = NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };

        if let Err(e) = self.account_repo.create(&account).await {
            let raw = format!("{:#}", e);
            tracing::error!("Failed to create account for {}: {}", username, raw);
            let message = if raw.contains("Data too long") && raw.contains("password") {
                PASSWORD_COLUMN_MESSAGE
            } else {
                CREATE_FAILED_MESSAGE
            };
            return Err(database_form_error(message));
        }

        tracing::info!("Registered account {}", username);

        self.create_session(username).await.map_err(|e| {
            tracing::error!("Failed to create session after registration: {:#}", e);
            database_form_error(CREATE_FAILED_MESSAGE)
        })
    }

    async fn validate_registration(
        &self,
        username: &str,
        email: &str,
        form: &RegisterForm,
    ) -> FormErrors {
        let mut errors = FormErrors::default();

        if username.is_empty() {
            errors.insert("username", "Username is required.");
        } else if username.chars().count() < MIN_USERNAME_CHARS {
            errors.insert("username", "Username must be at least 3 characters.");
        } else {
            match self.account_repo.exists_by_username(username).await {
                Ok(true) => errors.insert("username", "That username is already taken."),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Username check failed: {:#}", e);
                    errors.insert("username", "Database error while checking username.");
                }
            }
        }

        if email.is_empty() {
            errors.insert("email", "Email is required.");
        } else {
            match self.account_repo.exists_by_email(email).await {
                Ok(true) => errors.insert("email", "That email is already registered."),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Email check failed: {:#}", e);
                    errors.insert("email", "Database error while checking email.");
                }
            }
        }

        if form.password.is_empty() {
            errors.insert("password", "Password is required.");
        } else if form.password.chars().count() < MIN_PASSWORD_CHARS {
            errors.insert("password", "Password must be at least 6 characters.");
        }

        if form.password != form.confirm_password {
            errors.insert("confirm_password", "Passwords do not match.");
        }

        errors
    }

    /// Check credentials and open a session.
    ///
    /// `identifier` is matched against both username and email.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Session, AccountError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AccountError::MissingCredentials);
        }

        let account = self
            .account_repo
            .find_by_login(identifier)
            .await
            .map_err(AccountError::Database)?
            .ok_or(AccountError::InvalidCredentials)?;

        // An unreadable stored hash can never match
        let matches = verify_password(password, &account.password).unwrap_or_else(|e| {
            tracing::warn!("Stored hash for {} is unusable: {:#}", account.username, e);
            false
        });
        if !matches {
            return Err(AccountError::InvalidCredentials);
        }

        tracing::info!("Account {} logged in", account.username);
        self.create_session(&account.username)
            .await
            .map_err(AccountError::Database)
    }

    /// Drop a session; unknown tokens are ignored
    pub async fn logout(&self, token: &str) -> anyhow::Result<()> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")
    }

    /// Resolve a session token to a live session, purging it when expired
    pub async fn validate_session(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let session = match self.session_repo.get_by_id(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::debug!("Failed to purge expired session: {:#}", e);
            }
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Username and email for the profile page; database errors read as
    /// "not logged in"
    pub async fn profile(&self, username: &str) -> Option<AccountProfile> {
        match self.account_repo.find_by_username(username).await {
            Ok(account) => account.map(|a| a.profile()),
            Err(e) => {
                tracing::warn!("Profile lookup failed for {}: {:#}", username, e);
                None
            }
        }
    }

    pub async fn cleanup_expired_sessions(&self) -> anyhow::Result<u64> {
        self.session_repo.delete_expired().await
    }

    async fn create_session(&self, username: &str) -> anyhow::Result<Session> {
        let session = Session::new(username, Duration::days(self.session_expiration_days));
        self.session_repo.create(&session).await
    }
}

fn database_form_error(message: &str) -> FormErrors {
    let mut errors = FormErrors::default();
    errors.insert("database", message);
    errors
}

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("valid scheme regex"));

/// Whether `url` may be used as a post-login redirect for a request to `host`.
///
/// Relative paths and absolute `http`/`https` URLs pointing at `host` are
/// allowed. Backslashes are treated as forward slashes, since browsers do.
/// A control character anywhere makes the URL unusable as a `Location`.
pub fn is_safe_redirect(url: &str, host: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.chars().any(char::is_control) {
        return false;
    }
    has_allowed_host_and_scheme(url, host) && has_allowed_host_and_scheme(&url.replace('\\', "/"), host)
}

fn has_allowed_host_and_scheme(url: &str, host: &str) -> bool {
    if url.starts_with("///") {
        return false;
    }

    let (scheme, rest) = match SCHEME_RE.captures(url) {
        Some(caps) => {
            let scheme = caps[1].to_ascii_lowercase();
            let rest = &url[caps[0].len()..];
            (Some(scheme), rest)
        }
        None => (None, url),
    };

    let netloc = rest
        .strip_prefix("//")
        .map(|after| after.split(['/', '?', '#']).next().unwrap_or(""))
        .unwrap_or("");

    if scheme.is_some() && netloc.is_empty() {
        return false;
    }

    let host_ok = netloc.is_empty() || netloc == host;
    let scheme_ok = matches!(scheme.as_deref(), None | Some("http") | Some("https"));
    host_ok && scheme_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAccountRepository, SqlxSessionRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserAccount;
    use async_trait::async_trait;
    use proptest::prelude::*;

    async fn setup_test_service() -> AccountService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        AccountService::new(
            SqlxAccountRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn form(username: &str, email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    fn validation_errors(result: Result<Session, FormErrors>) -> FormErrors {
        match result {
            Err(errors) => errors,
            Ok(session) => panic!("expected validation errors, got {:?}", session),
        }
    }

    /// Account repository whose every call fails, as if the table were missing
    struct BrokenAccounts;

    #[async_trait]
    impl AccountRepository for BrokenAccounts {
        async fn create(&self, _account: &NewAccount) -> anyhow::Result<UserAccount> {
            anyhow::bail!("Data too long for column 'password' at row 1")
        }
        async fn exists_by_username(&self, _username: &str) -> anyhow::Result<bool> {
            anyhow::bail!("no such table: user_account")
        }
        async fn exists_by_email(&self, _email: &str) -> anyhow::Result<bool> {
            anyhow::bail!("no such table: user_account")
        }
        async fn find_by_username(&self, _username: &str) -> anyhow::Result<Option<UserAccount>> {
            anyhow::bail!("no such table: user_account")
        }
        async fn find_by_login(&self, _identifier: &str) -> anyhow::Result<Option<UserAccount>> {
            anyhow::bail!("no such table: user_account")
        }
    }

    /// Existence checks pass but inserts fail with the given message
    struct FailingInsert(&'static str);

    #[async_trait]
    impl AccountRepository for FailingInsert {
        async fn create(&self, _account: &NewAccount) -> anyhow::Result<UserAccount> {
            Err(anyhow::anyhow!(self.0)).context("Failed to create account")
        }
        async fn exists_by_username(&self, _username: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn exists_by_email(&self, _email: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn find_by_username(&self, _username: &str) -> anyhow::Result<Option<UserAccount>> {
            Ok(None)
        }
        async fn find_by_login(&self, _identifier: &str) -> anyhow::Result<Option<UserAccount>> {
            Ok(None)
        }
    }

    async fn service_with(accounts: Arc<dyn AccountRepository>) -> AccountService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        AccountService::new(accounts, SqlxSessionRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_register_success_creates_session() {
        let service = setup_test_service().await;

        let session = service
            .register(&form("  signer ", " signer@example.com ", "secret1", "secret1"))
            .await
            .expect("Registration should succeed");

        assert_eq!(session.username, "signer");
        let profile = service.profile("signer").await.expect("profile exists");
        assert_eq!(profile.email, "signer@example.com");
    }

    #[tokio::test]
    async fn test_register_required_fields() {
        let service = setup_test_service().await;

        let errors = validation_errors(service.register(&form("", "", "", "")).await);

        assert_eq!(errors.get("username"), Some("Username is required."));
        assert_eq!(errors.get("email"), Some("Email is required."));
        assert_eq!(errors.get("password"), Some("Password is required."));
        assert_eq!(errors.get("confirm_password"), None);
    }

    #[tokio::test]
    async fn test_register_length_rules() {
        let service = setup_test_service().await;

        let errors = validation_errors(
            service
                .register(&form("ab", "ab@example.com", "12345", "12345"))
                .await,
        );

        let mut expected = FormErrors::default();
        expected.insert("username", "Username must be at least 3 characters.");
        expected.insert("password", "Password must be at least 6 characters.");
        assert_eq!(errors, expected);
    }

    #[tokio::test]
    async fn test_register_password_mismatch() {
        let service = setup_test_service().await;

        let errors = validation_errors(
            service
                .register(&form("signer", "signer@example.com", "secret1", "secret2"))
                .await,
        );

        let mut expected = FormErrors::default();
        expected.insert("confirm_password", "Passwords do not match.");
        assert_eq!(errors, expected);
    }

    #[tokio::test]
    async fn test_register_passwords_are_not_trimmed() {
        let service = setup_test_service().await;

        let errors = validation_errors(
            service
                .register(&form("signer", "signer@example.com", "secret1 ", "secret1"))
                .await,
        );

        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match."));
    }

    #[tokio::test]
    async fn test_register_duplicates_rejected() {
        let service = setup_test_service().await;
        service
            .register(&form("signer", "signer@example.com", "secret1", "secret1"))
            .await
            .unwrap();

        let errors = validation_errors(
            service
                .register(&form("signer", "signer@example.com", "secret1", "secret1"))
                .await,
        );

        assert_eq!(errors.get("username"), Some("That username is already taken."));
        assert_eq!(errors.get("email"), Some("That email is already registered."));
    }

    #[tokio::test]
    async fn test_register_reports_database_errors_per_field() {
        let service = service_with(Arc::new(BrokenAccounts)).await;

        let errors = validation_errors(
            service
                .register(&form("signer", "signer@example.com", "secret1", "secret1"))
                .await,
        );

        assert_eq!(errors.get("username"), Some("Database error while checking username."));
        assert_eq!(errors.get("email"), Some("Database error while checking email."));
    }

    #[tokio::test]
    async fn test_register_short_password_column_hint() {
        let service =
            service_with(Arc::new(FailingInsert("Data too long for column 'password' at row 1")))
                .await;

        let errors = validation_errors(
            service
                .register(&form("signer", "signer@example.com", "secret1", "secret1"))
                .await,
        );

        let message = errors.get("database").unwrap();
        assert!(message.contains("user_account.password"));
        assert!(message.contains("VARCHAR(255)"));
    }

    #[tokio::test]
    async fn test_register_generic_insert_error_hides_raw_text() {
        let service = service_with(Arc::new(FailingInsert("disk I/O error"))).await;

        let errors = validation_errors(
            service
                .register(&form("signer", "signer@example.com", "secret1", "secret1"))
                .await,
        );

        assert_eq!(errors.get("database"), Some(CREATE_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn test_login_with_username_or_email() {
        let service = setup_test_service().await;
        service
            .register(&form("signer", "signer@example.com", "secret1", "secret1"))
            .await
            .unwrap();

        let by_name = service.login("signer", "secret1").await.unwrap();
        let by_email = service.login(" signer@example.com ", "secret1").await.unwrap();

        assert_eq!(by_name.username, "signer");
        assert_eq!(by_email.username, "signer");
        assert_ne!(by_name.id, by_email.id);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let service = setup_test_service().await;
        service
            .register(&form("signer", "signer@example.com", "secret1", "secret1"))
            .await
            .unwrap();

        assert!(matches!(
            service.login("", "secret1").await,
            Err(AccountError::MissingCredentials)
        ));
        assert!(matches!(
            service.login("signer", "").await,
            Err(AccountError::MissingCredentials)
        ));
        assert!(matches!(
            service.login("signer", "wrong-pass").await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nobody", "secret1").await,
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_unparseable_hash_is_invalid_credentials() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let accounts = SqlxAccountRepository::boxed(pool.clone());
        accounts
            .create(&NewAccount {
                username: "legacy".to_string(),
                email: "legacy@example.com".to_string(),
                password_hash: "pbkdf2_sha256$260000$salt$hash".to_string(),
            })
            .await
            .unwrap();
        let service = AccountService::new(accounts, SqlxSessionRepository::boxed(pool));

        let result = service.login("legacy", "anything").await;
        assert!(matches!(result, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_database_error() {
        let service = service_with(Arc::new(BrokenAccounts)).await;

        let err = service.login("signer", "secret1").await.unwrap_err();
        assert!(matches!(err, AccountError::Database(_)));
        assert_eq!(err.to_string(), "Database error while logging in. Please try again.");
    }

    #[tokio::test]
    async fn test_profile_database_error_is_none() {
        let service = service_with(Arc::new(BrokenAccounts)).await;
        assert!(service.profile("signer").await.is_none());
    }

    #[tokio::test]
    async fn test_validate_and_logout_session() {
        let service = setup_test_service().await;
        let session = service
            .register(&form("signer", "signer@example.com", "secret1", "secret1"))
            .await
            .unwrap();

        let live = service.validate_session(&session.id).await.unwrap();
        assert_eq!(live.map(|s| s.username), Some("signer".to_string()));

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = AccountService::with_session_expiration(
            SqlxAccountRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            -1,
        );
        let session = service
            .register(&form("signer", "signer@example.com", "secret1", "secret1"))
            .await
            .unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
    }

    #[test]
    fn test_safe_redirect_relative_paths() {
        assert!(is_safe_redirect("/profile/", "localhost:8000"));
        assert!(is_safe_redirect("/chapter/1/?tab=phrases", "localhost:8000"));
        assert!(is_safe_redirect("dictionary/", "localhost:8000"));
    }

    #[test]
    fn test_safe_redirect_same_host() {
        assert!(is_safe_redirect("http://localhost:8000/level/", "localhost:8000"));
        assert!(is_safe_redirect("https://localhost:8000/level/", "localhost:8000"));
        assert!(is_safe_redirect("//localhost:8000/level/", "localhost:8000"));
    }

    #[test]
    fn test_safe_redirect_rejections() {
        assert!(!is_safe_redirect("", "localhost:8000"));
        assert!(!is_safe_redirect("   ", "localhost:8000"));
        assert!(!is_safe_redirect("https://evil.example/", "localhost:8000"));
        assert!(!is_safe_redirect("//evil.example/", "localhost:8000"));
        assert!(!is_safe_redirect("///evil.example/", "localhost:8000"));
        assert!(!is_safe_redirect("javascript:alert(1)", "localhost:8000"));
        assert!(!is_safe_redirect("ftp://localhost:8000/file", "localhost:8000"));
        assert!(!is_safe_redirect("http:/profile/", "localhost:8000"));
        assert!(!is_safe_redirect("\u{0}/profile/", "localhost:8000"));
    }

    #[test]
    fn test_safe_redirect_rejects_embedded_control_characters() {
        assert!(!is_safe_redirect("/profile/\nx", "localhost:8000"));
        assert!(!is_safe_redirect("/a\tb/", "localhost:8000"));
        assert!(!is_safe_redirect("/level/\r\nSet-Cookie: x=1", "localhost:8000"));
        assert!(!is_safe_redirect("/dictionary/\u{7f}", "localhost:8000"));
    }

    #[test]
    fn test_safe_redirect_backslashes_count_as_slashes() {
        assert!(!is_safe_redirect("\\\\evil.example/", "localhost:8000"));
        assert!(!is_safe_redirect("/\\evil.example/", "localhost:8000"));
        assert!(!is_safe_redirect("https:\\\\evil.example", "localhost:8000"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn prop_short_usernames_rejected(username in "[a-z]{1,2}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let errors = rt.block_on(async {
                let service = setup_test_service().await;
                validation_errors(
                    service
                        .register(&form(&username, "x@example.com", "secret1", "secret1"))
                        .await,
                )
            });
            prop_assert_eq!(
                errors.get("username"),
                Some("Username must be at least 3 characters.")
            );
        }

        #[test]
        fn prop_short_passwords_rejected(password in "[a-zA-Z0-9]{1,5}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let errors = rt.block_on(async {
                let service = setup_test_service().await;
                validation_errors(
                    service
                        .register(&form("signer", "x@example.com", &password, &password))
                        .await,
                )
            });
            let mut expected = FormErrors::default();
            expected.insert("password", "Password must be at least 6 characters.");
            prop_assert_eq!(errors, expected);
        }

        #[test]
        fn prop_foreign_hosts_never_safe(host in "[a-z]{3,10}\\.example") {
            let absolute = format!("https://{}/", host);
            let relative = format!("//{}/", host);
            prop_assert!(!is_safe_redirect(&absolute, "localhost:8000"));
            prop_assert!(!is_safe_redirect(&relative, "localhost:8000"));
        }

        #[test]
        fn prop_control_characters_never_safe(
            prefix in "/[a-z0-9/]{0,10}",
            control in prop::sample::select(vec!['\n', '\r', '\t', '\u{0}', '\u{1b}', '\u{7f}']),
            suffix in "[a-z0-9/]{1,10}",
        ) {
            let url = format!("{}{}{}", prefix, control, suffix);
            prop_assert!(!is_safe_redirect(&url, "localhost:8000"));
        }

        #[test]
        fn prop_rooted_paths_safe(path in "/[a-z0-9/]{0,20}") {
            prop_assume!(!path.starts_with("//"));
            prop_assert!(is_safe_redirect(&path, "localhost:8000"));
        }
    }
}
