//! Account model
//!
//! A row of the `user_account` table. The stored password is an Argon2id
//! PHC string and is never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Public view shown on the profile page
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Values needed to insert a new account.
///
/// `password_hash` must already be hashed with
/// `services::password::hash_password()`.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Username and email, the only account fields pages display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub username: String,
    pub email: String,
}
