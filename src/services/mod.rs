//! Services layer
//!
//! Account handling on top of the repositories, and the outbound lookup
//! pipeline (dictionary API, sign video scraping, page aggregation).

pub mod account;
pub mod curriculum;
pub mod dictionary;
pub mod lookup;
pub mod password;
pub mod sign_video;

pub use account::{is_safe_redirect, AccountError, AccountService, FormErrors, LoginForm, RegisterForm};
pub use curriculum::{learning_path, NodeKind, PathNode};
pub use dictionary::{DefinitionSource, HttpDefinitionSource};
pub use lookup::{build_http_client, LookupService, PhraseLookupError};
pub use password::{hash_password, verify_password};
pub use sign_video::{normalize_url, HttpSignVideoSource, SignVideoSource};
