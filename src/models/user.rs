//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a username, in characters
pub const USERNAME_MAX_LEN: usize = 150;

/// A registered user who may log in and vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Password hash (argon2 PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unsaved user.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            username,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}
