//! Vote model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ballot cast by a user. At most one exists per (question, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub question_id: i64,
    pub choice_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of trying to store a ballot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The ballot was stored and the choice tally incremented
    Counted(Vote),
    /// The user already has a ballot for this question; nothing changed
    AlreadyVoted,
}
