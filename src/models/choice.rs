//! Choice model

use serde::{Deserialize, Serialize};

/// One selectable answer of a question, with its running tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    /// Owning question
    pub question_id: i64,
    pub choice_text: String,
    /// Number of votes cast for this choice (never negative)
    pub votes: i64,
}

/// Input for adding a choice to a question
#[derive(Debug, Clone)]
pub struct CreateChoiceInput {
    pub question_id: i64,
    pub choice_text: String,
}
