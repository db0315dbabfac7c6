//! Question model
//!
//! A question is a poll prompt with a voting window. It is listed once its
//! publish date has passed and accepts votes until its end date.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Choice;

/// Maximum length of `question_text`, in characters
pub const QUESTION_TEXT_MAX_LEN: usize = 200;

/// Question entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier
    pub id: i64,
    /// The prompt shown to voters
    pub question_text: String,
    /// When the question becomes visible
    pub pub_date: DateTime<Utc>,
    /// Last instant at which votes are accepted
    pub end_date: DateTime<Utc>,
}

impl Question {
    /// Create a new, unsaved question
    pub fn new(question_text: String, pub_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            id: 0, // Will be set by the database
            question_text,
            pub_date,
            end_date,
        }
    }

    /// True if published within the last day (inclusive) and not in the future
    pub fn was_published_recently_at(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }

    pub fn was_published_recently(&self) -> bool {
        self.was_published_recently_at(Utc::now())
    }

    /// True once `now` has reached the publish date
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.pub_date
    }

    pub fn is_published(&self) -> bool {
        self.is_published_at(Utc::now())
    }

    /// True while `pub_date <= now <= end_date`
    ///
    /// A question whose end date precedes its publish date is never votable.
    pub fn can_vote_at(&self, now: DateTime<Utc>) -> bool {
        self.is_published_at(now) && now <= self.end_date
    }

    pub fn can_vote(&self) -> bool {
        self.can_vote_at(Utc::now())
    }
}

/// A question together with its choices, as shown on the detail and
/// results pages
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithChoices {
    pub question: Question,
    pub choices: Vec<Choice>,
}

impl QuestionWithChoices {
    /// Sum of all choice tallies
    pub fn total_votes(&self) -> i64 {
        self.choices.iter().map(|c| c.votes).sum()
    }

    /// Look up one of this question's own choices
    pub fn choice(&self, choice_id: i64) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }
}

/// Input for creating a question
#[derive(Debug, Clone)]
pub struct CreateQuestionInput {
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}
