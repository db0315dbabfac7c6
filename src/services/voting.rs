//! Voting
//!
//! Validates a submitted choice against the question and its voting window,
//! then records the ballot. The checks run in a fixed order: question
//! exists, choice belongs to it, window is open, user has not voted yet.

use crate::db::repositories::{ChoiceRepository, QuestionRepository, VoteRepository};
use crate::models::{QuestionWithChoices, RecordOutcome, User};
use crate::services::poll::PollServiceError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What happened to a vote attempt
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    /// Ballot stored, tally incremented by one
    Counted,
    /// Missing, malformed or foreign choice. Carries the question so the
    /// detail page can be shown again.
    InvalidSelection(QuestionWithChoices),
    /// Outside `pub_date..=end_date`
    VotingClosed,
    /// The user already voted on this question
    AlreadyVoted,
}

/// Voting service
pub struct VotingService {
    question_repo: Arc<dyn QuestionRepository>,
    choice_repo: Arc<dyn ChoiceRepository>,
    vote_repo: Arc<dyn VoteRepository>,
}

impl VotingService {
    pub fn new(
        question_repo: Arc<dyn QuestionRepository>,
        choice_repo: Arc<dyn ChoiceRepository>,
        vote_repo: Arc<dyn VoteRepository>,
    ) -> Self {
        Self {
            question_repo,
            choice_repo,
            vote_repo,
        }
    }

    /// Cast `user`'s vote on question `question_id`
    ///
    /// `choice` is the raw form value. Only `NotFound` and internal failures
    /// are errors; every other result is a `VoteOutcome`.
    pub async fn cast_vote(
        &self,
        question_id: i64,
        choice: Option<&str>,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, PollServiceError> {
        let question = self
            .question_repo
            .get_by_id(question_id)
            .await
            .context("Failed to get question")?
            .ok_or(PollServiceError::NotFound)?;

        let choices = self
            .choice_repo
            .list_by_question(question.id)
            .await
            .context("Failed to list choices")?;
        let detail = QuestionWithChoices { question, choices };

        let selected = choice
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|id| detail.choice(id))
            .map(|c| c.id);

        let Some(choice_id) = selected else {
            return Ok(VoteOutcome::InvalidSelection(detail));
        };

        if !detail.question.can_vote_at(now) {
            tracing::debug!(question_id, "Vote rejected, voting window closed");
            return Ok(VoteOutcome::VotingClosed);
        }

        let recorded = self
            .vote_repo
            .record(question_id, choice_id, user.id, now)
            .await
            .context("Failed to record vote")?;

        Ok(match recorded {
            RecordOutcome::Counted(vote) => {
                tracing::info!(
                    vote_id = vote.id,
                    question_id,
                    choice_id,
                    user_id = user.id,
                    "Vote counted"
                );
                VoteOutcome::Counted
            }
            RecordOutcome::AlreadyVoted => VoteOutcome::AlreadyVoted,
        })
    }
}
