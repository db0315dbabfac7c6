//! Poll service
//!
//! Read paths behind the index, detail and results pages, plus the
//! administrative create/delete operations used by `polls-admin`.
//!
//! Every time-dependent method takes `now` explicitly.

use crate::db::repositories::{ChoiceRepository, QuestionRepository};
use crate::models::{
    Choice, CreateChoiceInput, CreateQuestionInput, Question, QuestionWithChoices,
    QUESTION_TEXT_MAX_LEN,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Error types for poll operations
#[derive(Debug, thiserror::Error)]
pub enum PollServiceError {
    /// No such question, or not yet published where that matters
    #[error("Question not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Poll service
pub struct PollService {
    question_repo: Arc<dyn QuestionRepository>,
    choice_repo: Arc<dyn ChoiceRepository>,
}

impl PollService {
    pub fn new(
        question_repo: Arc<dyn QuestionRepository>,
        choice_repo: Arc<dyn ChoiceRepository>,
    ) -> Self {
        Self {
            question_repo,
            choice_repo,
        }
    }

    /// Published questions, newest first. An empty list is not an error.
    pub async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Question>, PollServiceError> {
        let questions = self
            .question_repo
            .list_published(now)
            .await
            .context("Failed to list published questions")?;

        Ok(questions)
    }

    /// A published question with its choices
    ///
    /// Unpublished questions are reported as `NotFound`, exactly like
    /// missing ones.
    pub async fn get_published(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<QuestionWithChoices, PollServiceError> {
        let question = self.find(id).await?;
        if !question.is_published_at(now) {
            return Err(PollServiceError::NotFound);
        }
        self.with_choices(question).await
    }

    /// A question with its tallies, published or not
    pub async fn get_results(&self, id: i64) -> Result<QuestionWithChoices, PollServiceError> {
        let question = self.find(id).await?;
        self.with_choices(question).await
    }

    /// Every question, including future ones
    pub async fn list_all(&self) -> Result<Vec<Question>, PollServiceError> {
        let questions = self
            .question_repo
            .list_all()
            .await
            .context("Failed to list questions")?;

        Ok(questions)
    }

    /// Create a question
    ///
    /// The text must be non-blank and at most 200 characters. An end date
    /// before the publish date is accepted; such a question never takes votes.
    pub async fn create_question(&self, input: CreateQuestionInput) -> Result<Question, PollServiceError> {
        validate_text("Question text", &input.question_text)?;

        let question = self
            .question_repo
            .create(&Question::new(input.question_text, input.pub_date, input.end_date))
            .await
            .context("Failed to create question")?;

        tracing::info!(question_id = question.id, "Question created");
        Ok(question)
    }

    /// Add a choice to an existing question
    pub async fn add_choice(&self, input: CreateChoiceInput) -> Result<Choice, PollServiceError> {
        validate_text("Choice text", &input.choice_text)?;
        self.find(input.question_id).await?;

        let choice = self
            .choice_repo
            .create(&input)
            .await
            .context("Failed to create choice")?;

        Ok(choice)
    }

    /// Delete a question together with its choices and votes
    pub async fn delete_question(&self, id: i64) -> Result<(), PollServiceError> {
        let deleted = self
            .question_repo
            .delete(id)
            .await
            .context("Failed to delete question")?;

        if !deleted {
            return Err(PollServiceError::NotFound);
        }

        tracing::info!(question_id = id, "Question deleted");
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Question, PollServiceError> {
        self.question_repo
            .get_by_id(id)
            .await
            .context("Failed to get question")?
            .ok_or(PollServiceError::NotFound)
    }

    async fn with_choices(&self, question: Question) -> Result<QuestionWithChoices, PollServiceError> {
        let choices = self
            .choice_repo
            .list_by_question(question.id)
            .await
            .context("Failed to list choices")?;

        Ok(QuestionWithChoices { question, choices })
    }
}

fn validate_text(field: &str, text: &str) -> Result<(), PollServiceError> {
    if text.trim().is_empty() {
        return Err(PollServiceError::ValidationError(format!("{} cannot be empty", field)));
    }
    if text.chars().count() > QUESTION_TEXT_MAX_LEN {
        return Err(PollServiceError::ValidationError(format!(
            "{} cannot exceed {} characters",
            field, QUESTION_TEXT_MAX_LEN
        )));
    }
    Ok(())
}
