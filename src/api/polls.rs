//! Poll page handlers
//!
//! Index, detail, results and vote.

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::Method,
    response::Response,
    Form,
};
use chrono::Utc;
use serde::Deserialize;

use crate::models::QuestionWithChoices;
use crate::services::VoteOutcome;

use super::messages::{Flash, FlashMessage};
use super::middleware::{AppState, CurrentUser, PageError};
use super::responses::{page_context, parse_id, redirect, redirect_with_message, render_page};

/// Inline error shown when the vote form has no usable choice
pub const NO_CHOICE_MESSAGE: &str = "You didn't select a choice.";
/// Flash shown when the voting window is closed
pub const VOTING_CLOSED_MESSAGE: &str = "Voting is not allowed.";
/// Flash shown on a repeated vote
pub const ALREADY_VOTED_MESSAGE: &str = "You have already voted on this question.";

/// Vote form body
#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

/// GET / redirects to the poll index
pub async fn root() -> Result<Response, PageError> {
    redirect("/polls/")
}

/// Fallback for unknown routes
pub async fn not_found() -> PageError {
    PageError::NotFound
}

/// GET /polls/
pub async fn index(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: Flash,
) -> Result<Response, PageError> {
    let questions = state.poll_service.list_published(Utc::now()).await?;

    let mut context = page_context(&user, &flash.0);
    context.insert("latest_question_list", &questions);
    render_page(&state, "polls/index.html", &context, &flash.0)
}

/// GET /polls/{id}/
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    flash: Flash,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let question = state.poll_service.get_published(id, Utc::now()).await?;

    render_detail(&state, &user, &flash, &question, None)
}

/// GET /polls/{id}/results/
pub async fn results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: CurrentUser,
    flash: Flash,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let results = state.poll_service.get_results(id).await?;

    let mut context = page_context(&user, &flash.0);
    // The detail page 404s before pub_date
    context.insert("is_published", &results.question.is_published_at(Utc::now()));
    context.insert("question", &results.question);
    context.insert("choices", &results.choices);
    context.insert("total_votes", &results.total_votes());
    render_page(&state, "polls/results.html", &context, &flash.0)
}

/// GET or POST /polls/{id}/vote/
///
/// Only a POST body is read; a GET always reports a missing choice.
pub async fn vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    user: CurrentUser,
    flash: Flash,
    form: Result<Form<VoteForm>, FormRejection>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;

    let Some(voter) = user.user() else {
        return redirect(&format!("/accounts/login/?next=/polls/{}/", id));
    };

    let choice = if method == Method::POST {
        form.ok().and_then(|Form(form)| form.choice)
    } else {
        None
    };

    let outcome = state
        .voting_service
        .cast_vote(id, choice.as_deref(), voter, Utc::now())
        .await?;

    let results_url = format!("/polls/{}/results/", id);
    match outcome {
        VoteOutcome::Counted => redirect(&results_url),
        VoteOutcome::InvalidSelection(question) => {
            render_detail(&state, &user, &flash, &question, Some(NO_CHOICE_MESSAGE))
        }
        VoteOutcome::VotingClosed => {
            redirect_with_message("/polls/", FlashMessage::error(VOTING_CLOSED_MESSAGE))
        }
        VoteOutcome::AlreadyVoted => {
            redirect_with_message(&results_url, FlashMessage::warning(ALREADY_VOTED_MESSAGE))
        }
    }
}

fn render_detail(
    state: &AppState,
    user: &CurrentUser,
    flash: &Flash,
    question: &QuestionWithChoices,
    error_message: Option<&str>,
) -> Result<Response, PageError> {
    let mut context = page_context(user, &flash.0);
    context.insert("question", &question.question);
    context.insert("choices", &question.choices);
    context.insert("error_message", &error_message);
    render_page(state, "polls/detail.html", &context, &flash.0)
}
