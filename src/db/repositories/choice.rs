//! Choice repository
//!
//! Database operations for the answers attached to a question. Tallies are
//! only ever changed by `VoteRepository::record`.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::{Choice, CreateChoiceInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Choice repository trait
#[async_trait]
pub trait ChoiceRepository: Send + Sync {
    /// Add a choice with a zero tally
    async fn create(&self, input: &CreateChoiceInput) -> Result<Choice>;

    /// Get choice by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Choice>>;

    /// All choices of a question, in insertion order
    async fn list_by_question(&self, question_id: i64) -> Result<Vec<Choice>>;
}

/// SQLx-based choice repository implementation
pub struct SqlxChoiceRepository {
    pool: DynDatabasePool,
}

impl SqlxChoiceRepository {
    /// Create a new SQLx choice repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ChoiceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ChoiceRepository for SqlxChoiceRepository {
    async fn create(&self, input: &CreateChoiceInput) -> Result<Choice> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_choice_sqlite(sqlite_pool(self.pool.as_ref())?, input).await,
            DatabaseDriver::Mysql => create_choice_mysql(mysql_pool(self.pool.as_ref())?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Choice>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_choice_by_id_sqlite(sqlite_pool(self.pool.as_ref())?, id).await,
            DatabaseDriver::Mysql => get_choice_by_id_mysql(mysql_pool(self.pool.as_ref())?, id).await,
        }
    }

    async fn list_by_question(&self, question_id: i64) -> Result<Vec<Choice>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_question_sqlite(sqlite_pool(self.pool.as_ref())?, question_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_question_mysql(mysql_pool(self.pool.as_ref())?, question_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_choice_sqlite(pool: &SqlitePool, input: &CreateChoiceInput) -> Result<Choice> {
    let result = sqlx::query("INSERT INTO choices (question_id, choice_text, votes) VALUES (?, ?, 0)")
        .bind(input.question_id)
        .bind(&input.choice_text)
        .execute(pool)
        .await
        .context("Failed to create choice")?;

    Ok(Choice {
        id: result.last_insert_rowid(),
        question_id: input.question_id,
        choice_text: input.choice_text.clone(),
        votes: 0,
    })
}

async fn get_choice_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Choice>> {
    let row = sqlx::query("SELECT id, question_id, choice_text, votes FROM choices WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get choice by ID")?;

    row.as_ref().map(row_to_choice_sqlite).transpose()
}

async fn list_by_question_sqlite(pool: &SqlitePool, question_id: i64) -> Result<Vec<Choice>> {
    let rows = sqlx::query(
        "SELECT id, question_id, choice_text, votes FROM choices WHERE question_id = ? ORDER BY id",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await
    .context("Failed to list choices")?;

    rows.iter().map(row_to_choice_sqlite).collect()
}

fn row_to_choice_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Choice> {
    Ok(Choice {
        id: row.try_get("id")?,
        question_id: row.try_get("question_id")?,
        choice_text: row.try_get("choice_text")?,
        votes: row.try_get("votes")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_choice_mysql(pool: &MySqlPool, input: &CreateChoiceInput) -> Result<Choice> {
    let result = sqlx::query("INSERT INTO choices (question_id, choice_text, votes) VALUES (?, ?, 0)")
        .bind(input.question_id)
        .bind(&input.choice_text)
        .execute(pool)
        .await
        .context("Failed to create choice")?;

    Ok(Choice {
        id: result.last_insert_id() as i64,
        question_id: input.question_id,
        choice_text: input.choice_text.clone(),
        votes: 0,
    })
}

async fn get_choice_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Choice>> {
    let row = sqlx::query("SELECT id, question_id, choice_text, votes FROM choices WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get choice by ID")?;

    row.as_ref().map(row_to_choice_mysql).transpose()
}

async fn list_by_question_mysql(pool: &MySqlPool, question_id: i64) -> Result<Vec<Choice>> {
    let rows = sqlx::query(
        "SELECT id, question_id, choice_text, votes FROM choices WHERE question_id = ? ORDER BY id",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await
    .context("Failed to list choices")?;

    rows.iter().map(row_to_choice_mysql).collect()
}

fn row_to_choice_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Choice> {
    Ok(Choice {
        id: row.try_get("id")?,
        question_id: row.try_get("question_id")?,
        choice_text: row.try_get("choice_text")?,
        votes: row.try_get("votes")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{QuestionRepository, SqlxQuestionRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Question;
    use chrono::{Duration, Utc};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxChoiceRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxChoiceRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_question(pool: &DynDatabasePool, text: &str) -> Question {
        let now = Utc::now();
        SqlxQuestionRepository::new(pool.clone())
            .create(&Question::new(text.to_string(), now, now + Duration::days(1)))
            .await
            .expect("Failed to create question")
    }

    fn input(question_id: i64, text: &str) -> CreateChoiceInput {
        CreateChoiceInput {
            question_id,
            choice_text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_choice_starts_at_zero() {
        let (pool, repo) = setup_test_repo().await;
        let question = create_question(&pool, "Favourite colour?").await;

        let choice = repo.create(&input(question.id, "Blue")).await.unwrap();
        assert!(choice.id > 0);
        assert_eq!(choice.votes, 0);

        let found = repo.get_by_id(choice.id).await.unwrap().expect("Choice not found");
        assert_eq!(found, choice);
    }

    #[tokio::test]
    async fn test_create_choice_for_missing_question_fails() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.create(&input(42, "Nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_by_question_only_returns_own_choices() {
        let (pool, repo) = setup_test_repo().await;
        let first = create_question(&pool, "First?").await;
        let second = create_question(&pool, "Second?").await;

        let a = repo.create(&input(first.id, "A")).await.unwrap();
        let b = repo.create(&input(first.id, "B")).await.unwrap();
        repo.create(&input(second.id, "C")).await.unwrap();

        let listed = repo.list_by_question(first.id).await.unwrap();
        assert_eq!(listed, vec![a, b]);
    }

    #[tokio::test]
    async fn test_choices_removed_with_question() {
        let (pool, repo) = setup_test_repo().await;
        let question = create_question(&pool, "Temporary?").await;
        let choice = repo.create(&input(question.id, "Gone soon")).await.unwrap();

        SqlxQuestionRepository::new(pool.clone())
            .delete(question.id)
            .await
            .unwrap();

        assert!(repo.get_by_id(choice.id).await.unwrap().is_none());
    }
}
