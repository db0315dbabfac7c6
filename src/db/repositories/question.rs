//! Question repository
//!
//! Database operations for poll questions.
//!
//! This module provides:
//! - `QuestionRepository` trait defining the interface for question data access
//! - `SqlxQuestionRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::Question;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Question repository trait
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a question and return it with its assigned ID
    async fn create(&self, question: &Question) -> Result<Question>;

    /// Get question by ID, regardless of publish date
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>>;

    /// Questions with `pub_date <= now`, newest first (ties: highest ID first)
    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Question>>;

    /// Every question, newest first
    async fn list_all(&self) -> Result<Vec<Question>>;

    /// Delete a question, cascading to its choices and votes.
    /// Returns false if no such question existed.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based question repository implementation
pub struct SqlxQuestionRepository {
    pool: DynDatabasePool,
}

impl SqlxQuestionRepository {
    /// Create a new SQLx question repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuestionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl QuestionRepository for SqlxQuestionRepository {
    async fn create(&self, question: &Question) -> Result<Question> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_question_sqlite(sqlite_pool(self.pool.as_ref())?, question).await,
            DatabaseDriver::Mysql => create_question_mysql(mysql_pool(self.pool.as_ref())?, question).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Question>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_question_by_id_sqlite(sqlite_pool(self.pool.as_ref())?, id).await,
            DatabaseDriver::Mysql => get_question_by_id_mysql(mysql_pool(self.pool.as_ref())?, id).await,
        }
    }

    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Question>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_published_sqlite(sqlite_pool(self.pool.as_ref())?, now).await,
            DatabaseDriver::Mysql => list_published_mysql(mysql_pool(self.pool.as_ref())?, now).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<Question>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_all_sqlite(sqlite_pool(self.pool.as_ref())?).await,
            DatabaseDriver::Mysql => list_all_mysql(mysql_pool(self.pool.as_ref())?).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_question_sqlite(sqlite_pool(self.pool.as_ref())?, id).await,
            DatabaseDriver::Mysql => delete_question_mysql(mysql_pool(self.pool.as_ref())?, id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_question_sqlite(pool: &SqlitePool, question: &Question) -> Result<Question> {
    let result = sqlx::query(
        r#"
        INSERT INTO questions (question_text, pub_date, end_date)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&question.question_text)
    .bind(question.pub_date)
    .bind(question.end_date)
    .execute(pool)
    .await
    .context("Failed to create question")?;

    Ok(Question {
        id: result.last_insert_rowid(),
        ..question.clone()
    })
}

async fn get_question_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Question>> {
    let row = sqlx::query("SELECT id, question_text, pub_date, end_date FROM questions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get question by ID")?;

    row.as_ref().map(row_to_question_sqlite).transpose()
}

async fn list_published_sqlite(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        r#"
        SELECT id, question_text, pub_date, end_date
        FROM questions
        WHERE pub_date <= ?
        ORDER BY pub_date DESC, id DESC
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
    .context("Failed to list published questions")?;

    rows.iter().map(row_to_question_sqlite).collect()
}

async fn list_all_sqlite(pool: &SqlitePool) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        "SELECT id, question_text, pub_date, end_date FROM questions ORDER BY pub_date DESC, id DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list questions")?;

    rows.iter().map(row_to_question_sqlite).collect()
}

async fn delete_question_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete question")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_question_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Question> {
    Ok(Question {
        id: row.try_get("id")?,
        question_text: row.try_get("question_text")?,
        pub_date: row.try_get("pub_date")?,
        end_date: row.try_get("end_date")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_question_mysql(pool: &MySqlPool, question: &Question) -> Result<Question> {
    let result = sqlx::query(
        r#"
        INSERT INTO questions (question_text, pub_date, end_date)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(&question.question_text)
    .bind(question.pub_date)
    .bind(question.end_date)
    .execute(pool)
    .await
    .context("Failed to create question")?;

    Ok(Question {
        id: result.last_insert_id() as i64,
        ..question.clone()
    })
}

async fn get_question_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Question>> {
    let row = sqlx::query("SELECT id, question_text, pub_date, end_date FROM questions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get question by ID")?;

    row.as_ref().map(row_to_question_mysql).transpose()
}

async fn list_published_mysql(pool: &MySqlPool, now: DateTime<Utc>) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        r#"
        SELECT id, question_text, pub_date, end_date
        FROM questions
        WHERE pub_date <= ?
        ORDER BY pub_date DESC, id DESC
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
    .context("Failed to list published questions")?;

    rows.iter().map(row_to_question_mysql).collect()
}

async fn list_all_mysql(pool: &MySqlPool) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        "SELECT id, question_text, pub_date, end_date FROM questions ORDER BY pub_date DESC, id DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list questions")?;

    rows.iter().map(row_to_question_mysql).collect()
}

async fn delete_question_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete question")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_question_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Question> {
    Ok(Question {
        id: row.try_get("id")?,
        question_text: row.try_get("question_text")?,
        pub_date: row.try_get("pub_date")?,
        end_date: row.try_get("end_date")?,
    })
}
