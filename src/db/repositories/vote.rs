//! Vote repository
//!
//! Stores ballots and keeps choice tallies in step with them. A ballot insert
//! and its tally increment always commit or roll back together.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::{RecordOutcome, Vote};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

/// Vote repository trait
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Store a ballot and increment the chosen tally by one, atomically.
    ///
    /// Returns the stored ballot, or `AlreadyVoted` (and changes nothing) when
    /// the user already has a ballot for the question. Fails if the choice
    /// does not belong to the question.
    async fn record(
        &self,
        question_id: i64,
        choice_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome>;
}

/// SQLx-based vote repository implementation
pub struct SqlxVoteRepository {
    pool: DynDatabasePool,
}

impl SqlxVoteRepository {
    /// Create a new SQLx vote repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VoteRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VoteRepository for SqlxVoteRepository {
    async fn record(
        &self,
        question_id: i64,
        choice_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                record_vote_sqlite(sqlite_pool(self.pool.as_ref())?, question_id, choice_id, user_id, now)
                    .await
            }
            DatabaseDriver::Mysql => {
                record_vote_mysql(mysql_pool(self.pool.as_ref())?, question_id, choice_id, user_id, now)
                    .await
            }
        }
    }
}

/// True if the error is a UNIQUE constraint violation
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

const INSERT_VOTE: &str =
    "INSERT INTO votes (question_id, choice_id, user_id, created_at) VALUES (?, ?, ?, ?)";

const INCREMENT_TALLY: &str =
    "UPDATE choices SET votes = votes + 1 WHERE id = ? AND question_id = ?";

// ============================================================================
// SQLite implementations
// ============================================================================

// The ballot insert is the first statement of the transaction, so SQLite
// takes the write lock straight away and waits on `busy_timeout` for it.
async fn record_vote_sqlite(
    pool: &SqlitePool,
    question_id: i64,
    choice_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<RecordOutcome> {
    let mut tx = pool.begin().await.context("Failed to begin vote transaction")?;

    let inserted = sqlx::query(INSERT_VOTE)
        .bind(question_id)
        .bind(choice_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await;

    let inserted = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await.context("Failed to roll back vote")?;
            return Ok(RecordOutcome::AlreadyVoted);
        }
        Err(e) => return Err(e).context("Failed to insert vote"),
    };

    let updated = sqlx::query(INCREMENT_TALLY)
        .bind(choice_id)
        .bind(question_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment choice tally")?;

    if updated.rows_affected() != 1 {
        bail!("choice {} does not belong to question {}", choice_id, question_id);
    }

    tx.commit().await.context("Failed to commit vote")?;
    Ok(RecordOutcome::Counted(Vote {
        id: inserted,
        question_id,
        choice_id,
        user_id,
        created_at: now,
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn record_vote_mysql(
    pool: &MySqlPool,
    question_id: i64,
    choice_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<RecordOutcome> {
    let mut tx = pool.begin().await.context("Failed to begin vote transaction")?;

    let inserted = sqlx::query(INSERT_VOTE)
        .bind(question_id)
        .bind(choice_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await;

    let inserted = match inserted {
        Ok(result) => result.last_insert_id() as i64,
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await.context("Failed to roll back vote")?;
            return Ok(RecordOutcome::AlreadyVoted);
        }
        Err(e) => return Err(e).context("Failed to insert vote"),
    };

    let updated = sqlx::query(INCREMENT_TALLY)
        .bind(choice_id)
        .bind(question_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment choice tally")?;

    if updated.rows_affected() != 1 {
        bail!("choice {} does not belong to question {}", choice_id, question_id);
    }

    tx.commit().await.context("Failed to commit vote")?;
    Ok(RecordOutcome::Counted(Vote {
        id: inserted,
        question_id,
        choice_id,
        user_id,
        created_at: now,
    }))
}
