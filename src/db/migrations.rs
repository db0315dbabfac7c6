//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! backend, and tracked in the `_migrations` table.
//!
//! # Usage
//!
//! ```ignore
//! use polls::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Each migration is a `Migration` holding:
//! - `version`: unique version number for ordering
//! - `name`: human-readable name
//! - `up_sqlite`: SQL for SQLite
//! - `up_mysql`: SQL for MySQL

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::pool::{mysql_pool, sqlite_pool};
use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                created_at DATETIME(6) NOT NULL
            ) ENGINE=InnoDB;
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at DATETIME(6) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            ) ENGINE=InnoDB;
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_questions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_text VARCHAR(200) NOT NULL,
                pub_date TIMESTAMP NOT NULL,
                end_date TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_questions_pub_date ON questions(pub_date);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS questions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                question_text VARCHAR(200) NOT NULL,
                pub_date DATETIME(6) NOT NULL,
                end_date DATETIME(6) NOT NULL
            ) ENGINE=InnoDB;
            CREATE INDEX idx_questions_pub_date ON questions(pub_date);
        "#,
    },
    Migration {
        version: 4,
        name: "create_choices",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS choices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL,
                choice_text VARCHAR(200) NOT NULL,
                votes INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_choices_question_id ON choices(question_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS choices (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                question_id BIGINT NOT NULL,
                choice_text VARCHAR(200) NOT NULL,
                votes BIGINT NOT NULL DEFAULT 0,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            ) ENGINE=InnoDB;
            CREATE INDEX idx_choices_question_id ON choices(question_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_votes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL,
                choice_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (question_id, user_id),
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                FOREIGN KEY (choice_id) REFERENCES choices(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_votes_choice_id ON votes(choice_id);
            CREATE INDEX IF NOT EXISTS idx_votes_user_id ON votes(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS votes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                question_id BIGINT NOT NULL,
                choice_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                UNIQUE KEY uq_votes_question_user (question_id, user_id),
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
                FOREIGN KEY (choice_id) REFERENCES choices(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            ) ENGINE=InnoDB;
            CREATE INDEX idx_votes_choice_id ON votes(choice_id);
            CREATE INDEX idx_votes_user_id ON votes(user_id);
        "#,
    },
];

/// Run all pending migrations
///
/// Creates the tracking table if needed, then applies every migration not
/// yet recorded, in version order.
///
/// # Returns
///
/// Number of migrations applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at DATETIME(6) NOT NULL
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(sqlite_pool(pool.as_ref())?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(mysql_pool(pool.as_ref())?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(sqlite_pool(pool.as_ref())?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(mysql_pool(pool.as_ref())?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind("hash")
            .bind(Utc::now())
            .execute(pool)
            .await
            .expect("Failed to insert user")
            .last_insert_rowid()
    }

    async fn insert_question(pool: &SqlitePool, text: &str) -> i64 {
        let now = Utc::now();
        sqlx::query("INSERT INTO questions (question_text, pub_date, end_date) VALUES (?, ?, ?)")
            .bind(text)
            .bind(now)
            .bind(now + chrono::Duration::days(1))
            .execute(pool)
            .await
            .expect("Failed to insert question")
            .last_insert_rowid()
    }

    async fn insert_choice(pool: &SqlitePool, question_id: i64, text: &str) -> i64 {
        sqlx::query("INSERT INTO choices (question_id, choice_text) VALUES (?, ?)")
            .bind(question_id)
            .bind(text)
            .execute(pool)
            .await
            .expect("Failed to insert choice")
            .last_insert_rowid()
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .expect("Failed to count")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_is_up_to_date_and_pending_count() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert!(!is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());

        run_migrations(&pool).await.expect("Failed to run migrations");

        assert!(is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_choice_defaults_to_zero_votes() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let question_id = insert_question(sqlite, "What's new?").await;
        let choice_id = insert_choice(sqlite, question_id, "Not much").await;

        let votes: i64 = sqlx::query_scalar("SELECT votes FROM choices WHERE id = ?")
            .bind(choice_id)
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(votes, 0);
    }

    #[tokio::test]
    async fn test_choice_requires_existing_question() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let result = sqlx::query("INSERT INTO choices (question_id, choice_text) VALUES (?, ?)")
            .bind(999i64)
            .bind("Orphan")
            .execute(sqlite)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_vote_unique_per_question_and_user() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let user_id = insert_user(sqlite, "alice").await;
        let question_id = insert_question(sqlite, "Pick one").await;
        let first = insert_choice(sqlite, question_id, "A").await;
        let second = insert_choice(sqlite, question_id, "B").await;

        let insert = "INSERT INTO votes (question_id, choice_id, user_id, created_at) VALUES (?, ?, ?, ?)";
        sqlx::query(insert)
            .bind(question_id)
            .bind(first)
            .bind(user_id)
            .bind(Utc::now())
            .execute(sqlite)
            .await
            .expect("First vote should insert");

        let result = sqlx::query(insert)
            .bind(question_id)
            .bind(second)
            .bind(user_id)
            .bind(Utc::now())
            .execute(sqlite)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_question_cascades() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let user_id = insert_user(sqlite, "bob").await;
        let question_id = insert_question(sqlite, "Cascade?").await;
        let choice_id = insert_choice(sqlite, question_id, "Yes").await;
        sqlx::query("INSERT INTO votes (question_id, choice_id, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(question_id)
            .bind(choice_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(sqlite)
            .await
            .unwrap();

        sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(question_id)
            .execute(sqlite)
            .await
            .unwrap();

        assert_eq!(count(sqlite, "choices").await, 0);
        assert_eq!(count(sqlite, "votes").await, 0);
        assert_eq!(count(sqlite, "users").await, 1);
    }

    #[tokio::test]
    async fn test_username_unique() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        insert_user(sqlite, "carol").await;
        let result = sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
            .bind("carol")
            .bind("other")
            .bind(Utc::now())
            .execute(sqlite)
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_get_migration() {
        assert_eq!(get_migration(1).map(|m| m.name), Some("create_users"));
        assert_eq!(get_migration(5).map(|m| m.name), Some("create_votes"));
        assert!(get_migration(999).is_none());
    }

    #[test]
    fn test_total_migrations() {
        assert_eq!(total_migrations(), 5);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
