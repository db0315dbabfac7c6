//! polls-admin: manage users, questions and choices from the command line
//!
//! Uses the same `config.yml`, database and migrations as the server.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use polls::{
    config::Config,
    db::{
        self,
        repositories::{SqlxChoiceRepository, SqlxQuestionRepository, SqlxSessionRepository, SqlxUserRepository},
        DatabasePool,
    },
    models::{CreateChoiceInput, CreateQuestionInput, CreateUserInput},
    services::{PollService, UserService},
};

#[derive(Parser, Debug)]
#[command(name = "polls-admin")]
#[command(about = "Administer the polls database", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user who can log in and vote
    CreateUser { username: String, password: String },

    /// Add a question; dates are RFC 3339, e.g. 2024-05-01T09:00:00Z
    AddQuestion {
        text: String,
        #[arg(value_parser = parse_datetime)]
        pub_date: DateTime<Utc>,
        #[arg(value_parser = parse_datetime)]
        end_date: DateTime<Utc>,
    },

    /// Add a choice to a question
    AddChoice { question_id: i64, text: String },

    /// Delete a question with its choices and votes
    DeleteQuestion { id: i64 },

    /// List every question with its choices and tallies
    ListQuestions,
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polls=warn".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_with_env(&args.config)?;

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let result = run(args.command, &pool).await;
    pool.close().await;
    result
}

async fn run(command: Command, pool: &db::DynDatabasePool) -> Result<()> {
    let polls = PollService::new(
        SqlxQuestionRepository::boxed(pool.clone()),
        SqlxChoiceRepository::boxed(pool.clone()),
    );

    match command {
        Command::CreateUser { username, password } => {
            let users = UserService::new(
                SqlxUserRepository::boxed(pool.clone()),
                SqlxSessionRepository::boxed(pool.clone()),
            );
            let user = users.create_user(CreateUserInput { username, password }).await?;
            println!("Created user {} (id {})", user.username, user.id);
        }
        Command::AddQuestion {
            text,
            pub_date,
            end_date,
        } => {
            if end_date < pub_date {
                eprintln!("Warning: end date is before publish date; the question will never accept votes");
            }
            let question = polls
                .create_question(CreateQuestionInput {
                    question_text: text,
                    pub_date,
                    end_date,
                })
                .await?;
            println!("Created question {}", question.id);
        }
        Command::AddChoice { question_id, text } => {
            let choice = polls
                .add_choice(CreateChoiceInput {
                    question_id,
                    choice_text: text,
                })
                .await?;
            println!("Created choice {} on question {}", choice.id, question_id);
        }
        Command::DeleteQuestion { id } => {
            polls.delete_question(id).await?;
            println!("Deleted question {}", id);
        }
        Command::ListQuestions => {
            let now = Utc::now();
            for question in polls.list_all().await? {
                let state = if !question.is_published_at(now) {
                    "scheduled"
                } else if question.can_vote_at(now) {
                    "open"
                } else {
                    "closed"
                };
                println!(
                    "{:>4}  [{}]  {}  ({} .. {})",
                    question.id,
                    state,
                    question.question_text,
                    question.pub_date.to_rfc3339(),
                    question.end_date.to_rfc3339()
                );
                for choice in polls.get_results(question.id).await?.choices {
                    println!("        {:>4}  {}  ({})", choice.id, choice.choice_text, choice.votes);
                }
            }
        }
    }

    Ok(())
}
