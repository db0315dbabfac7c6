//! Database repositories
//!
//! One repository per entity. Each exposes an `async_trait` interface and a
//! `Sqlx*Repository` implementation that dispatches on the pool's driver.

pub mod choice;
pub mod question;
pub mod session;
pub mod user;
pub mod vote;

pub use choice::{ChoiceRepository, SqlxChoiceRepository};
pub use question::{QuestionRepository, SqlxQuestionRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use vote::{SqlxVoteRepository, VoteRepository};
