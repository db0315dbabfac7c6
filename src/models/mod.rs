//! Data models
//!
//! Database entities (Question, Choice, Vote, User, Session) and the input
//! types used to create them.

mod choice;
mod question;
mod session;
mod user;
mod vote;

pub use choice::{Choice, CreateChoiceInput};
pub use question::{CreateQuestionInput, Question, QuestionWithChoices, QUESTION_TEXT_MAX_LEN};
pub use session::Session;
pub use user::{CreateUserInput, User, USERNAME_MAX_LEN};
pub use vote::{RecordOutcome, Vote};
