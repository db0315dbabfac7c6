//! Services layer
//!
//! Business rules on top of the repositories. Services return `thiserror`
//! enums; repository failures are wrapped as `InternalError`.

pub mod auth_events;
pub mod password;
pub mod poll;
pub mod user;
pub mod voting;

pub use auth_events::{AuthEvent, AuthEventLogger, AuthLogLevel, AuthLogRecord, AuthLogSink, TracingSink};
pub use password::{hash_password, verify_password};
pub use poll::{PollService, PollServiceError};
pub use user::{LoginInput, UserService, UserServiceError};
pub use voting::{VoteOutcome, VotingService};
