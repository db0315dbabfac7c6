//! Authentication event logging
//!
//! `AuthEventLogger` subscribes to the user service's login/logout hooks and
//! turns each event into a log record written through an `AuthLogSink`. The
//! production sink emits `tracing` events.

use crate::hooks::{hook_names, HookManager, PRIORITY_LATE};
use serde_json::Value;
use std::sync::Arc;

/// Hook owner tag for the logger's handlers
pub const AUTH_LOGGER_OWNER: &str = "auth_event_logger";

/// Severity of an auth log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLogLevel {
    Info,
    Warning,
}

/// One authentication event, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthLogRecord {
    pub level: AuthLogLevel,
    pub message: &'static str,
    pub username: Option<String>,
    pub ip: Option<String>,
}

/// Authentication events the logger understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn,
    LoginFailed,
    LoggedOut,
}

impl AuthEvent {
    fn hook_name(self) -> &'static str {
        match self {
            AuthEvent::LoggedIn => hook_names::USER_LOGIN_AFTER,
            AuthEvent::LoginFailed => hook_names::USER_LOGIN_FAILED,
            AuthEvent::LoggedOut => hook_names::USER_LOGOUT,
        }
    }

    fn level(self) -> AuthLogLevel {
        match self {
            AuthEvent::LoginFailed => AuthLogLevel::Warning,
            AuthEvent::LoggedIn | AuthEvent::LoggedOut => AuthLogLevel::Info,
        }
    }

    fn message(self) -> &'static str {
        match self {
            AuthEvent::LoggedIn => "You have successfully logged in.",
            AuthEvent::LoginFailed => "You have unsuccessfully logged in.",
            AuthEvent::LoggedOut => "You have successfully logged out.",
        }
    }
}

/// Destination for auth log records
pub trait AuthLogSink: Send + Sync {
    fn write(&self, record: &AuthLogRecord);
}

/// Sink writing records as `tracing` events under the `polls::auth` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AuthLogSink for TracingSink {
    fn write(&self, record: &AuthLogRecord) {
        let username = record.username.as_deref().unwrap_or("-");
        let ip = record.ip.as_deref().unwrap_or("-");
        match record.level {
            AuthLogLevel::Info => {
                tracing::info!(target: "polls::auth", username, ip, "{}", record.message)
            }
            AuthLogLevel::Warning => {
                tracing::warn!(target: "polls::auth", username, ip, "{}", record.message)
            }
        }
    }
}

/// Observer turning auth hooks into log records
pub struct AuthEventLogger {
    sink: Arc<dyn AuthLogSink>,
}

impl AuthEventLogger {
    pub fn new(sink: Arc<dyn AuthLogSink>) -> Self {
        Self { sink }
    }

    /// Logger backed by `TracingSink`
    pub fn with_tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Register handlers for the three auth hooks
    ///
    /// Handlers never modify the payload, so the outcome seen by the user
    /// service is unchanged.
    pub fn subscribe(self: &Arc<Self>, hooks: &HookManager) {
        for event in [AuthEvent::LoggedIn, AuthEvent::LoginFailed, AuthEvent::LoggedOut] {
            let logger = Arc::clone(self);
            hooks.register(
                event.hook_name(),
                move |payload| {
                    logger.log(event, payload);
                    None
                },
                PRIORITY_LATE,
                Some(AUTH_LOGGER_OWNER.to_string()),
            );
        }
    }

    /// Write the record for `event` using `username` and `ip` from the payload
    pub fn log(&self, event: AuthEvent, payload: &Value) {
        let field = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);
        self.sink.write(&AuthLogRecord {
            level: event.level(),
            message: event.message(),
            username: field("username"),
            ip: field("ip"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<AuthLogRecord>>,
    }

    impl AuthLogSink for MemorySink {
        fn write(&self, record: &AuthLogRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    fn subscribed() -> (HookManager, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let logger = Arc::new(AuthEventLogger::new(sink.clone()));
        let hooks = HookManager::new();
        logger.subscribe(&hooks);
        (hooks, sink)
    }

    #[test]
    fn test_login_success_logged_as_info() {
        let (hooks, sink) = subscribed();

        hooks.trigger(
            hook_names::USER_LOGIN_AFTER,
            json!({"user_id": 1, "username": "alice", "ip": "192.0.2.1"}),
        );

        let records = sink.records.lock().unwrap();
        assert_eq!(
            *records,
            vec![AuthLogRecord {
                level: AuthLogLevel::Info,
                message: "You have successfully logged in.",
                username: Some("alice".into()),
                ip: Some("192.0.2.1".into()),
            }]
        );
    }

    #[test]
    fn test_login_failure_logged_as_warning() {
        let (hooks, sink) = subscribed();

        hooks.trigger(
            hook_names::USER_LOGIN_FAILED,
            json!({"username": "mallory", "ip": null, "reason": "invalid_password"}),
        );

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, AuthLogLevel::Warning);
        assert_eq!(records[0].message, "You have unsuccessfully logged in.");
        assert_eq!(records[0].username.as_deref(), Some("mallory"));
        assert_eq!(records[0].ip, None);
    }

    #[test]
    fn test_logout_logged_as_info() {
        let (hooks, sink) = subscribed();

        hooks.trigger(hook_names::USER_LOGOUT, json!({"username": null, "ip": "10.0.0.9"}));

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, AuthLogLevel::Info);
        assert_eq!(records[0].message, "You have successfully logged out.");
        assert_eq!(records[0].username, None);
    }

    #[test]
    fn test_observer_does_not_alter_payload() {
        let (hooks, _sink) = subscribed();
        let payload = json!({"username": "alice", "ip": "192.0.2.1"});

        assert_eq!(hooks.trigger(hook_names::USER_LOGIN_AFTER, payload.clone()), payload);
    }

    #[test]
    fn test_unsubscribe() {
        let (hooks, sink) = subscribed();
        hooks.unregister(AUTH_LOGGER_OWNER);

        hooks.trigger(hook_names::USER_LOGOUT, json!({}));
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[test]
    fn test_tracing_sink_accepts_records() {
        let logger = AuthEventLogger::with_tracing();
        logger.log(AuthEvent::LoginFailed, &json!({"username": "x"}));
        logger.log(AuthEvent::LoggedIn, &json!({}));
    }
}
