//! Hook system
//!
//! Named hooks let other components observe lifecycle events without the
//! emitting service knowing about them. Handlers are registered explicitly at
//! startup and run in priority order.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Hook callback type
pub type HookCallback = Arc<dyn Fn(&mut Value) -> Option<Value> + Send + Sync>;

/// Hook priority (lower = earlier)
pub const PRIORITY_EARLY: i32 = -100;
pub const PRIORITY_DEFAULT: i32 = 0;
pub const PRIORITY_LATE: i32 = 100;

/// Registered hook handler
struct HookHandler {
    callback: HookCallback,
    priority: i32,
    owner: Option<String>,
}

/// Hook manager
pub struct HookManager {
    /// Registered hooks (hook_name -> handlers)
    hooks: RwLock<HashMap<String, Vec<HookHandler>>>,
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HookManager {
    /// Create a new hook manager
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a hook handler
    ///
    /// A handler may mutate the payload in place or return a replacement.
    /// `owner` tags the handler so it can later be removed with `unregister`.
    pub fn register<F>(&self, name: &str, callback: F, priority: i32, owner: Option<String>)
    where
        F: Fn(&mut Value) -> Option<Value> + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let handlers = hooks.entry(name.to_string()).or_default();

        handlers.push(HookHandler {
            callback: Arc::new(callback),
            priority,
            owner,
        });

        // Stable sort keeps registration order within a priority
        handlers.sort_by_key(|h| h.priority);

        debug!("Registered hook handler for '{}' with priority {}", name, priority);
    }

    /// Remove every handler registered under `owner`
    pub fn unregister(&self, owner: &str) {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        for handlers in hooks.values_mut() {
            handlers.retain(|h| h.owner.as_deref() != Some(owner));
        }
    }

    /// Trigger a hook and return the (possibly modified) data
    pub fn trigger(&self, name: &str, mut data: Value) -> Value {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());

        if let Some(handlers) = hooks.get(name) {
            for handler in handlers {
                if let Some(result) = (handler.callback)(&mut data) {
                    data = result;
                }
            }
        }

        data
    }

    /// Check if a hook has any handlers
    pub fn has_handlers(&self, name: &str) -> bool {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.get(name).is_some_and(|h| !h.is_empty())
    }
}

/// Hooks with trigger points in the user service
pub mod hook_names {
    /// Payload: `{"user_id", "username", "ip"}`
    pub const USER_LOGIN_AFTER: &str = "user_login_after";
    /// Payload: `{"username", "ip", "reason"}`
    pub const USER_LOGIN_FAILED: &str = "user_login_failed";
    /// Payload: `{"user_id", "username", "ip"}`
    pub const USER_LOGOUT: &str = "user_logout";
}
