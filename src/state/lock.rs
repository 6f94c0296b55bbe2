//! Stack locks.
//!
//! A lock names the stack it guards and the command that took it. It lapses
//! after [`LOCK_TTL_SECS`] so a crashed `apply` cannot hold the stack forever,
//! and every state write must present the lock it was made under.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a lock stays valid.
pub const LOCK_TTL_SECS: i64 = 300;

/// The lock guarding one stack's state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackLock {
    /// Identifier handed back on release.
    pub lock_id: String,
    /// `project/environment` of the guarded stack.
    pub stack: String,
    /// Process or operator holding the lock.
    pub holder: String,
    /// Command that took the lock (`apply`, `destroy`, `lock`).
    pub command: String,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
    /// When the lock lapses.
    pub expires_at: DateTime<Utc>,
}

impl StackLock {
    /// Takes a fresh lock for `stack` on behalf of `command`.
    ///
    /// An empty holder is replaced by [`process_holder`].
    #[must_use]
    pub fn new(stack: &str, holder: &str, command: &str) -> Self {
        let now = Utc::now();
        let holder = if holder.is_empty() {
            process_holder()
        } else {
            holder.to_string()
        };

        Self {
            lock_id: Uuid::new_v4().to_string(),
            stack: stack.to_string(),
            holder,
            command: command.to_string(),
            acquired_at: now,
            expires_at: now + Duration::seconds(LOCK_TTL_SECS),
        }
    }

    /// True once the lock has lapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Seconds left before the lock lapses.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    /// One-line description for status output.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} locked by {} for '{}' ({}s remaining)",
            self.stack,
            self.holder,
            self.command,
            self.remaining_secs()
        )
    }
}

/// `host-pid-xxxxxxxx` identifier for the running process.
#[must_use]
pub fn process_holder() -> String {
    let host = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().into_owned());
    let suffix = Uuid::new_v4().simple().to_string();

    format!("{host}-{}-{}", std::process::id(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lock_names_stack_and_command() {
        let lock = StackLock::new("shop/prod", "ci", "apply");
        assert_eq!(lock.stack, "shop/prod");
        assert_eq!(lock.holder, "ci");
        assert_eq!(lock.command, "apply");
        assert!(!lock.is_expired());
        assert!(lock.remaining_secs() <= LOCK_TTL_SECS);
        assert!(lock.describe().starts_with("shop/prod locked by ci for 'apply'"));
    }

    #[test]
    fn test_lapsed_lock() {
        let mut lock = StackLock::new("shop/prod", "ci", "apply");
        lock.expires_at = Utc::now() - Duration::seconds(1);
        assert!(lock.is_expired());
        assert_eq!(lock.remaining_secs(), 0);
    }

    #[test]
    fn test_empty_holder_uses_process_identity() {
        let lock = StackLock::new("shop/dev", "", "destroy");
        assert!(lock.holder.contains(&std::process::id().to_string()));
        assert_ne!(process_holder(), process_holder());
    }
}
