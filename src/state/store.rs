//! The seam between commands and wherever stack state is kept.

use async_trait::async_trait;

use super::lock::StackLock;
use super::types::StackState;
use crate::error::{Result, StateError};

/// Storage for one stack's recorded state and its lock.
///
/// Writes are only accepted under the lock that is current at write time, so
/// a command must lock first and load inside the lock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the recorded state, `None` before the first apply.
    async fn load(&self) -> Result<Option<StackState>>;

    /// Records `state`, provided `lock` is still the current lock.
    async fn save(&self, state: &StackState, lock: &StackLock) -> Result<()>;

    /// Locks `stack` for `command`. Lapsed locks are taken over.
    async fn lock(&self, stack: &str, holder: &str, command: &str) -> Result<StackLock>;

    /// Releases the lock with `lock_id`. Returns false if it was not current.
    async fn unlock(&self, lock_id: &str) -> Result<bool>;

    /// The current lock, lapsed or not.
    async fn current_lock(&self) -> Result<Option<StackLock>>;
}

/// Loads the state recorded for `project/environment`, or a fresh one.
///
/// # Errors
///
/// Returns [`StateError::ProjectMismatch`] when the store holds another
/// stack's state, or whatever the store fails with.
pub async fn load_stack<S: StateStore + ?Sized>(
    store: &S,
    project: &str,
    environment: &str,
) -> Result<StackState> {
    let Some(state) = store.load().await? else {
        return Ok(StackState::new(project, environment));
    };

    if state.belongs_to(project, environment) {
        return Ok(state);
    }

    Err(StateError::ProjectMismatch {
        expected: format!("{project}/{environment}"),
        found: format!("{}/{}", state.project, state.environment),
    }
    .into())
}
