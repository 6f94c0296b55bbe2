//! State kept in a directory next to the stack configuration.
//!
//! ```text
//! .stratus/
//!   state.json   recorded stack
//!   state.lock   current lock
//!   stack.json   last rendered document (written by apply)
//! ```
//!
//! Both JSON files are replaced through a sibling `<name>.tmp` file and a
//! rename.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, StateError, StratusError};

use super::lock::StackLock;
use super::store::StateStore;
use super::types::StackState;

/// Default state directory, relative to the configuration file.
pub const STATE_DIR: &str = ".stratus";

const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "state.lock";

/// File-backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    dir: PathBuf,
}

impl LocalStateStore {
    /// Keeps state under `dir`, created on first write.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the recorded state.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Path of the lock.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Default location of the rendered stack document.
    #[must_use]
    pub fn document_file(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("stack.{extension}"))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            StateError::write(format!("cannot create {}: {e}", self.dir.display())).into()
        })
    }
}

/// Reads and parses a JSON file, `None` if it does not exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StateError::Corrupted {
                message: format!("cannot read {}: {e}", path.display()),
            }
            .into());
        }
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        StateError::Corrupted {
            message: format!("cannot parse {}: {e}", path.display()),
        }
        .into()
    })
}

/// Serializes `value` and swaps it into `path` through a temporary file.
async fn write_json_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| StateError::serialization(e.to_string()))?;
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let write = async {
        let mut file = fs::File::create(&temp).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        fs::rename(&temp, path).await
    };
    write
        .await
        .map_err(|e| StateError::write(format!("{}: {e}", path.display())).into())
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<StackState>> {
        let state: Option<StackState> = read_json(&self.state_file()).await?;
        match &state {
            Some(state) => debug!(
                "Loaded {} resources for {}/{}",
                state.resources.len(),
                state.project,
                state.environment
            ),
            None => debug!("No state at {}", self.state_file().display()),
        }
        Ok(state)
    }

    async fn save(&self, state: &StackState, lock: &StackLock) -> Result<()> {
        let current: Option<StackLock> = read_json(&self.lock_file()).await?;
        if current.as_ref().map(|c| c.lock_id.as_str()) != Some(lock.lock_id.as_str()) {
            return Err(StateError::LockLost {
                lock_id: lock.lock_id.clone(),
                current: current.map_or_else(|| String::from("nobody"), |c| c.holder),
            }
            .into());
        }

        self.ensure_dir().await?;
        write_json_atomic(&self.state_file(), state).await?;
        info!("Recorded {} resources in {}", state.resources.len(), self.state_file().display());
        Ok(())
    }

    async fn lock(&self, stack: &str, holder: &str, command: &str) -> Result<StackLock> {
        self.ensure_dir().await?;
        let lock = StackLock::new(stack, holder, command);
        let path = self.lock_file();

        match read_json::<StackLock>(&path).await? {
            Some(existing) if !existing.is_expired() => {
                return Err(StateError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }
                .into());
            }
            Some(existing) => {
                warn!("Taking over lapsed lock held by {}", existing.holder);
                write_json_atomic(&path, &lock).await?;
            }
            None => {
                let content = serde_json::to_vec_pretty(&lock)
                    .map_err(|e| StateError::serialization(e.to_string()))?;
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await
                    .map_err(|e| lock_failed(&path, &e))?;
                file.write_all(&content)
                    .await
                    .map_err(|e| lock_failed(&path, &e))?;
                file.sync_all().await.map_err(|e| lock_failed(&path, &e))?;
            }
        }

        info!("Locked {stack} for '{command}' ({})", lock.lock_id);
        Ok(lock)
    }

    async fn unlock(&self, lock_id: &str) -> Result<bool> {
        let current: Option<StackLock> = read_json(&self.lock_file()).await?;
        if current.is_none_or(|c| c.lock_id != lock_id) {
            debug!("Lock {lock_id} is not the current lock");
            return Ok(false);
        }

        let path = self.lock_file();
        fs::remove_file(&path)
            .await
            .map_err(|e| lock_failed(&path, &e))?;
        info!("Released lock {lock_id}");
        Ok(true)
    }

    async fn current_lock(&self) -> Result<Option<StackLock>> {
        read_json(&self.lock_file()).await
    }
}

fn lock_failed(path: &Path, e: &std::io::Error) -> StratusError {
    StateError::LockFailed {
        message: format!("{}: {e}", path.display()),
    }
    .into()
}
