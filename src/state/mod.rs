//! State management module for the stack planner.
//!
//! This module records what the last `apply` rendered and where the document
//! went, with a bounded history of operations. Every write happens under a
//! [`StackLock`] taken before the state is loaded.

mod local;
mod lock;
mod store;
mod types;

pub use local::{LocalStateStore, STATE_DIR};
pub use lock::{process_holder, StackLock, LOCK_TTL_SECS};
pub use store::{load_stack, StateStore};
pub use types::{
    DocumentRecord, ResourceState, StackHistoryEntry, StackOperation, StackState, MAX_HISTORY,
    STATE_VERSION,
};
