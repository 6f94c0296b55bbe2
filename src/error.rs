//! Error types for the Stratus stack planner.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, subnet allocation, graph construction, planning and state.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Stratus stack planner.
#[derive(Debug, Error)]
pub enum StratusError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Subnet allocation errors.
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    /// Resource graph errors.
    #[error("Resource graph error: {0}")]
    Graph(#[from] GraphError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Subnet allocation errors.
///
/// Every variant is fatal for the declaration pass: nothing is rendered when
/// an address cannot be derived.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// The input is not a well-formed `a.b.c.d/prefix` block.
    #[error("Invalid address block '{input}': {reason}")]
    InvalidBlock {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The subnet mask is outside 0..=32.
    #[error("Invalid subnet mask /{mask}: must be between 0 and 32")]
    InvalidMask {
        /// The rejected mask.
        mask: u8,
    },

    /// The derived third octet does not fit in a byte.
    #[error(
        "Address space exhausted: index {index} on {base} gives third octet {octet} (max 255)"
    )]
    AddressSpaceExhausted {
        /// Base block in CIDR notation.
        base: String,
        /// Requested subnet index.
        index: u32,
        /// The out-of-range third octet.
        octet: u32,
    },

    /// The zone source returned no zones.
    #[error("No availability zones available")]
    NoZones,
}

/// Resource graph errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Two resources share a logical name.
    #[error("Duplicate resource name: {name}")]
    DuplicateResource {
        /// The duplicated name.
        name: String,
    },

    /// A resource references something that was not declared before it.
    #[error("Resource '{resource}' references undeclared resource '{target}'")]
    UndeclaredReference {
        /// The referencing resource.
        resource: String,
        /// The missing target.
        target: String,
    },

    /// Lookup of a resource that is not in the graph.
    #[error("Unknown resource: {name}")]
    UnknownResource {
        /// The missing name.
        name: String,
    },

    /// Circular dependency detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// A write was attempted under a lock that is no longer the current one.
    #[error("State lock {lock_id} is no longer held (current holder: {current})")]
    LockLost {
        /// The lock the writer believed it held.
        lock_id: String,
        /// Holder of the current lock, or `nobody`.
        current: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State belongs to another project or environment.
    #[error("State belongs to {found}, expected {expected}")]
    ProjectMismatch {
        /// Expected `project/environment`.
        expected: String,
        /// Recorded `project/environment`.
        found: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Plan is empty (nothing to do).
    #[error("Plan is empty: no changes required")]
    EmptyPlan,

    /// The stack document could not be rendered.
    #[error("Failed to render stack document: {message}")]
    RenderFailed {
        /// Description of the render failure.
        message: String,
    },
}

/// Result type alias for Stratus operations.
pub type Result<T> = std::result::Result<T, StratusError>;

impl StratusError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if retrying the same command could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::State(StateError::LockFailed { .. } | StateError::LockedByOther { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}
