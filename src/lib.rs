// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stratus
//!
//! A declarative cloud stack planner.
//!
//! ## Overview
//!
//! Stratus turns a YAML stack description into an ordered resource graph for
//! an external provisioning engine:
//!
//! - Derive non-overlapping public and private subnets from a VPC block
//! - Declare network, security groups, database, compute, DNS and a
//!   cross-cloud notification pipeline in dependency order
//! - Render the graph and its outputs as a stack document
//! - Track what was last rendered and show what changed since
//!
//! ## Architecture
//!
//! Everything happens in a single declaration pass:
//!
//! 1. **Configuration**: read from `stratus.stack.yaml`
//! 2. **Addressing**: zones are selected and subnets allocated
//! 3. **Declaration**: every resource is declared after what it references
//! 4. **Planning**: declaration hashes are compared with the recorded state
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`network`]: Address blocks, subnet allocation and zone selection
//! - [`graph`]: Resource declarations and the dependency graph
//! - [`stack`]: The declaration pass and the stack document
//! - [`planner`]: Hashing, diff computation and plans
//! - [`state`]: Local state storage with locking
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: shop
//!   environment: prod
//!   region: us-east-1
//!
//! network:
//!   vpc_name: shop-vpc
//!   vpc_cidr: 10.0.0.0/16
//!   availability_zones: [us-east-1a, us-east-1b, us-east-1c]
//!
//! compute:
//!   ami_id: ami-0123456789abcdef0
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod network;
pub mod planner;
pub mod stack;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, StackConfig};
pub use error::{Result, StratusError};
pub use graph::{Property, Resource, ResourceGraph, ResourceKind};
pub use network::{allocate, AddressBlock, SubnetAllocator};
pub use planner::{DiffEngine, PlanExecutor, StackHasher, StackPlan};
pub use stack::{declare_stack, DeclaredStack, StackDocument};
pub use state::{LocalStateStore, StackState, StateStore};
