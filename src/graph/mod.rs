//! Resource declarations and the dependency graph they form.
//!
//! Edges are never stored explicitly: a resource depends on whatever its
//! properties reference.

mod dag;
mod resource;

pub use dag::{ResourceGraph, ResourceHandle};
pub use resource::{AttrRef, Property, Provider, Resource, ResourceKind};
