//! Domain model for projects, templates and project content.
//!
//! # Responsibility
//! - Define canonical data structures used by the repository, builder and
//!   orchestrator layers.
//!
//! # Invariants
//! - Every persisted entity is identified by a fixed-width `EntityId`.
//! - Deletion is represented by a status flip, not a hard delete.

pub mod content;
pub mod id;
pub mod project;
