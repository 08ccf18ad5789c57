//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define owner-scoped data access contracts for projects and templates.
//! - Isolate SQLite query details from orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   storage transport errors.
//! - The caller identity is passed to every call, never read from ambient state.

pub mod project_repo;
pub mod template_repo;
