//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and document-service calls into project
//!   lifecycle operations.
//! - Keep transport layers decoupled from storage details.

pub mod project_service;
