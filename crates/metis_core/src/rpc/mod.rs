//! RPC surface: interceptor pipeline, status mapping and operations.
//!
//! # Responsibility
//! - Authenticate every inbound call and thread the caller identity
//!   explicitly into the orchestrator.
//! - Map domain errors to transport status in exactly one place.
//!
//! Listener bootstrapping and wire encoding live outside this crate.

pub mod interceptor;
pub mod server;
pub mod status;
