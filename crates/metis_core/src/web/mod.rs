//! Web-facing handlers called by the document service.

pub mod auth_webhook;
