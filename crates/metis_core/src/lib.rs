//! Core of the Metis project server.
//! Owns project metadata, the initial document content of every project, and
//! the request pipeline in front of them.

pub mod config;
pub mod db;
pub mod document;
pub mod logging;
pub mod model;
pub mod repo;
pub mod rpc;
pub mod service;
pub mod web;

pub use config::{Config, ConfigError};
pub use document::memory::{Fault, MemoryDocumentService};
pub use document::{DocError, DocObject, DocumentKey, DocumentService, DocumentTreeBuilder};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogTarget,
};
pub use model::content::{
    Block, BlockKind, ContentError, NormalKind, ParameterValue, Parameters, ProjectContent,
};
pub use model::id::{EntityId, IdError};
pub use model::project::{ProjectId, ProjectInfo, ProjectStatus, TemplateInfo};
pub use repo::project_repo::{ProjectRepository, RepoError, RepoResult, SqliteProjectRepository};
pub use repo::template_repo::{SqliteTemplateRepository, TemplateRepository};
pub use rpc::interceptor::{intercept, CallerId, RequestMetadata};
pub use rpc::server::MetisRpc;
pub use rpc::status::{RpcStatus, StatusCode};
pub use service::project_service::{ProjectService, ServiceError, ServiceResult};
pub use web::auth_webhook::{AuthWebhook, AuthWebhookResponse, WebResponse};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
