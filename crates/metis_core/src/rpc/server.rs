//! RPC operations exposed to clients.
//!
//! Each method wraps one orchestrator call in [`intercept`], so every call is
//! authenticated, timed and logged the same way.

use crate::document::DocumentService;
use crate::model::project::ProjectInfo;
use crate::repo::project_repo::ProjectRepository;
use crate::repo::template_repo::TemplateRepository;
use crate::rpc::interceptor::{intercept, RequestMetadata};
use crate::rpc::status::RpcStatus;
use crate::service::project_service::ProjectService;
use serde::{Deserialize, Serialize};

pub const CREATE_PROJECT_METHOD: &str = "/api.Metis/CreateProject";
pub const LIST_PROJECTS_METHOD: &str = "/api.Metis/ListProjects";
pub const UPDATE_PROJECT_METHOD: &str = "/api.Metis/UpdateProject";
pub const DELETE_PROJECT_METHOD: &str = "/api.Metis/DeleteProject";

/// Project as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMessage {
    pub id: String,
    pub name: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl From<&ProjectInfo> for ProjectMessage {
    fn from(project: &ProjectInfo) -> Self {
        Self {
            id: project.id.to_string(),
            name: project.name.clone(),
            created_at: project.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub project_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectResponse {
    pub project: ProjectMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListProjectsRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListProjectsResponse {
    pub projects: Vec<ProjectMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub project_id: String,
    pub project_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProjectResponse {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProjectRequest {
    pub project_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProjectResponse {}

/// RPC facade over the project orchestrator.
pub struct MetisRpc<R, T, D>
where
    R: ProjectRepository,
    T: TemplateRepository,
    D: DocumentService,
{
    service: ProjectService<R, T, D>,
}

impl<R, T, D> MetisRpc<R, T, D>
where
    R: ProjectRepository,
    T: TemplateRepository,
    D: DocumentService,
{
    pub fn new(service: ProjectService<R, T, D>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &ProjectService<R, T, D> {
        &self.service
    }

    pub fn create_project(
        &self,
        metadata: &RequestMetadata,
        request: &CreateProjectRequest,
    ) -> Result<CreateProjectResponse, RpcStatus> {
        intercept(CREATE_PROJECT_METHOD, metadata, request, |ctx, req| {
            let project = self
                .service
                .create_project(ctx.caller.as_str(), &req.project_name)?;
            Ok(CreateProjectResponse {
                project: ProjectMessage::from(&project),
            })
        })
    }

    pub fn list_projects(
        &self,
        metadata: &RequestMetadata,
        request: &ListProjectsRequest,
    ) -> Result<ListProjectsResponse, RpcStatus> {
        intercept(LIST_PROJECTS_METHOD, metadata, request, |ctx, _| {
            let projects = self.service.list_projects(ctx.caller.as_str())?;
            Ok(ListProjectsResponse {
                projects: projects.iter().map(ProjectMessage::from).collect(),
            })
        })
    }

    pub fn update_project(
        &self,
        metadata: &RequestMetadata,
        request: &UpdateProjectRequest,
    ) -> Result<UpdateProjectResponse, RpcStatus> {
        intercept(UPDATE_PROJECT_METHOD, metadata, request, |ctx, req| {
            self.service
                .update_project(ctx.caller.as_str(), &req.project_id, &req.project_name)?;
            Ok(UpdateProjectResponse {})
        })
    }

    pub fn delete_project(
        &self,
        metadata: &RequestMetadata,
        request: &DeleteProjectRequest,
    ) -> Result<DeleteProjectResponse, RpcStatus> {
        intercept(DELETE_PROJECT_METHOD, metadata, request, |ctx, req| {
            self.service
                .delete_project(ctx.caller.as_str(), &req.project_id)?;
            Ok(DeleteProjectResponse {})
        })
    }
}
