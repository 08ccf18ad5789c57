//! Ownership-scoped project lifecycle orchestration.
//!
//! # Responsibility
//! - Provide create/list/find/rename/delete entry points for callers.
//! - Materialize the initial content tree of every new project.
//! - Parse untrusted ids before any repository call.
//!
//! # Invariants
//! - The caller identity is an explicit argument of every operation.
//! - Errors are propagated, never mapped to transport codes here.
//! - Rename of a missing/foreign project fails; delete of one succeeds.
//! - A failed content-tree write leaves the metadata row in place.

use crate::document::{DocError, DocumentService, DocumentTreeBuilder};
use crate::model::content::{ContentError, ProjectContent};
use crate::model::id::{EntityId, IdError};
use crate::model::project::{ProjectInfo, TemplateInfo};
use crate::repo::project_repo::{ProjectRepository, RepoError};
use crate::repo::template_repo::TemplateRepository;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error of an orchestrator operation.
#[derive(Debug)]
pub enum ServiceError {
    /// Malformed identifier; never reaches storage.
    InvalidId(IdError),
    /// No active entity with this id under the caller's ownership.
    NotFound(EntityId),
    /// Storage failure.
    Repo(RepoError),
    /// Document service failure while materializing content.
    Document(DocError),
    /// Content tree that cannot be materialized (template configuration).
    Content(ContentError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "resource not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Document(err) => write!(f, "{err}"),
            Self::Content(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidId(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Repo(err) => Some(err),
            Self::Document(err) => Some(err),
            Self::Content(err) => Some(err),
        }
    }
}

impl From<IdError> for ServiceError {
    fn from(value: IdError) -> Self {
        Self::InvalidId(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<DocError> for ServiceError {
    fn from(value: DocError) -> Self {
        Self::Document(value)
    }
}

impl From<ContentError> for ServiceError {
    fn from(value: ContentError) -> Self {
        Self::Content(value)
    }
}

/// Project lifecycle orchestrator.
pub struct ProjectService<R, T, D>
where
    R: ProjectRepository,
    T: TemplateRepository,
    D: DocumentService,
{
    projects: R,
    templates: T,
    builder: DocumentTreeBuilder<D>,
}

impl<R, T, D> ProjectService<R, T, D>
where
    R: ProjectRepository,
    T: TemplateRepository,
    D: DocumentService,
{
    pub fn new(projects: R, templates: T, builder: DocumentTreeBuilder<D>) -> Self {
        Self {
            projects,
            templates,
            builder,
        }
    }

    pub fn builder(&self) -> &DocumentTreeBuilder<D> {
        &self.builder
    }

    /// Creates a project owned by `owner` with the default content tree.
    ///
    /// Not idempotent: every call creates a new project.
    pub fn create_project(&self, owner: &str, name: &str) -> ServiceResult<ProjectInfo> {
        let project = self.projects.create_project(owner, name)?;
        let content = ProjectContent::new_default(project.id.to_string(), project.name.as_str());
        self.materialize(&project, &content)?;
        Ok(project)
    }

    /// Creates a project whose initial content comes from a stored template.
    ///
    /// Template contents are validated before anything is written.
    pub fn create_project_from_template(
        &self,
        owner: &str,
        name: &str,
        template_id: &str,
    ) -> ServiceResult<ProjectInfo> {
        let template_id = EntityId::parse(template_id)?;
        let template = self.templates.find_template(owner, template_id)?;
        let content = ProjectContent::from_json(&template.contents)?;

        let project = self.projects.create_project(owner, name)?;
        let content = content.restamp(project.id.to_string(), project.name.as_str());
        self.materialize(&project, &content)?;
        Ok(project)
    }

    /// Lists active projects of `owner`.
    pub fn list_projects(&self, owner: &str) -> ServiceResult<Vec<ProjectInfo>> {
        Ok(self.projects.list_projects(owner)?)
    }

    /// Returns one active project of `owner`.
    pub fn find_project(&self, owner: &str, id: &str) -> ServiceResult<ProjectInfo> {
        let id = EntityId::parse(id)?;
        Ok(self.projects.find_project(owner, id)?)
    }

    /// Renames a project. Fails with `NotFound` for foreign or deleted projects.
    pub fn update_project(&self, owner: &str, id: &str, name: &str) -> ServiceResult<()> {
        let id = EntityId::parse(id)?;
        Ok(self.projects.rename_project(owner, id, name)?)
    }

    /// Soft-deletes a project. Succeeds for missing or already-deleted ids.
    pub fn delete_project(&self, owner: &str, id: &str) -> ServiceResult<()> {
        let id = EntityId::parse(id)?;
        Ok(self.projects.soft_delete_project(owner, id)?)
    }

    /// Stores a template after checking that its contents parse.
    pub fn create_template(
        &self,
        owner: &str,
        name: &str,
        contents: &str,
    ) -> ServiceResult<TemplateInfo> {
        ProjectContent::from_json(contents)?;
        Ok(self.templates.create_template(owner, name, contents)?)
    }

    pub fn find_template(&self, owner: &str, id: &str) -> ServiceResult<TemplateInfo> {
        let id = EntityId::parse(id)?;
        Ok(self.templates.find_template(owner, id)?)
    }

    fn materialize(&self, project: &ProjectInfo, content: &ProjectContent) -> ServiceResult<()> {
        match self.builder.materialize(content) {
            Ok(()) => {
                info!(
                    "event=project_create module=service status=ok project_id={}",
                    project.id
                );
                Ok(())
            }
            Err(err) => {
                // Metadata row stays; it has no document until repaired.
                error!(
                    "event=project_create module=service status=error project_id={} stage=document error={}",
                    project.id, err
                );
                Err(err.into())
            }
        }
    }
}
