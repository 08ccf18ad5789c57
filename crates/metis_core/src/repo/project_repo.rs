//! Project repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist and query project metadata scoped to one owner.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every query filters by `owner`; ownership misses look like `NotFound`.
//! - `find`/`list`/`rename` only see rows with `status = 'created'`.
//! - `soft_delete` never fails for a missing or already-deleted row.
//! - Read paths reject inconsistent persisted rows instead of masking them.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::id::EntityId;
use crate::model::project::{now_epoch_ms, ProjectId, ProjectInfo, ProjectStatus};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    owner,
    status,
    created_at,
    deleted_at
FROM projects";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by project and template persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap failure.
    Db(DbError),
    /// No active entity with this id under the caller's ownership.
    NotFound(EntityId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted row cannot be converted into a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "resource not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Owner-scoped project persistence consumed by the orchestrator.
///
/// The caller identity is always an explicit argument.
pub trait ProjectRepository {
    /// Inserts a new `created` project owned by `owner`.
    fn create_project(&self, owner: &str, name: &str) -> RepoResult<ProjectInfo>;
    /// Returns the active project if `owner` owns it.
    fn find_project(&self, owner: &str, id: ProjectId) -> RepoResult<ProjectInfo>;
    /// Returns all active projects of `owner`. Order is unspecified.
    fn list_projects(&self, owner: &str) -> RepoResult<Vec<ProjectInfo>>;
    /// Renames an active project of `owner`; `NotFound` otherwise.
    fn rename_project(&self, owner: &str, id: ProjectId, name: &str) -> RepoResult<()>;
    /// Marks a project of `owner` deleted. Missing rows are a no-op success.
    fn soft_delete_project(&self, owner: &str, id: ProjectId) -> RepoResult<()>;
}

impl<R: ProjectRepository + ?Sized> ProjectRepository for &R {
    fn create_project(&self, owner: &str, name: &str) -> RepoResult<ProjectInfo> {
        (**self).create_project(owner, name)
    }

    fn find_project(&self, owner: &str, id: ProjectId) -> RepoResult<ProjectInfo> {
        (**self).find_project(owner, id)
    }

    fn list_projects(&self, owner: &str) -> RepoResult<Vec<ProjectInfo>> {
        (**self).list_projects(owner)
    }

    fn rename_project(&self, owner: &str, id: ProjectId, name: &str) -> RepoResult<()> {
        (**self).rename_project(owner, id, name)
    }

    fn soft_delete_project(&self, owner: &str, id: ProjectId) -> RepoResult<()> {
        (**self).soft_delete_project(owner, id)
    }
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "projects")?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, owner: &str, name: &str) -> RepoResult<ProjectInfo> {
        let project = ProjectInfo {
            id: EntityId::generate(),
            name: name.to_string(),
            owner: owner.to_string(),
            status: ProjectStatus::Created,
            created_at: now_epoch_ms(),
            deleted_at: None,
        };

        self.conn.execute(
            "INSERT INTO projects (id, name, owner, status, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL);",
            params![
                project.id.as_bytes().as_slice(),
                project.name.as_str(),
                project.owner.as_str(),
                project.status.as_str(),
                project.created_at,
            ],
        )?;

        debug!(
            "event=project_insert module=repo status=ok project_id={}",
            project.id
        );
        Ok(project)
    }

    fn find_project(&self, owner: &str, id: ProjectId) -> RepoResult<ProjectInfo> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL}
             WHERE id = ?1
               AND owner = ?2
               AND status = 'created';"
        ))?;

        let row = stmt
            .query_row(params![id.as_bytes().as_slice(), owner], |row| {
                Ok(parse_project_row(row))
            })
            .optional()?;

        match row {
            Some(project) => project,
            None => Err(RepoError::NotFound(id)),
        }
    }

    fn list_projects(&self, owner: &str) -> RepoResult<Vec<ProjectInfo>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL}
             WHERE owner = ?1
               AND status = 'created'
             ORDER BY created_at ASC, id ASC;"
        ))?;

        let mut rows = stmt.query([owner])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }

        Ok(projects)
    }

    fn rename_project(&self, owner: &str, id: ProjectId, name: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET name = ?3
             WHERE id = ?1
               AND owner = ?2
               AND status = 'created';",
            params![id.as_bytes().as_slice(), owner, name],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn soft_delete_project(&self, owner: &str, id: ProjectId) -> RepoResult<()> {
        // First deletion timestamp wins on repeated deletes.
        let changed = self.conn.execute(
            "UPDATE projects
             SET
                status = 'deleted',
                deleted_at = COALESCE(deleted_at, ?3)
             WHERE id = ?1
               AND owner = ?2;",
            params![id.as_bytes().as_slice(), owner, now_epoch_ms()],
        )?;

        debug!(
            "event=project_soft_delete module=repo status=ok project_id={} changed={}",
            id, changed
        );
        Ok(())
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<ProjectInfo> {
    let raw_id: Vec<u8> = row.get("id")?;
    let id = EntityId::try_from_slice(&raw_id)
        .map_err(|err| RepoError::InvalidData(format!("projects.id: {err}")))?;

    let status_text: String = row.get("status")?;
    let status = ProjectStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in projects.status"
        ))
    })?;

    let project = ProjectInfo {
        id,
        name: row.get("name")?,
        owner: row.get("owner")?,
        status,
        created_at: row.get("created_at")?,
        deleted_at: row.get("deleted_at")?,
    };
    if !project.is_consistent() {
        return Err(RepoError::InvalidData(format!(
            "status `{status_text}` disagrees with deleted_at for project {id}"
        )));
    }

    Ok(project)
}

/// Verifies schema version and table presence before a repository is used.
pub(crate) fn ensure_connection_ready(conn: &Connection, table: &'static str) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredTable(table));
    }

    Ok(())
}
