//! Template repository contract and SQLite implementation.
//!
//! # Invariants
//! - Templates are visible only to their owner.
//! - `contents` is stored verbatim; validation happens when it is used.

use crate::model::id::EntityId;
use crate::model::project::{now_epoch_ms, TemplateId, TemplateInfo};
use crate::repo::project_repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Owner-scoped template persistence.
pub trait TemplateRepository {
    fn create_template(&self, owner: &str, name: &str, contents: &str)
        -> RepoResult<TemplateInfo>;
    fn find_template(&self, owner: &str, id: TemplateId) -> RepoResult<TemplateInfo>;
}

impl<R: TemplateRepository + ?Sized> TemplateRepository for &R {
    fn create_template(
        &self,
        owner: &str,
        name: &str,
        contents: &str,
    ) -> RepoResult<TemplateInfo> {
        (**self).create_template(owner, name, contents)
    }

    fn find_template(&self, owner: &str, id: TemplateId) -> RepoResult<TemplateInfo> {
        (**self).find_template(owner, id)
    }
}

/// SQLite-backed template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "templates")?;
        Ok(Self { conn })
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn create_template(
        &self,
        owner: &str,
        name: &str,
        contents: &str,
    ) -> RepoResult<TemplateInfo> {
        let template = TemplateInfo {
            id: EntityId::generate(),
            name: name.to_string(),
            owner: owner.to_string(),
            contents: contents.to_string(),
            created_at: now_epoch_ms(),
        };

        self.conn.execute(
            "INSERT INTO templates (id, name, owner, contents, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                template.id.as_bytes().as_slice(),
                template.name.as_str(),
                template.owner.as_str(),
                template.contents.as_str(),
                template.created_at,
            ],
        )?;

        Ok(template)
    }

    fn find_template(&self, owner: &str, id: TemplateId) -> RepoResult<TemplateInfo> {
        let template = self
            .conn
            .query_row(
                "SELECT id, name, owner, contents, created_at
                 FROM templates
                 WHERE id = ?1
                   AND owner = ?2;",
                params![id.as_bytes().as_slice(), owner],
                |row| Ok(parse_template_row(row)),
            )
            .optional()?;

        template.unwrap_or(Err(RepoError::NotFound(id)))
    }
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<TemplateInfo> {
    let raw_id: Vec<u8> = row.get("id")?;
    let id = EntityId::try_from_slice(&raw_id)
        .map_err(|err| RepoError::InvalidData(format!("templates.id: {err}")))?;

    Ok(TemplateInfo {
        id,
        name: row.get("name")?,
        owner: row.get("owner")?,
        contents: row.get("contents")?,
        created_at: row.get("created_at")?,
    })
}
