use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use super::common::{is_unique_violation, parse_project_role};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ProjectRepo,
    },
    models::{Project, ProjectMember, ProjectRole},
};

pub struct SqliteProjectRepo {
    pool: SqlitePool,
}

impl SqliteProjectRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_project(row: &SqliteRow) -> DbResult<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ProjectRepo for SqliteProjectRepo {
    async fn create(&self, org_id: i64, name: &str) -> DbResult<Project> {
        let result = sqlx::query("INSERT INTO projects (org_id, name) VALUES (?, ?)")
            .bind(org_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DbError::Conflict(format!("project '{name}' already exists in organization"))
                } else {
                    e.into()
                }
            })?;
        let id = result.last_insert_rowid();

        let row = sqlx::query(
            "SELECT id, org_id, name, created_at, updated_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        map_project(&row)
    }

    async fn get_by_id_and_org(&self, id: i64, org_id: i64) -> DbResult<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, org_id, name, created_at, updated_at FROM projects WHERE id = ? AND org_id = ?",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_project).transpose()
    }

    async fn get_by_name_and_org(&self, name: &str, org_id: i64) -> DbResult<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, org_id, name, created_at, updated_at FROM projects WHERE name = ? AND org_id = ?",
        )
        .bind(name)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_project).transpose()
    }

    async fn get_membership(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> DbResult<Option<(ProjectMember, Project)>> {
        let row = sqlx::query(
            r#"
            SELECT m.project_id, m.user_id, m.role, m.joined_at,
                   p.id, p.org_id, p.name,
                   p.created_at AS project_created_at, p.updated_at AS project_updated_at
            FROM project_members m
            JOIN projects p ON p.id = m.project_id
            WHERE m.project_id = ? AND m.user_id = ?
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let role: String = row.try_get("role")?;
        let member = ProjectMember {
            project_id: row.try_get("project_id")?,
            user_id: row.try_get("user_id")?,
            role: parse_project_role(&role)?,
            joined_at: row.try_get("joined_at")?,
        };
        let project = Project {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("project_created_at")?,
            updated_at: row.try_get("project_updated_at")?,
        };
        Ok(Some((member, project)))
    }

    async fn add_member(&self, project_id: i64, user_id: i64, role: ProjectRole) -> DbResult<()> {
        sqlx::query("INSERT INTO project_members (project_id, user_id, role) VALUES (?, ?, ?)")
            .bind(project_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DbError::Conflict("user is already a member of this project".to_string())
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }
}
