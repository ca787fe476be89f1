use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use super::common::{is_unique_violation, parse_org_role};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::OrganizationRepo,
    },
    models::{Organization, OrganizationMember, OrganizationQuota, OrgRole},
};

pub struct SqliteOrganizationRepo {
    pool: SqlitePool,
}

impl SqliteOrganizationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_org(row: &SqliteRow) -> DbResult<Organization> {
    Ok(Organization {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_member(row: &SqliteRow) -> DbResult<OrganizationMember> {
    let role: String = row.try_get("role")?;
    Ok(OrganizationMember {
        org_id: row.try_get("org_id")?,
        user_id: row.try_get("user_id")?,
        role: parse_org_role(&role)?,
        joined_at: row.try_get("joined_at")?,
    })
}

#[async_trait]
impl OrganizationRepo for SqliteOrganizationRepo {
    async fn create(&self, name: &str, initial_balance_microcents: i64) -> DbResult<Organization> {
        // Organization and its quota row are created atomically.
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO organizations (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DbError::Conflict(format!("organization '{name}' already exists"))
                } else {
                    e.into()
                }
            })?;
        let id = result.last_insert_rowid();

        sqlx::query("INSERT INTO organization_quotas (org_id, balance_microcents) VALUES (?, ?)")
            .bind(id)
            .bind(initial_balance_microcents)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::Internal("organization vanished after insert".to_string()))
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Organization>> {
        let row =
            sqlx::query("SELECT id, name, created_at, updated_at FROM organizations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(map_org).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DbResult<Option<Organization>> {
        let row = sqlx::query(
            "SELECT id, name, created_at, updated_at FROM organizations WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_org).transpose()
    }

    async fn get_membership(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> DbResult<Option<(OrganizationMember, Organization)>> {
        let row = sqlx::query(
            r#"
            SELECT m.org_id, m.user_id, m.role, m.joined_at,
                   o.id, o.name,
                   o.created_at AS org_created_at, o.updated_at AS org_updated_at
            FROM organization_members m
            JOIN organizations o ON o.id = m.org_id
            WHERE m.org_id = ? AND m.user_id = ?
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let member = map_member(&row)?;
        let org = Organization {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("org_created_at")?,
            updated_at: row.try_get("org_updated_at")?,
        };
        Ok(Some((member, org)))
    }

    async fn get_quota(&self, org_id: i64) -> DbResult<Option<OrganizationQuota>> {
        let row = sqlx::query(
            "SELECT org_id, balance_microcents, updated_at FROM organization_quotas WHERE org_id = ?",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(OrganizationQuota {
                org_id: row.try_get("org_id")?,
                balance_microcents: row.try_get("balance_microcents")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn set_quota_balance(&self, org_id: i64, balance_microcents: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE organization_quotas SET balance_microcents = ?, updated_at = ? WHERE org_id = ?",
        )
        .bind(balance_microcents)
        .bind(Utc::now())
        .bind(org_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn add_member(&self, org_id: i64, user_id: i64, role: OrgRole) -> DbResult<()> {
        sqlx::query("INSERT INTO organization_members (org_id, user_id, role) VALUES (?, ?, ?)")
            .bind(org_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DbError::Conflict("user is already a member of this organization".to_string())
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    async fn list_members(&self, org_id: i64) -> DbResult<Vec<OrganizationMember>> {
        let rows = sqlx::query(
            r#"
            SELECT org_id, user_id, role, joined_at
            FROM organization_members
            WHERE org_id = ?
            ORDER BY joined_at ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_member).collect()
    }

    async fn update_member_role(&self, org_id: i64, user_id: i64, role: OrgRole) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE organization_members SET role = ? WHERE org_id = ? AND user_id = ?",
        )
        .bind(role.as_str())
        .bind(org_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, org_id: i64, user_id: i64) -> DbResult<bool> {
        let result =
            sqlx::query("DELETE FROM organization_members WHERE org_id = ? AND user_id = ?")
                .bind(org_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_owners(&self, org_id: i64) -> DbResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS owner_count FROM organization_members WHERE org_id = ? AND role = ?",
        )
        .bind(org_id)
        .bind(OrgRole::Owner.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("owner_count")?)
    }
}
