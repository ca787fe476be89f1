//! The reserved system tenant and the write-once cache of its ids.

use tokio::sync::OnceCell;

use crate::{
    db::{DbPool, DbResult},
    error::ApiError,
};

pub const SYSTEM_ORG_NAME: &str = "system";
pub const SYSTEM_PROJECT_NAME: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemIds {
    pub org_id: i64,
    pub project_id: i64,
}

/// Memoizes the system org/project ids after the first successful lookup.
/// Never invalidated: the system tenant is created at startup and its ids
/// do not change for the life of the process.
#[derive(Default)]
pub struct SystemIdCache {
    cell: OnceCell<SystemIds>,
}

impl SystemIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load(&self, db: &DbPool) -> Result<SystemIds, ApiError> {
        self.cell
            .get_or_try_init(|| async {
                let org = db
                    .organizations()
                    .get_by_name(SYSTEM_ORG_NAME)
                    .await?
                    .ok_or_else(|| {
                        ApiError::Internal("system organization is not provisioned".to_string())
                    })?;
                let project = db
                    .projects()
                    .get_by_name_and_org(SYSTEM_PROJECT_NAME, org.id)
                    .await?
                    .ok_or_else(|| {
                        ApiError::Internal("system project is not provisioned".to_string())
                    })?;
                Ok::<_, ApiError>(SystemIds {
                    org_id: org.id,
                    project_id: project.id,
                })
            })
            .await
            .copied()
    }
}

/// Create the system org and project if absent. Runs at startup, after
/// migrations.
pub async fn ensure_system_tenancy(db: &DbPool) -> DbResult<SystemIds> {
    let org = match db.organizations().get_by_name(SYSTEM_ORG_NAME).await? {
        Some(org) => org,
        None => db.organizations().create(SYSTEM_ORG_NAME, 0).await?,
    };

    let project = match db
        .projects()
        .get_by_name_and_org(SYSTEM_PROJECT_NAME, org.id)
        .await?
    {
        Some(project) => project,
        None => db.projects().create(org.id, SYSTEM_PROJECT_NAME).await?,
    };

    Ok(SystemIds {
        org_id: org.id,
        project_id: project.id,
    })
}
