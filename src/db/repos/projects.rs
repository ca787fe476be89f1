use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Project, ProjectMember, ProjectRole},
};

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn create(&self, org_id: i64, name: &str) -> DbResult<Project>;
    /// Get a project by id, scoped to a specific organization.
    ///
    /// Prevents cross-org access by verifying the project belongs to the
    /// given org; a project in another org is indistinguishable from a
    /// missing one.
    async fn get_by_id_and_org(&self, id: i64, org_id: i64) -> DbResult<Option<Project>>;
    async fn get_by_name_and_org(&self, name: &str, org_id: i64) -> DbResult<Option<Project>>;

    /// Load the membership pair for a user/project, if the user is a member.
    async fn get_membership(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> DbResult<Option<(ProjectMember, Project)>>;

    async fn add_member(&self, project_id: i64, user_id: i64, role: ProjectRole) -> DbResult<()>;
}
