use std::sync::Arc;

use crate::{
    auth::VerifiedPrincipal,
    config::AuthMode,
    db::DbPool,
    error::ApiError,
    tenant::context::{OrgContext, ProjectContext, UserContext},
};

/// Builds the context chain stage by stage. Each step loads from the
/// database and fails fast; later stages cannot exist without the earlier
/// ones.
#[derive(Clone)]
pub struct ContextResolver {
    db: Arc<DbPool>,
    mode: AuthMode,
}

impl ContextResolver {
    pub fn new(db: Arc<DbPool>, mode: AuthMode) -> Self {
        Self { db, mode }
    }

    /// Resolve the principal to a stored user.
    ///
    /// Hosted mode cross-checks the external subject against the stored
    /// `auth_id`; self-hosted mode has no external subject and skips the
    /// check entirely.
    pub async fn attach_user(
        &self,
        principal: &VerifiedPrincipal,
    ) -> Result<UserContext, ApiError> {
        let user = self
            .db
            .users()
            .get_by_id(principal.account_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

        if self.mode == AuthMode::Hosted {
            let matches = matches!(
                (&principal.subject, &user.auth_id),
                (Some(subject), Some(auth_id)) if subject == auth_id
            );
            if !matches {
                tracing::warn!(user_id = user.id, "identity subject mismatch");
                return Err(ApiError::Forbidden("identity mismatch".to_string()));
            }
        }

        Ok(UserContext::new(user))
    }

    /// Resolve org membership plus the org's quota row.
    pub async fn attach_org(
        &self,
        user_ctx: UserContext,
        org_id: i64,
    ) -> Result<OrgContext, ApiError> {
        let user_id = user_ctx.user().id;
        let (member, org) = self
            .db
            .organizations()
            .get_membership(org_id, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("organization not found".to_string()))?;

        // Every org is provisioned with a quota row in the same transaction
        // that creates it. Absence here is corruption, not a user error.
        let quota = self
            .db
            .organizations()
            .get_quota(org.id)
            .await?
            .ok_or_else(|| {
                tracing::error!(org_id = org.id, "organization is missing its quota row");
                ApiError::IntegrityFault(format!("organization {} has no quota row", org.id))
            })?;

        Ok(OrgContext::new(user_ctx, member, org, quota))
    }

    /// Resolve project membership within the already-resolved org.
    /// A project belonging to a different org is indistinguishable from a
    /// nonexistent one.
    pub async fn attach_project(
        &self,
        org_ctx: OrgContext,
        project_id: i64,
    ) -> Result<ProjectContext, ApiError> {
        let user_id = org_ctx.user().id;
        let (member, project) = self
            .db
            .projects()
            .get_membership(project_id, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("project not found".to_string()))?;

        if project.org_id != org_ctx.org().id {
            tracing::debug!(
                project_id,
                org_id = org_ctx.org().id,
                "project belongs to a different organization"
            );
            return Err(ApiError::NotFound("project not found".to_string()));
        }

        Ok(ProjectContext::new(org_ctx, member, project))
    }
}
