//! Organization membership mutations, including the last-owner rule.

use std::sync::Arc;

use crate::{
    db::DbPool,
    error::ApiError,
    models::{OrgRole, OrganizationMember},
};

pub struct MemberService {
    db: Arc<DbPool>,
}

impl MemberService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list(&self, org_id: i64) -> Result<Vec<OrganizationMember>, ApiError> {
        Ok(self.db.organizations().list_members(org_id).await?)
    }

    /// Change a member's role. Demoting the last OWNER is forbidden: an
    /// organization must keep at least one.
    pub async fn change_role(
        &self,
        org_id: i64,
        target_user_id: i64,
        new_role: OrgRole,
    ) -> Result<(), ApiError> {
        let (current, _) = self
            .db
            .organizations()
            .get_membership(org_id, target_user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("member not found".to_string()))?;

        if current.role == OrgRole::Owner && new_role != OrgRole::Owner {
            self.ensure_not_last_owner(org_id).await?;
        }

        let updated = self
            .db
            .organizations()
            .update_member_role(org_id, target_user_id, new_role)
            .await?;
        if !updated {
            return Err(ApiError::NotFound("member not found".to_string()));
        }
        Ok(())
    }

    /// Remove a member. Removing the last OWNER is forbidden.
    pub async fn remove(&self, org_id: i64, target_user_id: i64) -> Result<(), ApiError> {
        let (current, _) = self
            .db
            .organizations()
            .get_membership(org_id, target_user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("member not found".to_string()))?;

        if current.role == OrgRole::Owner {
            self.ensure_not_last_owner(org_id).await?;
        }

        let removed = self
            .db
            .organizations()
            .remove_member(org_id, target_user_id)
            .await?;
        if !removed {
            return Err(ApiError::NotFound("member not found".to_string()));
        }
        Ok(())
    }

    async fn ensure_not_last_owner(&self, org_id: i64) -> Result<(), ApiError> {
        let owners = self.db.organizations().count_owners(org_id).await?;
        if owners < 2 {
            return Err(ApiError::Forbidden(
                "organization must keep at least one owner".to_string(),
            ));
        }
        Ok(())
    }
}
