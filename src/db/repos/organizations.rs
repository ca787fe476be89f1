use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Organization, OrganizationMember, OrganizationQuota, OrgRole},
};

#[async_trait]
pub trait OrganizationRepo: Send + Sync {
    /// Create an organization and its quota row in one transaction.
    async fn create(&self, name: &str, initial_balance_microcents: i64) -> DbResult<Organization>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<Organization>>;
    async fn get_by_name(&self, name: &str) -> DbResult<Option<Organization>>;

    /// Load the membership pair for a user/org, if the user is a member.
    async fn get_membership(
        &self,
        org_id: i64,
        user_id: i64,
    ) -> DbResult<Option<(OrganizationMember, Organization)>>;

    async fn get_quota(&self, org_id: i64) -> DbResult<Option<OrganizationQuota>>;
    /// Overwrite the quota balance. The read-modify-write cycle lives in
    /// the ledger, not here.
    async fn set_quota_balance(&self, org_id: i64, balance_microcents: i64) -> DbResult<()>;

    async fn add_member(&self, org_id: i64, user_id: i64, role: OrgRole) -> DbResult<()>;
    async fn list_members(&self, org_id: i64) -> DbResult<Vec<OrganizationMember>>;
    /// Returns false when no such member exists.
    async fn update_member_role(&self, org_id: i64, user_id: i64, role: OrgRole) -> DbResult<bool>;
    async fn remove_member(&self, org_id: i64, user_id: i64) -> DbResult<bool>;
    async fn count_owners(&self, org_id: i64) -> DbResult<i64>;
}
