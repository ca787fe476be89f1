//! Typestate resolution chain: `UserContext` → `OrgContext` →
//! `ProjectContext`. Each stage owns the previous one and can only be built
//! by the resolver, so a handler cannot name an org member before org
//! resolution has happened.

use crate::{
    error::ApiError,
    models::{
        Organization, OrganizationMember, OrganizationQuota, OrgRole, Project, ProjectMember,
        ProjectRole, User,
    },
};

/// An authenticated user, before any org or project scope is attached.
#[derive(Debug, Clone)]
pub struct UserContext {
    user: User,
}

impl UserContext {
    pub(crate) fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }
}

/// A user resolved inside one organization, with their membership role and
/// the org's quota row.
#[derive(Debug, Clone)]
pub struct OrgContext {
    user_ctx: UserContext,
    member: OrganizationMember,
    org: Organization,
    quota: OrganizationQuota,
}

impl OrgContext {
    pub(crate) fn new(
        user_ctx: UserContext,
        member: OrganizationMember,
        org: Organization,
        quota: OrganizationQuota,
    ) -> Self {
        Self {
            user_ctx,
            member,
            org,
            quota,
        }
    }

    pub fn user(&self) -> &User {
        self.user_ctx.user()
    }

    pub fn org(&self) -> &Organization {
        &self.org
    }

    pub fn member(&self) -> &OrganizationMember {
        &self.member
    }

    pub fn quota(&self) -> &OrganizationQuota {
        &self.quota
    }

    /// Pure gate: `Forbidden` unless the member's role ranks at least `min`.
    pub fn require_min_role(&self, min: OrgRole) -> Result<(), ApiError> {
        if self.member.role.meets(min) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "requires org role {min} or higher"
            )))
        }
    }
}

/// A user resolved inside one project of an already-resolved organization.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    org_ctx: OrgContext,
    member: ProjectMember,
    project: Project,
}

impl ProjectContext {
    pub(crate) fn new(org_ctx: OrgContext, member: ProjectMember, project: Project) -> Self {
        Self {
            org_ctx,
            member,
            project,
        }
    }

    pub fn user(&self) -> &User {
        self.org_ctx.user()
    }

    pub fn org(&self) -> &OrgContext {
        &self.org_ctx
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn member(&self) -> &ProjectMember {
        &self.member
    }

    pub fn require_min_role(&self, min: ProjectRole) -> Result<(), ApiError> {
        if self.member.role.meets(min) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "requires project role {min} or higher"
            )))
        }
    }
}
