use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::VerifiedPrincipal,
    error::ApiError,
    middleware::ScopeIds,
    models::{OrgRole, OrganizationMember},
    routes::resolve_org,
    services::MemberService,
};

/// Membership roster. Org READER or higher.
pub async fn list_members(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
) -> Result<Json<Vec<OrganizationMember>>, ApiError> {
    let org_ctx = resolve_org(&state, &principal, &scope).await?;
    org_ctx.require_min_role(OrgRole::Reader)?;

    let members = MemberService::new(state.db.clone())
        .list(org_ctx.org().id)
        .await?;
    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: OrgRole,
}

/// Change a member's org role. OWNER only; the last owner cannot be
/// demoted.
pub async fn change_role(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Path(user_id): Path<i64>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Json<Value>, ApiError> {
    let org_ctx = resolve_org(&state, &principal, &scope).await?;
    org_ctx.require_min_role(OrgRole::Owner)?;

    MemberService::new(state.db.clone())
        .change_role(org_ctx.org().id, user_id, body.role)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Remove a member. OWNER only; the last owner cannot be removed.
pub async fn remove_member(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let org_ctx = resolve_org(&state, &principal, &scope).await?;
    org_ctx.require_min_role(OrgRole::Owner)?;

    MemberService::new(state.db.clone())
        .remove(org_ctx.org().id, user_id)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}
