//! HTTP surface. Tenant scope arrives in headers, not paths; handlers
//! resolve their context chain explicitly at the top, so the required
//! scope of every route is visible in its signature.

mod execution;
mod health;
mod me;
mod members;
mod usage;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    auth::{self, VerifiedPrincipal},
    error::ApiError,
    middleware::ScopeIds,
    tenant::{OrgContext, ProjectContext},
};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/user/me", get(me::me))
        .route("/organization/usage", get(usage::org_usage))
        .route("/organization/members", get(members::list_members))
        .route(
            "/organization/members/{user_id}/role",
            put(members::change_role),
        )
        .route(
            "/organization/members/{user_id}",
            delete(members::remove_member),
        )
        .route("/project/usage", get(usage::project_usage))
        .route("/project/usage/details", get(usage::project_usage_details))
        .route("/project/usage_v2", get(usage::project_usage_daily))
        .route("/project/logs", get(usage::project_logs))
        .route(
            "/project/prompts/{prompt_id}/run",
            post(execution::run_prompt),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::attach_principal,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Principal → user → org, using the `org-id` header.
pub(crate) async fn resolve_org(
    state: &AppState,
    principal: &VerifiedPrincipal,
    scope: &ScopeIds,
) -> Result<OrgContext, ApiError> {
    let org_id = scope.require_org()?;
    let user_ctx = state.resolver.attach_user(principal).await?;
    state.resolver.attach_org(user_ctx, org_id).await
}

/// Principal → user → org → project, using both scope headers.
pub(crate) async fn resolve_project(
    state: &AppState,
    principal: &VerifiedPrincipal,
    scope: &ScopeIds,
) -> Result<ProjectContext, ApiError> {
    let project_id = scope.require_project()?;
    let org_ctx = resolve_org(state, principal, scope).await?;
    state.resolver.attach_project(org_ctx, project_id).await
}
