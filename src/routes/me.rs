use axum::{Json, extract::State};

use crate::{AppState, auth::VerifiedPrincipal, error::ApiError, models::User};

/// User-scoped: no org or project headers involved.
pub async fn me(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
) -> Result<Json<User>, ApiError> {
    let ctx = state.resolver.attach_user(&principal).await?;
    Ok(Json(ctx.user().clone()))
}
