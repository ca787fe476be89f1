//! Authentication layer: turns a request into a [`VerifiedPrincipal`].
//!
//! Hosted deployments sit behind a fronting verifier that checks token
//! signatures and passes the verified claims document in a trusted header;
//! this layer only reads that document. Self-hosted deployments resolve a
//! server-side session cookie against the sessions table. Signature
//! verification itself never happens here.

mod principal;

pub use principal::VerifiedPrincipal;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{
    config::{AuthConfig, AuthMode},
    error::ApiError,
    AppState,
};

/// Middleware establishing the principal for every protected route.
pub async fn attach_principal(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match state.config.auth.mode {
        AuthMode::Hosted => principal_from_claims(req.headers(), &state.config.auth)?,
        AuthMode::SelfHosted => {
            let token = session_token(req.headers(), &state.config.auth.session_cookie)
                .ok_or_else(|| ApiError::Unauthorized("missing session".to_string()))?;
            let user = state
                .db
                .users()
                .get_by_session(&token, Utc::now())
                .await?
                .ok_or_else(|| {
                    ApiError::Unauthorized("session expired or unknown".to_string())
                })?;
            VerifiedPrincipal {
                account_id: user.id,
                subject: None,
            }
        }
    };

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Parse the verified claims header into a principal.
fn principal_from_claims(
    headers: &HeaderMap,
    auth: &AuthConfig,
) -> Result<VerifiedPrincipal, ApiError> {
    let raw = headers
        .get(&auth.claims_header)
        .ok_or_else(|| ApiError::Unauthorized("missing verified claims".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed verified claims".to_string()))?;

    let claims: serde_json::Value = serde_json::from_str(raw)
        .map_err(|_| ApiError::Unauthorized("malformed verified claims".to_string()))?;

    // The account id claim may arrive as a JSON number or a decimal string.
    let account_id = match claims.get(&auth.account_id_claim) {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ApiError::Unauthorized("missing account id claim".to_string()))?;

    let subject = claims
        .get("sub")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    Ok(VerifiedPrincipal {
        account_id,
        subject,
    })
}

/// Extract the named session cookie from the Cookie header.
fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}
