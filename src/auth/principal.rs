use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Identity established by the authentication layer, before any tenant
/// resolution has happened.
///
/// `account_id` is the numeric internal account identifier. `subject` is
/// the external identity-provider subject, present only in hosted mode;
/// self-hosted sessions resolve straight to an account id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPrincipal {
    pub account_id: i64,
    pub subject: Option<String>,
}

impl<S> FromRequestParts<S> for VerifiedPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedPrincipal>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}
