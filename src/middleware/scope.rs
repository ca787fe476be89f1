//! Tenant scope headers.
//!
//! Org and project ids travel as request headers rather than path segments
//! so every route shares one resolution path. Routes under the `/user`
//! prefix are user-scoped and carry neither header.

use axum::{extract::FromRequestParts, http::HeaderMap, http::request::Parts};

use crate::error::ApiError;

pub const ORG_ID_HEADER: &str = "org-id";
pub const PROJECT_ID_HEADER: &str = "project-id";

/// True when the request path is under the `/user` prefix.
pub fn is_user_scoped(path: &str) -> bool {
    path.trim_start_matches('/').split('/').next() == Some("user")
}

/// Scope ids parsed from the request headers. Absence is legal at parse
/// time; requiring a missing scope is the route's decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeIds {
    pub org_id: Option<i64>,
    pub project_id: Option<i64>,
}

impl ScopeIds {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        Ok(Self {
            org_id: parse_id_header(headers, ORG_ID_HEADER)?,
            project_id: parse_id_header(headers, PROJECT_ID_HEADER)?,
        })
    }

    pub fn require_org(&self) -> Result<i64, ApiError> {
        self.org_id
            .ok_or_else(|| ApiError::BadRequest("orgID not found".to_string()))
    }

    pub fn require_project(&self) -> Result<i64, ApiError> {
        self.project_id
            .ok_or_else(|| ApiError::BadRequest("projID not found".to_string()))
    }
}

impl<S> FromRequestParts<S> for ScopeIds
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // User-scoped routes carry no tenancy headers.
        if is_user_scoped(parts.uri.path()) {
            return Ok(Self::default());
        }
        Self::from_headers(&parts.headers)
    }
}

fn parse_id_header(headers: &HeaderMap, name: &str) -> Result<Option<i64>, ApiError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("invalid {name} header")))?;
    let id = raw
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("invalid {name} header")))?;
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn user_prefix_detection() {
        assert!(is_user_scoped("/user/me"));
        assert!(is_user_scoped("/user"));
        assert!(!is_user_scoped("/organization/usage"));
        assert!(!is_user_scoped("/project/logs"));
    }

    #[test]
    fn parses_both_scope_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ORG_ID_HEADER, HeaderValue::from_static("7"));
        headers.insert(PROJECT_ID_HEADER, HeaderValue::from_static("12"));

        let scope = ScopeIds::from_headers(&headers).unwrap();
        assert_eq!(scope.require_org().unwrap(), 7);
        assert_eq!(scope.require_project().unwrap(), 12);
    }

    #[test]
    fn missing_headers_surface_as_scope_errors() {
        let scope = ScopeIds::from_headers(&HeaderMap::new()).unwrap();
        let org_err = scope.require_org().unwrap_err();
        assert!(matches!(org_err, ApiError::BadRequest(ref m) if m == "orgID not found"));
        let proj_err = scope.require_project().unwrap_err();
        assert!(matches!(proj_err, ApiError::BadRequest(ref m) if m == "projID not found"));
    }

    #[test]
    fn malformed_id_is_a_bad_request() {
        let mut headers = HeaderMap::new();
        headers.insert(ORG_ID_HEADER, HeaderValue::from_static("not-a-number"));
        assert!(matches!(
            ScopeIds::from_headers(&headers),
            Err(ApiError::BadRequest(_))
        ));
    }
}
