use crate::{
    db::error::{DbError, DbResult},
    models::{OrgRole, ProjectRole},
};

/// Parse an org role string from the database, returning a DbError on failure
pub fn parse_org_role(s: &str) -> DbResult<OrgRole> {
    OrgRole::from_str(s)
        .ok_or_else(|| DbError::Internal(format!("Invalid org role in database: {s}")))
}

/// Parse a project role string from the database, returning a DbError on failure
pub fn parse_project_role(s: &str) -> DbResult<ProjectRole> {
    ProjectRole::from_str(s)
        .ok_or_else(|| DbError::Internal(format!("Invalid project role in database: {s}")))
}

/// True when the error is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}
