use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project-level role. Ordered by privilege: MEMBER < ADMIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectRole {
    Member,
    Admin,
}

impl ProjectRole {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Member => 0,
            Self::Admin => 1,
        }
    }

    pub fn meets(&self, min: ProjectRole) -> bool {
        self.rank() >= min.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "MEMBER",
            Self::Admin => "ADMIN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MEMBER" => Some(Self::Member),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: i64,
    pub user_id: i64,
    pub role: ProjectRole,
    pub joined_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ProjectRole::Member, ProjectRole::Member, true)]
    #[case(ProjectRole::Member, ProjectRole::Admin, false)]
    #[case(ProjectRole::Admin, ProjectRole::Member, true)]
    #[case(ProjectRole::Admin, ProjectRole::Admin, true)]
    fn project_role_meets_is_rank_comparison(
        #[case] actual: ProjectRole,
        #[case] min: ProjectRole,
        #[case] expected: bool,
    ) {
        assert_eq!(actual.meets(min), expected);
    }
}
