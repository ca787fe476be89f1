use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organization-level role. Ordered by privilege: READER < ADMIN < OWNER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    Reader,
    Admin,
    Owner,
}

impl OrgRole {
    /// Integer rank used for "at least this privileged" checks.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Reader => 0,
            Self::Admin => 1,
            Self::Owner => 2,
        }
    }

    /// True when this role is at least as privileged as `min`.
    pub fn meets(&self, min: OrgRole) -> bool {
        self.rank() >= min.rank()
    }

    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "READER",
            Self::Admin => "ADMIN",
            Self::Owner => "OWNER",
        }
    }

    /// Parse from database string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "READER" => Some(Self::Reader),
            "ADMIN" => Some(Self::Admin),
            "OWNER" => Some(Self::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One quota row per organization, created atomically with it.
///
/// Balance is in microcents (1/1,000,000 of a dollar) and never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationQuota {
    pub org_id: i64,
    pub balance_microcents: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub org_id: i64,
    pub user_id: i64,
    pub role: OrgRole,
    pub joined_at: DateTime<Utc>,
}
