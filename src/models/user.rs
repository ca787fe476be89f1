use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// External identifier from the identity provider.
    /// None on self-hosted deployments, which have no external IdP.
    pub auth_id: Option<String>,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub auth_id: Option<String>,
    pub email: String,
    pub name: Option<String>,
}
