use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::error::DbResult,
    models::{CreateUser, User},
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, input: CreateUser) -> DbResult<User>;
    async fn get_by_id(&self, id: i64) -> DbResult<Option<User>>;
    /// Resolve a self-hosted session token to its user, honoring expiry.
    async fn get_by_session(&self, token: &str, now: DateTime<Utc>) -> DbResult<Option<User>>;
    /// Create a session for self-hosted deployments.
    async fn create_session(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()>;
}
