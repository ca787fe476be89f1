//! Soft monetary quota, denominated in microcents.
//!
//! A charge never blocks the request it accounts for and the balance never
//! goes below zero. The debit is read-subtract-clamp-write without any
//! locking; two concurrent charges against the same org can lose one
//! update. That window is accepted: the quota is advisory spend tracking,
//! not a hard billing ledger.

use std::sync::Arc;

use crate::{db::DbPool, error::ApiError};

#[derive(Clone)]
pub struct QuotaLedger {
    db: Arc<DbPool>,
}

impl QuotaLedger {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Debit `amount_microcents` from the org balance, clamping at zero.
    /// Returns the post-charge balance.
    pub async fn charge(&self, org_id: i64, amount_microcents: i64) -> Result<i64, ApiError> {
        let quota = self
            .db
            .organizations()
            .get_quota(org_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(org_id, "charge against an org with no quota row");
                ApiError::Internal(format!("organization {org_id} has no quota row"))
            })?;

        let remaining = (quota.balance_microcents - amount_microcents).max(0);
        self.db
            .organizations()
            .set_quota_balance(org_id, remaining)
            .await?;

        tracing::debug!(org_id, amount_microcents, remaining, "quota charged");
        Ok(remaining)
    }

    pub async fn balance(&self, org_id: i64) -> Result<Option<i64>, ApiError> {
        Ok(self
            .db
            .organizations()
            .get_quota(org_id)
            .await?
            .map(|q| q.balance_microcents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_pool;

    #[tokio::test]
    async fn charge_subtracts_then_clamps_at_zero() {
        let db = Arc::new(memory_pool().await);
        let org = db.organizations().create("acme", 5).await.unwrap();
        let ledger = QuotaLedger::new(Arc::clone(&db));

        assert_eq!(ledger.charge(org.id, 3).await.unwrap(), 2);
        assert_eq!(ledger.charge(org.id, 3).await.unwrap(), 0);
        assert_eq!(ledger.balance(org.id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn zero_charge_leaves_balance_untouched() {
        let db = Arc::new(memory_pool().await);
        let org = db.organizations().create("acme", 100).await.unwrap();
        let ledger = QuotaLedger::new(Arc::clone(&db));

        assert_eq!(ledger.charge(org.id, 0).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn charge_against_unknown_org_is_internal() {
        let db = Arc::new(memory_pool().await);
        let ledger = QuotaLedger::new(db);

        let err = ledger.charge(404, 10).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
