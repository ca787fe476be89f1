//! Destination for flushed usage event batches.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{db::DbPool, models::UsageEvent};

#[derive(Debug, Error)]
pub enum UsageSinkError {
    #[error("Database error: {0}")]
    Database(String),
}

/// A sink receives drained batches from the buffer worker. Implementations
/// report how many events were actually written; failures stay inside the
/// sink boundary and never reach the request path.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn write_batch(&self, events: &[UsageEvent]) -> Result<usize, UsageSinkError>;
}

/// Writes batches to the append-only usage event table.
pub struct DbSink {
    db: Arc<DbPool>,
}

impl DbSink {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsageSink for DbSink {
    async fn write_batch(&self, events: &[UsageEvent]) -> Result<usize, UsageSinkError> {
        self.db
            .usage()
            .append_batch(events)
            .await
            .map_err(|e| UsageSinkError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_name_their_origin() {
        let err = UsageSinkError::Database("disk I/O error".to_string());
        assert_eq!(err.to_string(), "Database error: disk I/O error");
    }
}
