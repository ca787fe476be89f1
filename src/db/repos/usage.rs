use async_trait::async_trait;
use chrono::NaiveDate;

use super::{PageParams, UsageFilter};
use crate::{
    db::error::DbResult,
    models::{ModelUsageStats, ProjectDailyUsage, ProjectUsageStats, UsageEvent, UserActivityStats},
};

/// Raw grouped row behind the prompt breakdown; rates are derived by the
/// aggregator.
#[derive(Debug, Clone)]
pub struct PromptUsageRow {
    pub prompt_id: i64,
    pub request_count: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub first_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Raw grouped row behind the org daily view, one per
/// (date, project, source, vendor, model) combination with events.
#[derive(Debug, Clone)]
pub struct OrgDailyRow {
    pub date: NaiveDate,
    pub project_id: i64,
    pub source: String,
    pub vendor: String,
    pub model: String,
    pub request_count: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
}

#[async_trait]
pub trait UsageEventRepo: Send + Sync {
    /// Append one immutable event. Duplicate request ids are skipped.
    async fn append(&self, event: &UsageEvent) -> DbResult<()>;

    /// Append a batch in one transaction. Returns the number inserted.
    async fn append_batch(&self, events: &[UsageEvent]) -> DbResult<usize>;

    /// Paginated listing ordered by recorded_at descending.
    async fn list(&self, filter: &UsageFilter, page: PageParams) -> DbResult<Vec<UsageEvent>>;

    /// Total row count for the same predicate, executed independently of
    /// the page fetch.
    async fn count(&self, filter: &UsageFilter) -> DbResult<i64>;

    /// Single aggregate row over the filtered set.
    async fn summary(&self, filter: &UsageFilter) -> DbResult<ProjectUsageStats>;

    /// Grouped by prompt, request volume descending, capped at `limit`.
    async fn by_prompt(&self, filter: &UsageFilter, limit: i64) -> DbResult<Vec<PromptUsageRow>>;

    /// Grouped by (model, vendor), request volume descending.
    async fn by_model(&self, filter: &UsageFilter, limit: i64) -> DbResult<Vec<ModelUsageStats>>;

    /// Grouped by user, excluding rows without a user id.
    async fn by_user(&self, filter: &UsageFilter, limit: i64) -> DbResult<Vec<UserActivityStats>>;

    /// One grouped query over (date, project, source, vendor, model).
    /// Dates with zero events do not appear.
    async fn org_daily_rows(&self, filter: &UsageFilter) -> DbResult<Vec<OrgDailyRow>>;

    /// Grouped by date only. Gap-filling is the aggregator's job.
    async fn daily_totals(&self, filter: &UsageFilter) -> DbResult<Vec<ProjectDailyUsage>>;
}
