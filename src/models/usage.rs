use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where an execution attempt originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageSource {
    Ui,
    Api,
    Testcase,
}

impl UsageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Api => "api",
            Self::Testcase => "testcase",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ui" => Some(Self::Ui),
            "api" => Some(Self::Api),
            "testcase" => Some(Self::Testcase),
            _ => None,
        }
    }
}

impl fmt::Display for UsageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome classification of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageLogLevel {
    Success,
    Info,
    Warn,
    Error,
}

impl UsageLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "INFO" => Some(Self::Info),
            "WARN" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One immutable usage record per prompt execution attempt, success or
/// failure. Never updated or deleted once written.
///
/// Costs are stored in microcents (1/1,000,000 of a dollar).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Unique request identifier for idempotency (duplicate appends are skipped)
    pub request_id: String,
    /// Captured at event construction, millisecond precision
    pub recorded_at: DateTime<Utc>,
    pub source: UsageSource,
    pub log_level: UsageLogLevel,
    /// Categorical reason code (e.g. "completion", "provider_error")
    pub log_type: String,
    pub org_id: i64,
    pub project_id: i64,
    pub prompt_id: i64,
    pub user_id: Option<i64>,
    pub api_key_id: Option<i64>,
    pub testcase_id: Option<i64>,
    pub vendor: String,
    pub model: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
    pub response_ms: i64,
    /// Prompt payload sent to the provider
    pub input: String,
    /// Provider response payload (or error text)
    pub output: String,
    pub memory_key: Option<String>,
}

// ==================== Derived views (computed on read) ====================

/// Single aggregate row over the filtered event set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectUsageStats {
    pub request_count: i64,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub tokens_sum: i64,
    pub avg_response_ms: f64,
    pub cost_microcents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptUsageStats {
    pub prompt_id: i64,
    pub request_count: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
    /// successes / total over the range
    pub success_rate: f64,
    /// errors / total over the range
    pub error_rate: f64,
    pub first_used_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelUsageStats {
    pub model: String,
    pub vendor: String,
    pub request_count: i64,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
}

/// Per-user activity. Rows with no user id are excluded.
#[derive(Debug, Clone, Serialize)]
pub struct UserActivityStats {
    pub user_id: i64,
    pub request_count: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Prompt/model/user breakdowns for one project and range.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectUsageDetails {
    pub prompts: Vec<PromptUsageStats>,
    pub models: Vec<ModelUsageStats>,
    pub users: Vec<UserActivityStats>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyTotals {
    pub request_count: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDailyBreakdown {
    pub project_id: i64,
    pub request_count: i64,
    pub tokens_sum: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceDailyCount {
    pub source: UsageSource,
    pub request_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelDailyUsage {
    pub model: String,
    pub vendor: String,
    pub request_count: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
}

/// One record per date with events. Dates with zero events are absent;
/// callers needing a dense series synthesize them.
#[derive(Debug, Clone, Serialize)]
pub struct OrgDailyUsage {
    pub date: NaiveDate,
    pub totals: DailyTotals,
    pub projects: Vec<ProjectDailyBreakdown>,
    pub sources: Vec<SourceDailyCount>,
    pub models: Vec<ModelDailyUsage>,
}

/// One record per calendar day, gap-filled with zero values by the
/// aggregator so charts always see a dense, contiguous series.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDailyUsage {
    pub date: NaiveDate,
    pub request_count: i64,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub tokens_sum: i64,
    pub cost_microcents: i64,
}

impl ProjectDailyUsage {
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            date,
            request_count: 0,
            tokens_in: 0,
            tokens_out: 0,
            tokens_sum: 0,
            cost_microcents: 0,
        }
    }
}

/// Paginated usage listing with an independently computed total.
#[derive(Debug, Clone, Serialize)]
pub struct UsageLogPage {
    pub entries: Vec<UsageEvent>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}
