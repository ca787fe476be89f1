mod filter;
mod organizations;
mod projects;
mod usage;
mod users;

use chrono::NaiveDate;
pub use filter::*;
pub use organizations::*;
pub use projects::*;
pub use usage::*;
pub use users::*;

/// Inclusive date range for usage queries.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Trailing window ending today (UTC), used when a range is unspecified.
    pub fn trailing_days(days: i64) -> Self {
        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Duration::days(days - 1);
        Self { start, end }
    }
}

/// Offset pagination for the usage listing endpoints.
///
/// The page fetch and the total count are two independent queries; they can
/// disagree slightly if writes land between them.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub page_size: i64,
}

impl PageParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.page_size
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}
