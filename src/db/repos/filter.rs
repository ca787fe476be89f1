//! Parameterized predicate construction over the usage event log.
//!
//! Filter values originate from end-user-controlled query parameters, so
//! every value is attached with `push_bind` and never written into the
//! query text. An empty filter matches every row of the organization,
//! never "no rows" and never other organizations.

use chrono::{Days, NaiveDate, NaiveTime};
use sqlx::{QueryBuilder, Sqlite};

use super::DateRange;
use crate::models::{UsageLogLevel, UsageSource};

#[derive(Debug, Clone)]
pub struct UsageFilter {
    org_id: i64,
    project_id: Option<i64>,
    project_ids: Option<Vec<i64>>,
    prompt_id: Option<i64>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
    source: Option<UsageSource>,
    log_level: Option<UsageLogLevel>,
    search: Option<String>,
}

impl UsageFilter {
    /// Start a filter scoped to one organization. The org scope is the only
    /// mandatory component.
    pub fn for_org(org_id: i64) -> Self {
        Self {
            org_id,
            project_id: None,
            project_ids: None,
            prompt_id: None,
            from_date: None,
            to_date: None,
            source: None,
            log_level: None,
            search: None,
        }
    }

    pub fn project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn projects(mut self, project_ids: Vec<i64>) -> Self {
        self.project_ids = Some(project_ids);
        self
    }

    pub fn prompt(mut self, prompt_id: i64) -> Self {
        self.prompt_id = Some(prompt_id);
        self
    }

    /// Inclusive start-of-day / end-of-day bounds.
    pub fn date_range(mut self, range: DateRange) -> Self {
        self.from_date = Some(range.start);
        self.to_date = Some(range.end);
        self
    }

    pub fn source(mut self, source: UsageSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn log_level(mut self, level: UsageLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Case-insensitive free-text match against both payload fields.
    pub fn search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    /// Append the WHERE predicate (without the `WHERE` keyword) to `qb`.
    /// All values go through `push_bind`.
    pub fn push_predicate(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push("org_id = ").push_bind(self.org_id);

        if let Some(project_id) = self.project_id {
            qb.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(ref ids) = self.project_ids {
            qb.push(" AND project_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            qb.push(")");
        }
        if let Some(prompt_id) = self.prompt_id {
            qb.push(" AND prompt_id = ").push_bind(prompt_id);
        }
        if let Some(from) = self.from_date {
            let start = from.and_time(NaiveTime::MIN).and_utc();
            qb.push(" AND recorded_at >= ").push_bind(start);
        }
        if let Some(to) = self.to_date {
            // Inclusive end-of-day: strictly before the next day's midnight.
            let end = to
                .checked_add_days(Days::new(1))
                .unwrap_or(to)
                .and_time(NaiveTime::MIN)
                .and_utc();
            qb.push(" AND recorded_at < ").push_bind(end);
        }
        if let Some(source) = self.source {
            qb.push(" AND source = ").push_bind(source.as_str());
        }
        if let Some(level) = self.log_level {
            qb.push(" AND log_level = ").push_bind(level.as_str());
        }
        if let Some(ref needle) = self.search {
            // SQLite LIKE is case-insensitive for ASCII. The needle is
            // escaped so % and _ match literally.
            let pattern = format!("%{}%", escape_like(needle));
            qb.push(" AND (input LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR output LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
