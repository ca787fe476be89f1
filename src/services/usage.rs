//! Read-only usage aggregation over the append-only event log.
//!
//! Every query is org-scoped through [`UsageFilter`]; an unspecified date
//! range defaults to the trailing 30 days. Aggregates are derived on read
//! and never stored.

use std::collections::BTreeMap;

use std::sync::Arc;

use crate::{
    db::{
        DbPool,
        repos::{DateRange, OrgDailyRow, PageParams, UsageFilter},
    },
    error::ApiError,
    models::{
        DailyTotals, ModelDailyUsage, OrgDailyUsage, ProjectDailyBreakdown, ProjectDailyUsage,
        ProjectUsageDetails, ProjectUsageStats, PromptUsageStats, SourceDailyCount, UsageLogPage,
        UsageSource,
    },
};

const DEFAULT_RANGE_DAYS: i64 = 30;
const BREAKDOWN_LIMIT: i64 = 100;

pub struct UsageAggregator {
    db: Arc<DbPool>,
}

impl UsageAggregator {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    fn effective_range(range: Option<DateRange>) -> DateRange {
        range.unwrap_or_else(|| DateRange::trailing_days(DEFAULT_RANGE_DAYS))
    }

    /// One aggregate row for a project over the range.
    pub async fn project_summary(
        &self,
        org_id: i64,
        project_id: i64,
        range: Option<DateRange>,
    ) -> Result<ProjectUsageStats, ApiError> {
        let filter = UsageFilter::for_org(org_id)
            .project(project_id)
            .date_range(Self::effective_range(range));
        Ok(self.db.usage().summary(&filter).await?)
    }

    /// Prompt, model, and user breakdowns, each capped and sorted by
    /// request volume descending.
    pub async fn project_details(
        &self,
        org_id: i64,
        project_id: i64,
        range: Option<DateRange>,
    ) -> Result<ProjectUsageDetails, ApiError> {
        let filter = UsageFilter::for_org(org_id)
            .project(project_id)
            .date_range(Self::effective_range(range));

        let prompt_rows = self.db.usage().by_prompt(&filter, BREAKDOWN_LIMIT).await?;
        let models = self.db.usage().by_model(&filter, BREAKDOWN_LIMIT).await?;
        let users = self.db.usage().by_user(&filter, BREAKDOWN_LIMIT).await?;

        let prompts = prompt_rows
            .into_iter()
            .map(|row| {
                let total = row.request_count;
                let rate = |count: i64| {
                    if total > 0 {
                        count as f64 / total as f64
                    } else {
                        0.0
                    }
                };
                PromptUsageStats {
                    prompt_id: row.prompt_id,
                    request_count: row.request_count,
                    tokens_sum: row.tokens_sum,
                    cost_microcents: row.cost_microcents,
                    success_rate: rate(row.success_count),
                    error_rate: rate(row.error_count),
                    first_used_at: row.first_used_at,
                    last_used_at: row.last_used_at,
                }
            })
            .collect();

        Ok(ProjectUsageDetails {
            prompts,
            models,
            users,
        })
    }

    /// Org-wide daily stats: one record per date with events, carrying
    /// totals plus per-project, per-source, and per-model breakdowns.
    /// Dates without events are absent.
    pub async fn org_daily(
        &self,
        org_id: i64,
        project_id: Option<i64>,
        range: Option<DateRange>,
    ) -> Result<Vec<OrgDailyUsage>, ApiError> {
        let mut filter = UsageFilter::for_org(org_id).date_range(Self::effective_range(range));
        if let Some(project_id) = project_id {
            filter = filter.project(project_id);
        }

        let rows = self.db.usage().org_daily_rows(&filter).await?;
        Ok(reshape_org_daily(rows))
    }

    /// Dense daily series for one project: every calendar day of the range
    /// appears, zero-filled where the store has nothing.
    pub async fn project_daily(
        &self,
        org_id: i64,
        project_id: i64,
        range: Option<DateRange>,
    ) -> Result<Vec<ProjectDailyUsage>, ApiError> {
        let range = Self::effective_range(range);
        let filter = UsageFilter::for_org(org_id)
            .project(project_id)
            .date_range(range);

        let rows = self.db.usage().daily_totals(&filter).await?;
        let mut by_date: BTreeMap<_, _> = rows.into_iter().map(|r| (r.date, r)).collect();

        let mut series = Vec::new();
        let mut day = range.start;
        while day <= range.end {
            series.push(
                by_date
                    .remove(&day)
                    .unwrap_or_else(|| ProjectDailyUsage::zero(day)),
            );
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }
        Ok(series)
    }

    /// Paginated event listing, newest first, with an independently
    /// computed total for the same predicate.
    pub async fn logs(
        &self,
        filter: &UsageFilter,
        page: PageParams,
    ) -> Result<UsageLogPage, ApiError> {
        let entries = self.db.usage().list(filter, page).await?;
        let total = self.db.usage().count(filter).await?;
        Ok(UsageLogPage {
            entries,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }
}

/// Fold the flat grouped rows into one record per date. Rows arrive
/// date-ascending; BTreeMaps keep the breakdowns deterministic.
fn reshape_org_daily(rows: Vec<OrgDailyRow>) -> Vec<OrgDailyUsage> {
    struct DayAccumulator {
        totals: DailyTotals,
        projects: BTreeMap<i64, ProjectDailyBreakdown>,
        sources: BTreeMap<String, i64>,
        models: BTreeMap<(String, String), ModelDailyUsage>,
    }

    let mut days: BTreeMap<chrono::NaiveDate, DayAccumulator> = BTreeMap::new();

    for row in rows {
        let day = days.entry(row.date).or_insert_with(|| DayAccumulator {
            totals: DailyTotals::default(),
            projects: BTreeMap::new(),
            sources: BTreeMap::new(),
            models: BTreeMap::new(),
        });

        day.totals.request_count += row.request_count;
        day.totals.tokens_sum += row.tokens_sum;
        day.totals.cost_microcents += row.cost_microcents;

        let project = day
            .projects
            .entry(row.project_id)
            .or_insert(ProjectDailyBreakdown {
                project_id: row.project_id,
                request_count: 0,
                tokens_sum: 0,
            });
        project.request_count += row.request_count;
        project.tokens_sum += row.tokens_sum;

        *day.sources.entry(row.source.clone()).or_insert(0) += row.request_count;

        let model = day
            .models
            .entry((row.model.clone(), row.vendor.clone()))
            .or_insert(ModelDailyUsage {
                model: row.model,
                vendor: row.vendor,
                request_count: 0,
                tokens_sum: 0,
                cost_microcents: 0,
            });
        model.request_count += row.request_count;
        model.tokens_sum += row.tokens_sum;
        model.cost_microcents += row.cost_microcents;
    }

    days.into_iter()
        .map(|(date, acc)| OrgDailyUsage {
            date,
            totals: acc.totals,
            projects: acc.projects.into_values().collect(),
            sources: acc
                .sources
                .into_iter()
                .filter_map(|(source, request_count)| {
                    // The column is constrained to known values; anything
                    // else is skipped rather than crashing the read path.
                    let source = UsageSource::from_str(&source)?;
                    Some(SourceDailyCount {
                        source,
                        request_count,
                    })
                })
                .collect(),
            models: acc.models.into_values().collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use super::*;
    use crate::{
        db::tests::{memory_pool, sample_event_at},
        models::{UsageEvent, UsageLogLevel},
    };

    fn at_noon(date: NaiveDate) -> chrono::DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()))
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seeded() -> (Arc<DbPool>, i64, i64) {
        let db = Arc::new(memory_pool().await);
        let org = db.organizations().create("acme", 0).await.unwrap();
        let project = db.projects().create(org.id, "checkout").await.unwrap();
        (db, org.id, project.id)
    }

    #[tokio::test]
    async fn daily_series_is_gap_filled_over_the_full_range() {
        let (db, org_id, project_id) = seeded().await;

        // Events only on the first of three days.
        db.usage()
            .append(&sample_event_at(
                "req-1",
                org_id,
                project_id,
                at_noon(day(2024, 1, 1)),
            ))
            .await
            .unwrap();
        db.usage()
            .append(&sample_event_at(
                "req-2",
                org_id,
                project_id,
                at_noon(day(2024, 1, 1)),
            ))
            .await
            .unwrap();

        let aggregator = UsageAggregator::new(Arc::clone(&db));
        let range = DateRange {
            start: day(2024, 1, 1),
            end: day(2024, 1, 3),
        };
        let series = aggregator
            .project_daily(org_id, project_id, Some(range))
            .await
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, day(2024, 1, 1));
        assert_eq!(series[0].request_count, 2);
        assert_eq!(series[1].request_count, 0);
        assert_eq!(series[2].request_count, 0);
        assert_eq!(series[2].date, day(2024, 1, 3));
    }

    #[tokio::test]
    async fn details_compute_success_and_error_rates() {
        let (db, org_id, project_id) = seeded().await;
        let when = at_noon(day(2024, 2, 1));

        let mut ok = sample_event_at("req-ok", org_id, project_id, when);
        ok.log_level = UsageLogLevel::Success;
        let mut also_ok = sample_event_at("req-ok2", org_id, project_id, when);
        also_ok.log_level = UsageLogLevel::Success;
        let mut failed = sample_event_at("req-err", org_id, project_id, when);
        failed.log_level = UsageLogLevel::Error;
        let mut warned = sample_event_at("req-warn", org_id, project_id, when);
        warned.log_level = UsageLogLevel::Warn;

        for event in [&ok, &also_ok, &failed, &warned] {
            db.usage().append(event).await.unwrap();
        }

        let aggregator = UsageAggregator::new(Arc::clone(&db));
        let range = DateRange {
            start: day(2024, 2, 1),
            end: day(2024, 2, 1),
        };
        let details = aggregator
            .project_details(org_id, project_id, Some(range))
            .await
            .unwrap();

        assert_eq!(details.prompts.len(), 1);
        let prompt = &details.prompts[0];
        assert_eq!(prompt.request_count, 4);
        assert!((prompt.success_rate - 0.5).abs() < f64::EPSILON);
        assert!((prompt.error_rate - 0.25).abs() < f64::EPSILON);
        assert!(prompt.first_used_at.is_some());
    }

    #[tokio::test]
    async fn org_daily_reshapes_grouped_rows_per_date() {
        let (db, org_id, project_a) = seeded().await;
        let project_b = db.projects().create(org_id, "search").await.unwrap().id;

        let d1 = at_noon(day(2024, 3, 1));
        let d2 = at_noon(day(2024, 3, 2));

        let mut other_model: UsageEvent = sample_event_at("req-2", org_id, project_b, d1);
        other_model.model = "claude-sonnet".to_string();
        other_model.vendor = "anthropic".to_string();

        db.usage()
            .append(&sample_event_at("req-1", org_id, project_a, d1))
            .await
            .unwrap();
        db.usage().append(&other_model).await.unwrap();
        db.usage()
            .append(&sample_event_at("req-3", org_id, project_a, d2))
            .await
            .unwrap();

        let aggregator = UsageAggregator::new(Arc::clone(&db));
        let range = DateRange {
            start: day(2024, 3, 1),
            end: day(2024, 3, 2),
        };
        let daily = aggregator.org_daily(org_id, None, Some(range)).await.unwrap();

        assert_eq!(daily.len(), 2);
        let first = &daily[0];
        assert_eq!(first.date, day(2024, 3, 1));
        assert_eq!(first.totals.request_count, 2);
        assert_eq!(first.projects.len(), 2);
        assert_eq!(first.models.len(), 2);
        assert_eq!(first.sources.len(), 1);
        assert_eq!(first.sources[0].request_count, 2);

        let second = &daily[1];
        assert_eq!(second.totals.request_count, 1);
        assert_eq!(second.projects.len(), 1);
    }

    #[tokio::test]
    async fn logs_total_matches_independent_count() {
        let (db, org_id, project_id) = seeded().await;
        for i in 0..7 {
            db.usage()
                .append(&sample_event_at(
                    &format!("req-{i}"),
                    org_id,
                    project_id,
                    at_noon(day(2024, 4, 1)) + chrono::Duration::seconds(i),
                ))
                .await
                .unwrap();
        }

        let aggregator = UsageAggregator::new(Arc::clone(&db));
        let filter = UsageFilter::for_org(org_id).project(project_id);
        let page = aggregator
            .logs(
                &filter,
                PageParams {
                    page: 1,
                    page_size: 3,
                },
            )
            .await
            .unwrap();

        assert_eq!(page.entries.len(), 3);
        assert_eq!(page.total, 7);
        assert_eq!(page.entries[0].request_id, "req-6");

        // The second page picks up after the first and reports the same
        // total.
        let next = aggregator
            .logs(
                &filter,
                PageParams {
                    page: 2,
                    page_size: 3,
                },
            )
            .await
            .unwrap();

        assert_eq!(next.entries.len(), 3);
        assert_eq!(next.total, 7);
        assert_eq!(next.entries[0].request_id, "req-3");
        assert_eq!(next.entries[2].request_id, "req-1");
    }
}
