use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, sqlite::SqliteRow};

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{OrgDailyRow, PageParams, PromptUsageRow, UsageEventRepo, UsageFilter},
    },
    models::{
        ModelUsageStats, ProjectDailyUsage, ProjectUsageStats, UsageEvent, UsageLogLevel,
        UsageSource, UserActivityStats,
    },
};

const EVENT_COLUMNS: &str = "request_id, recorded_at, source, log_level, log_type, \
    org_id, project_id, prompt_id, user_id, api_key_id, testcase_id, \
    vendor, model, tokens_in, tokens_out, tokens_sum, cost_microcents, \
    response_ms, input, output, memory_key";

// 21 bind parameters per row; SQLite caps a statement at 999.
const MAX_EVENTS_PER_BATCH: usize = 40;

pub struct SqliteUsageEventRepo {
    pool: SqlitePool,
}

impl SqliteUsageEventRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_event(row: &SqliteRow) -> DbResult<UsageEvent> {
    let source: String = row.try_get("source")?;
    let log_level: String = row.try_get("log_level")?;
    Ok(UsageEvent {
        request_id: row.try_get("request_id")?,
        recorded_at: row.try_get("recorded_at")?,
        source: UsageSource::from_str(&source)
            .ok_or_else(|| DbError::Internal(format!("Invalid source in database: {source}")))?,
        log_level: UsageLogLevel::from_str(&log_level).ok_or_else(|| {
            DbError::Internal(format!("Invalid log level in database: {log_level}"))
        })?,
        log_type: row.try_get("log_type")?,
        org_id: row.try_get("org_id")?,
        project_id: row.try_get("project_id")?,
        prompt_id: row.try_get("prompt_id")?,
        user_id: row.try_get("user_id")?,
        api_key_id: row.try_get("api_key_id")?,
        testcase_id: row.try_get("testcase_id")?,
        vendor: row.try_get("vendor")?,
        model: row.try_get("model")?,
        tokens_in: row.try_get("tokens_in")?,
        tokens_out: row.try_get("tokens_out")?,
        tokens_sum: row.try_get("tokens_sum")?,
        cost_microcents: row.try_get("cost_microcents")?,
        response_ms: row.try_get("response_ms")?,
        input: row.try_get("input")?,
        output: row.try_get("output")?,
        memory_key: row.try_get("memory_key")?,
    })
}

fn parse_day(raw: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DbError::Internal(format!("Invalid day from store: {raw}: {e}")))
}

fn bind_event<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    event: &'q UsageEvent,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&event.request_id)
        .bind(event.recorded_at)
        .bind(event.source.as_str())
        .bind(event.log_level.as_str())
        .bind(&event.log_type)
        .bind(event.org_id)
        .bind(event.project_id)
        .bind(event.prompt_id)
        .bind(event.user_id)
        .bind(event.api_key_id)
        .bind(event.testcase_id)
        .bind(&event.vendor)
        .bind(&event.model)
        .bind(event.tokens_in)
        .bind(event.tokens_out)
        .bind(event.tokens_sum)
        .bind(event.cost_microcents)
        .bind(event.response_ms)
        .bind(&event.input)
        .bind(&event.output)
        .bind(&event.memory_key)
}

#[async_trait]
impl UsageEventRepo for SqliteUsageEventRepo {
    async fn append(&self, event: &UsageEvent) -> DbResult<()> {
        // INSERT OR IGNORE keeps appends idempotent on request_id.
        let query = sqlx::query(
            r#"
            INSERT OR IGNORE INTO usage_events (
                request_id, recorded_at, source, log_level, log_type,
                org_id, project_id, prompt_id, user_id, api_key_id, testcase_id,
                vendor, model, tokens_in, tokens_out, tokens_sum, cost_microcents,
                response_ms, input, output, memory_key
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        );
        bind_event(query, event).execute(&self.pool).await?;
        Ok(())
    }

    async fn append_batch(&self, events: &[UsageEvent]) -> DbResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0;
        let mut tx = self.pool.begin().await?;

        for chunk in events.chunks(MAX_EVENTS_PER_BATCH) {
            let placeholders: Vec<&str> = chunk
                .iter()
                .map(|_| "(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")
                .collect();

            let sql = format!(
                r#"
                INSERT OR IGNORE INTO usage_events (
                    request_id, recorded_at, source, log_level, log_type,
                    org_id, project_id, prompt_id, user_id, api_key_id, testcase_id,
                    vendor, model, tokens_in, tokens_out, tokens_sum, cost_microcents,
                    response_ms, input, output, memory_key
                )
                VALUES {}
                "#,
                placeholders.join(", ")
            );

            let mut query = sqlx::query(&sql);
            for event in chunk {
                query = bind_event(query, event);
            }

            let result = query.execute(&mut *tx).await?;
            total_inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    async fn list(&self, filter: &UsageFilter, page: PageParams) -> DbResult<Vec<UsageEvent>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM usage_events WHERE "
        ));
        filter.push_predicate(&mut qb);
        qb.push(" ORDER BY recorded_at DESC LIMIT ")
            .push_bind(page.page_size)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_event).collect()
    }

    async fn count(&self, filter: &UsageFilter) -> DbResult<i64> {
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM usage_events WHERE ");
        filter.push_predicate(&mut qb);

        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(row.try_get("total")?)
    }

    async fn summary(&self, filter: &UsageFilter) -> DbResult<ProjectUsageStats> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT COUNT(*) AS request_count,
                   COALESCE(SUM(tokens_in), 0) AS tokens_in,
                   COALESCE(SUM(tokens_out), 0) AS tokens_out,
                   COALESCE(SUM(tokens_sum), 0) AS tokens_sum,
                   COALESCE(AVG(response_ms), 0.0) AS avg_response_ms,
                   COALESCE(SUM(cost_microcents), 0) AS cost_microcents
            FROM usage_events WHERE "#,
        );
        filter.push_predicate(&mut qb);

        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(ProjectUsageStats {
            request_count: row.try_get("request_count")?,
            tokens_in: row.try_get("tokens_in")?,
            tokens_out: row.try_get("tokens_out")?,
            tokens_sum: row.try_get("tokens_sum")?,
            avg_response_ms: row.try_get("avg_response_ms")?,
            cost_microcents: row.try_get("cost_microcents")?,
        })
    }

    async fn by_prompt(&self, filter: &UsageFilter, limit: i64) -> DbResult<Vec<PromptUsageRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT prompt_id,
                   COUNT(*) AS request_count,
                   COALESCE(SUM(tokens_sum), 0) AS tokens_sum,
                   COALESCE(SUM(cost_microcents), 0) AS cost_microcents,
                   COALESCE(SUM(CASE WHEN log_level = 'SUCCESS' THEN 1 ELSE 0 END), 0) AS success_count,
                   COALESCE(SUM(CASE WHEN log_level = 'ERROR' THEN 1 ELSE 0 END), 0) AS error_count,
                   MIN(recorded_at) AS first_used_at,
                   MAX(recorded_at) AS last_used_at
            FROM usage_events WHERE "#,
        );
        filter.push_predicate(&mut qb);
        qb.push(" GROUP BY prompt_id ORDER BY request_count DESC LIMIT ")
            .push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(PromptUsageRow {
                    prompt_id: row.try_get("prompt_id")?,
                    request_count: row.try_get("request_count")?,
                    tokens_sum: row.try_get("tokens_sum")?,
                    cost_microcents: row.try_get("cost_microcents")?,
                    success_count: row.try_get("success_count")?,
                    error_count: row.try_get("error_count")?,
                    first_used_at: row.try_get("first_used_at")?,
                    last_used_at: row.try_get("last_used_at")?,
                })
            })
            .collect()
    }

    async fn by_model(&self, filter: &UsageFilter, limit: i64) -> DbResult<Vec<ModelUsageStats>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT model, vendor,
                   COUNT(*) AS request_count,
                   COALESCE(SUM(tokens_in), 0) AS tokens_in,
                   COALESCE(SUM(tokens_out), 0) AS tokens_out,
                   COALESCE(SUM(tokens_sum), 0) AS tokens_sum,
                   COALESCE(SUM(cost_microcents), 0) AS cost_microcents
            FROM usage_events WHERE "#,
        );
        filter.push_predicate(&mut qb);
        qb.push(" GROUP BY model, vendor ORDER BY request_count DESC LIMIT ")
            .push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(ModelUsageStats {
                    model: row.try_get("model")?,
                    vendor: row.try_get("vendor")?,
                    request_count: row.try_get("request_count")?,
                    tokens_in: row.try_get("tokens_in")?,
                    tokens_out: row.try_get("tokens_out")?,
                    tokens_sum: row.try_get("tokens_sum")?,
                    cost_microcents: row.try_get("cost_microcents")?,
                })
            })
            .collect()
    }

    async fn by_user(&self, filter: &UsageFilter, limit: i64) -> DbResult<Vec<UserActivityStats>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT user_id,
                   COUNT(*) AS request_count,
                   COALESCE(SUM(tokens_sum), 0) AS tokens_sum,
                   COALESCE(SUM(cost_microcents), 0) AS cost_microcents,
                   MAX(recorded_at) AS last_active_at
            FROM usage_events WHERE "#,
        );
        filter.push_predicate(&mut qb);
        qb.push(" AND user_id IS NOT NULL GROUP BY user_id ORDER BY request_count DESC LIMIT ")
            .push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(UserActivityStats {
                    user_id: row.try_get("user_id")?,
                    request_count: row.try_get("request_count")?,
                    tokens_sum: row.try_get("tokens_sum")?,
                    cost_microcents: row.try_get("cost_microcents")?,
                    last_active_at: row.try_get("last_active_at")?,
                })
            })
            .collect()
    }

    async fn org_daily_rows(&self, filter: &UsageFilter) -> DbResult<Vec<OrgDailyRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT date(recorded_at) AS day, project_id, source, vendor, model,
                   COUNT(*) AS request_count,
                   COALESCE(SUM(tokens_sum), 0) AS tokens_sum,
                   COALESCE(SUM(cost_microcents), 0) AS cost_microcents
            FROM usage_events WHERE "#,
        );
        filter.push_predicate(&mut qb);
        qb.push(" GROUP BY day, project_id, source, vendor, model ORDER BY day ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let day: String = row.try_get("day")?;
                Ok(OrgDailyRow {
                    date: parse_day(&day)?,
                    project_id: row.try_get("project_id")?,
                    source: row.try_get("source")?,
                    vendor: row.try_get("vendor")?,
                    model: row.try_get("model")?,
                    request_count: row.try_get("request_count")?,
                    tokens_sum: row.try_get("tokens_sum")?,
                    cost_microcents: row.try_get("cost_microcents")?,
                })
            })
            .collect()
    }

    async fn daily_totals(&self, filter: &UsageFilter) -> DbResult<Vec<ProjectDailyUsage>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT date(recorded_at) AS day,
                   COUNT(*) AS request_count,
                   COALESCE(SUM(tokens_in), 0) AS tokens_in,
                   COALESCE(SUM(tokens_out), 0) AS tokens_out,
                   COALESCE(SUM(tokens_sum), 0) AS tokens_sum,
                   COALESCE(SUM(cost_microcents), 0) AS cost_microcents
            FROM usage_events WHERE "#,
        );
        filter.push_predicate(&mut qb);
        qb.push(" GROUP BY day ORDER BY day ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let day: String = row.try_get("day")?;
                Ok(ProjectDailyUsage {
                    date: parse_day(&day)?,
                    request_count: row.try_get("request_count")?,
                    tokens_in: row.try_get("tokens_in")?,
                    tokens_out: row.try_get("tokens_out")?,
                    tokens_sum: row.try_get("tokens_sum")?,
                    cost_microcents: row.try_get("cost_microcents")?,
                })
            })
            .collect()
    }
}
