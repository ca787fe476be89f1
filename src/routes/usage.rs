use axum::{
    Json,
    extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    AppState,
    auth::VerifiedPrincipal,
    db::repos::{DateRange, PageParams, UsageFilter},
    error::ApiError,
    middleware::ScopeIds,
    models::{
        OrgDailyUsage, OrgRole, ProjectDailyUsage, ProjectRole, ProjectUsageDetails,
        ProjectUsageStats, UsageLogLevel, UsageLogPage, UsageSource,
    },
    routes::{resolve_org, resolve_project},
    services::UsageAggregator,
};

const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUsageQuery {
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
    project_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
}

/// Both bounds or neither; a half-open range is a client error.
fn parse_range(
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
) -> Result<Option<DateRange>, ApiError> {
    match (from_date, to_date) {
        (Some(start), Some(end)) if start <= end => Ok(Some(DateRange { start, end })),
        (Some(_), Some(_)) => Err(ApiError::BadRequest(
            "fromDate must not be after toDate".to_string(),
        )),
        (None, None) => Ok(None),
        _ => Err(ApiError::BadRequest(
            "fromDate and toDate must be provided together".to_string(),
        )),
    }
}

/// Org-wide daily usage, reshaped per date. Org READER or higher.
pub async fn org_usage(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Query(query): Query<OrgUsageQuery>,
) -> Result<Json<Vec<OrgDailyUsage>>, ApiError> {
    let org_ctx = resolve_org(&state, &principal, &scope).await?;
    org_ctx.require_min_role(OrgRole::Reader)?;

    let range = parse_range(query.from_date, query.to_date)?;
    let daily = UsageAggregator::new(state.db.clone())
        .org_daily(org_ctx.org().id, query.project_id, range)
        .await?;
    Ok(Json(daily))
}

/// Project summary stats. Project MEMBER or higher.
pub async fn project_usage(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ProjectUsageStats>, ApiError> {
    let ctx = resolve_project(&state, &principal, &scope).await?;
    ctx.require_min_role(ProjectRole::Member)?;

    let range = parse_range(query.from_date, query.to_date)?;
    let stats = UsageAggregator::new(state.db.clone())
        .project_summary(ctx.org().org().id, ctx.project().id, range)
        .await?;
    Ok(Json(stats))
}

/// Prompt/model/user breakdowns for the project.
pub async fn project_usage_details(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ProjectUsageDetails>, ApiError> {
    let ctx = resolve_project(&state, &principal, &scope).await?;
    ctx.require_min_role(ProjectRole::Member)?;

    let range = parse_range(query.from_date, query.to_date)?;
    let details = UsageAggregator::new(state.db.clone())
        .project_details(ctx.org().org().id, ctx.project().id, range)
        .await?;
    Ok(Json(details))
}

/// Gap-filled daily series for the project.
pub async fn project_usage_daily(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<ProjectDailyUsage>>, ApiError> {
    let ctx = resolve_project(&state, &principal, &scope).await?;
    ctx.require_min_role(ProjectRole::Member)?;

    let range = parse_range(query.from_date, query.to_date)?;
    let series = UsageAggregator::new(state.db.clone())
        .project_daily(ctx.org().org().id, ctx.project().id, range)
        .await?;
    Ok(Json(series))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    prompt_id: Option<i64>,
    source: Option<String>,
    log_level: Option<String>,
    search: Option<String>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
}

/// Paginated event log for the project, newest first.
pub async fn project_logs(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Query(query): Query<LogsQuery>,
) -> Result<Json<UsageLogPage>, ApiError> {
    let ctx = resolve_project(&state, &principal, &scope).await?;
    ctx.require_min_role(ProjectRole::Member)?;

    let page = PageParams {
        page: query.page.unwrap_or(1).max(1),
        page_size: query
            .page_size
            .unwrap_or(PageParams::default().page_size)
            .clamp(1, MAX_PAGE_SIZE),
    };

    let mut filter = UsageFilter::for_org(ctx.org().org().id).project(ctx.project().id);
    if let Some(prompt_id) = query.prompt_id {
        filter = filter.prompt(prompt_id);
    }
    if let Some(ref raw) = query.source {
        let source = UsageSource::from_str(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown source '{raw}'")))?;
        filter = filter.source(source);
    }
    if let Some(ref raw) = query.log_level {
        let level = UsageLogLevel::from_str(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown log level '{raw}'")))?;
        filter = filter.log_level(level);
    }
    if let Some(search) = query.search {
        filter = filter.search(search);
    }
    if let Some(range) = parse_range(query.from_date, query.to_date)? {
        filter = filter.date_range(range);
    }

    let logs = UsageAggregator::new(state.db.clone())
        .logs(&filter, page)
        .await?;
    Ok(Json(logs))
}
