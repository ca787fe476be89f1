//! The representative execution route: resolve scope, gate, execute,
//! debit quota, record usage, respond. Success and failure both emit
//! exactly one usage event; recording never fails the request.

use std::time::Instant;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    auth::VerifiedPrincipal,
    error::ApiError,
    executor::ExecutionRequest,
    middleware::ScopeIds,
    models::{ProjectRole, UsageEvent, UsageLogLevel, UsageSource},
    routes::resolve_project,
    tenant::ProjectContext,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RunPromptRequest {
    #[validate(length(min = 1, max = 100_000))]
    pub input: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPromptResponse {
    pub request_id: String,
    pub output: String,
    pub vendor: String,
    pub model: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_microcents: i64,
    pub response_ms: i64,
    pub remaining_balance_microcents: i64,
}

pub async fn run_prompt(
    State(state): State<AppState>,
    principal: VerifiedPrincipal,
    scope: ScopeIds,
    Path(prompt_id): Path<i64>,
    Json(body): Json<RunPromptRequest>,
) -> Result<Json<RunPromptResponse>, ApiError> {
    body.validate()?;

    let ctx = resolve_project(&state, &principal, &scope).await?;
    ctx.require_min_role(ProjectRole::Member)?;

    let request_id = Uuid::new_v4().to_string();
    let request = ExecutionRequest {
        prompt_id,
        input: body.input,
    };

    let started = Instant::now();
    let result = state.executor.execute(&request).await;
    let response_ms = started.elapsed().as_millis() as i64;

    match result {
        Ok(output) => {
            let org_id = ctx.org().org().id;

            // The system org's own traffic is not billed.
            let charge = if is_system_org(&state, org_id).await {
                Ok(ctx.org().quota().balance_microcents)
            } else {
                state.quota.charge(org_id, output.cost_microcents).await
            };

            // The execution already happened, so the event is recorded even
            // when the debit below fails.
            state.usage_buffer.push(build_event(
                &request_id,
                &ctx,
                prompt_id,
                UsageLogLevel::Success,
                "completion",
                &output.vendor,
                &output.model,
                output.tokens_in,
                output.tokens_out,
                output.cost_microcents,
                response_ms,
                &request.input,
                &output.output,
            ));

            let remaining = charge.map_err(|e| {
                tracing::error!(org_id, error = %e, "quota charge failed");
                e
            })?;

            Ok(Json(RunPromptResponse {
                request_id,
                output: output.output,
                vendor: output.vendor,
                model: output.model,
                tokens_in: output.tokens_in,
                tokens_out: output.tokens_out,
                cost_microcents: output.cost_microcents,
                response_ms,
                remaining_balance_microcents: remaining,
            }))
        }
        Err(e) => {
            // Failed attempts are recorded too, at zero cost.
            state.usage_buffer.push(build_event(
                &request_id,
                &ctx,
                prompt_id,
                UsageLogLevel::Error,
                "provider_error",
                &e.vendor,
                &e.model,
                0,
                0,
                0,
                response_ms,
                &request.input,
                &e.message,
            ));

            tracing::error!(request_id, error = %e, "prompt execution failed");
            Err(ApiError::Internal("prompt execution failed".to_string()))
        }
    }
}

async fn is_system_org(state: &AppState, org_id: i64) -> bool {
    match state.system_ids.get_or_load(&state.db).await {
        Ok(ids) => ids.org_id == org_id,
        Err(e) => {
            tracing::warn!(error = %e, "system tenant lookup failed, billing normally");
            false
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_event(
    request_id: &str,
    ctx: &ProjectContext,
    prompt_id: i64,
    log_level: UsageLogLevel,
    log_type: &str,
    vendor: &str,
    model: &str,
    tokens_in: i64,
    tokens_out: i64,
    cost_microcents: i64,
    response_ms: i64,
    input: &str,
    output: &str,
) -> UsageEvent {
    UsageEvent {
        request_id: request_id.to_string(),
        recorded_at: Utc::now(),
        source: UsageSource::Api,
        log_level,
        log_type: log_type.to_string(),
        org_id: ctx.org().org().id,
        project_id: ctx.project().id,
        prompt_id,
        user_id: Some(ctx.user().id),
        api_key_id: None,
        testcase_id: None,
        vendor: vendor.to_string(),
        model: model.to_string(),
        tokens_in,
        tokens_out,
        tokens_sum: tokens_in + tokens_out,
        cost_microcents,
        response_ms,
        input: input.to_string(),
        output: output.to_string(),
        memory_key: None,
    }
}
