//! End-to-end tests through the assembled router.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::{
    AppState,
    config::Config,
    db::{
        DbPool,
        tests::{memory_pool, seed_user},
    },
    executor::EchoExecutor,
    models::{OrgRole, ProjectRole, User},
    router,
    usage_buffer::{UsageBufferConfig, UsageLogBuffer},
};

async fn test_app() -> (Router, Arc<DbPool>, Arc<UsageLogBuffer>) {
    let db = Arc::new(memory_pool().await);
    let buffer = Arc::new(UsageLogBuffer::new(UsageBufferConfig::default()));
    let state = AppState::new(
        Arc::new(Config::default()),
        Arc::clone(&db),
        Arc::clone(&buffer),
        Arc::new(EchoExecutor),
    );
    (router(state), db, buffer)
}

fn claims_for(user: &User) -> String {
    format!(
        r#"{{"sub": "{}", "account_id": {}}}"#,
        user.auth_id.as_deref().unwrap_or_default(),
        user.id
    )
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let (app, _, _) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/user/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_works_without_scope_headers() {
    let (app, db, _) = test_app().await;
    let user = seed_user(&db, "alice@example.com", Some("idp|alice")).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/user/me")
                .header("x-verified-claims", claims_for(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["email"], "alice@example.com");
}

#[tokio::test]
async fn org_route_without_org_header_is_a_scope_error() {
    let (app, db, _) = test_app().await;
    let user = seed_user(&db, "alice@example.com", Some("idp|alice")).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/organization/members")
                .header("x-verified-claims", claims_for(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["message"], "orgID not found");
    assert_eq!(body["status"], "error");
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn member_removal_requires_owner_rank() {
    let (app, db, _) = test_app().await;
    let org = db.organizations().create("acme", 0).await.unwrap();
    let owner = seed_user(&db, "owner@example.com", Some("idp|owner")).await;
    let admin = seed_user(&db, "admin@example.com", Some("idp|admin")).await;
    let reader = seed_user(&db, "reader@example.com", Some("idp|reader")).await;

    for (user, role) in [
        (&owner, OrgRole::Owner),
        (&admin, OrgRole::Admin),
        (&reader, OrgRole::Reader),
    ] {
        db.organizations()
            .add_member(org.id, user.id, role)
            .await
            .unwrap();
    }

    let delete_as = |caller: &User| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/organization/members/{}", reader.id))
            .header("x-verified-claims", claims_for(caller))
            .header("org-id", org.id.to_string())
            .body(Body::empty())
            .unwrap()
    };

    // ADMIN ranks below OWNER.
    let response = app.clone().oneshot(delete_as(&admin)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.oneshot(delete_as(&owner)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        db.organizations()
            .get_membership(org.id, reader.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn run_prompt_debits_quota_and_buffers_one_event() {
    let (app, db, buffer) = test_app().await;
    let org = db.organizations().create("acme", 1000).await.unwrap();
    let user = seed_user(&db, "alice@example.com", Some("idp|alice")).await;
    let project = db.projects().create(org.id, "checkout").await.unwrap();

    db.organizations()
        .add_member(org.id, user.id, OrgRole::Reader)
        .await
        .unwrap();
    db.projects()
        .add_member(project.id, user.id, ProjectRole::Member)
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/project/prompts/5/run")
                .header("x-verified-claims", claims_for(&user))
                .header("org-id", org.id.to_string())
                .header("project-id", project.id.to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"input": "hello world"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["output"], "hello world");
    // Two tokens in, two out, ten microcents per token.
    assert_eq!(body["costMicrocents"], 40);
    assert_eq!(body["remainingBalanceMicrocents"], 960);

    let quota = db
        .organizations()
        .get_quota(org.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quota.balance_microcents, 960);

    // Exactly one event queued for the flush worker.
    assert_eq!(buffer.len(), 1);
}

#[tokio::test]
async fn run_prompt_fails_when_the_debit_cannot_be_applied() {
    use crate::executor::{ExecutionError, ExecutionOutput, ExecutionRequest, PromptExecutor};

    // Executes normally but yanks the quota row first, so scope resolution
    // succeeds and only the debit afterwards fails.
    struct QuotaRevokingExecutor {
        db: Arc<DbPool>,
        org_id: i64,
    }

    #[async_trait::async_trait]
    impl PromptExecutor for QuotaRevokingExecutor {
        async fn execute(
            &self,
            request: &ExecutionRequest,
        ) -> Result<ExecutionOutput, ExecutionError> {
            sqlx::query("DELETE FROM organization_quotas WHERE org_id = ?")
                .bind(self.org_id)
                .execute(self.db.pool())
                .await
                .unwrap();
            EchoExecutor.execute(request).await
        }
    }

    let db = Arc::new(memory_pool().await);
    let buffer = Arc::new(UsageLogBuffer::new(UsageBufferConfig::default()));
    let org = db.organizations().create("acme", 1000).await.unwrap();
    let user = seed_user(&db, "alice@example.com", Some("idp|alice")).await;
    let project = db.projects().create(org.id, "checkout").await.unwrap();

    db.organizations()
        .add_member(org.id, user.id, OrgRole::Reader)
        .await
        .unwrap();
    db.projects()
        .add_member(project.id, user.id, ProjectRole::Member)
        .await
        .unwrap();

    let state = AppState::new(
        Arc::new(Config::default()),
        Arc::clone(&db),
        Arc::clone(&buffer),
        Arc::new(QuotaRevokingExecutor {
            db: Arc::clone(&db),
            org_id: org.id,
        }),
    );

    let response = router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/project/prompts/5/run")
                .header("x-verified-claims", claims_for(&user))
                .header("org-id", org.id.to_string())
                .header("project-id", project.id.to_string())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"input": "hello world"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The attempt is still recorded even though the request failed.
    assert_eq!(buffer.len(), 1);
}

#[tokio::test]
async fn project_usage_rejects_non_members() {
    let (app, db, _) = test_app().await;
    let org = db.organizations().create("acme", 0).await.unwrap();
    let user = seed_user(&db, "alice@example.com", Some("idp|alice")).await;
    let project = db.projects().create(org.id, "checkout").await.unwrap();

    db.organizations()
        .add_member(org.id, user.id, OrgRole::Admin)
        .await
        .unwrap();
    // No project membership.

    let response = app
        .oneshot(
            Request::builder()
                .uri("/project/usage")
                .header("x-verified-claims", claims_for(&user))
                .header("org-id", org.id.to_string())
                .header("project-id", project.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_is_public() {
    let (app, _, _) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
