use chrono::{DateTime, Duration, Utc};

use crate::{
    db::{
        DbError, DbPool,
        repos::{PageParams, UsageFilter},
    },
    models::{CreateUser, OrgRole, UsageEvent, UsageLogLevel, UsageSource, User},
};

/// In-memory pool with migrations applied. A single connection keeps every
/// query on the same memory database.
pub async fn memory_pool() -> DbPool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    let db = DbPool::from_sqlite(pool);
    db.run_migrations().await.expect("run migrations");
    db
}

pub async fn seed_user(db: &DbPool, email: &str, auth_id: Option<&str>) -> User {
    db.users()
        .create(CreateUser {
            auth_id: auth_id.map(str::to_string),
            email: email.to_string(),
            name: None,
        })
        .await
        .expect("create user")
}

pub fn sample_event(request_id: &str, org_id: i64, project_id: i64) -> UsageEvent {
    sample_event_at(request_id, org_id, project_id, Utc::now())
}

pub fn sample_event_at(
    request_id: &str,
    org_id: i64,
    project_id: i64,
    recorded_at: DateTime<Utc>,
) -> UsageEvent {
    UsageEvent {
        request_id: request_id.to_string(),
        recorded_at,
        source: UsageSource::Api,
        log_level: UsageLogLevel::Success,
        log_type: "completion".to_string(),
        org_id,
        project_id,
        prompt_id: 1,
        user_id: None,
        api_key_id: None,
        testcase_id: None,
        vendor: "openai".to_string(),
        model: "gpt-4o-mini".to_string(),
        tokens_in: 10,
        tokens_out: 20,
        tokens_sum: 30,
        cost_microcents: 1500,
        response_ms: 120,
        input: "hello".to_string(),
        output: "world".to_string(),
        memory_key: None,
    }
}

#[tokio::test]
async fn organization_create_provisions_quota_row() {
    let db = memory_pool().await;
    let org = db.organizations().create("acme", 5_000_000).await.unwrap();

    let quota = db
        .organizations()
        .get_quota(org.id)
        .await
        .unwrap()
        .expect("quota row exists");
    assert_eq!(quota.balance_microcents, 5_000_000);
}

#[tokio::test]
async fn duplicate_organization_name_is_a_conflict() {
    let db = memory_pool().await;
    db.organizations().create("acme", 0).await.unwrap();

    let err = db.organizations().create("acme", 0).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

#[tokio::test]
async fn set_quota_balance_on_unknown_org_is_not_found() {
    let db = memory_pool().await;
    let err = db
        .organizations()
        .set_quota_balance(9999, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[tokio::test]
async fn membership_role_lifecycle() {
    let db = memory_pool().await;
    let org = db.organizations().create("acme", 0).await.unwrap();
    let alice = seed_user(&db, "alice@example.com", None).await;
    let bob = seed_user(&db, "bob@example.com", None).await;

    db.organizations()
        .add_member(org.id, alice.id, OrgRole::Owner)
        .await
        .unwrap();
    db.organizations()
        .add_member(org.id, bob.id, OrgRole::Reader)
        .await
        .unwrap();

    let (member, _) = db
        .organizations()
        .get_membership(org.id, bob.id)
        .await
        .unwrap()
        .expect("bob is a member");
    assert_eq!(member.role, OrgRole::Reader);

    assert!(
        db.organizations()
            .update_member_role(org.id, bob.id, OrgRole::Admin)
            .await
            .unwrap()
    );
    assert_eq!(db.organizations().count_owners(org.id).await.unwrap(), 1);

    assert!(db.organizations().remove_member(org.id, bob.id).await.unwrap());
    assert!(
        db.organizations()
            .get_membership(org.id, bob.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn project_lookup_is_scoped_to_its_org() {
    let db = memory_pool().await;
    let org_a = db.organizations().create("org-a", 0).await.unwrap();
    let org_b = db.organizations().create("org-b", 0).await.unwrap();
    let project = db.projects().create(org_a.id, "checkout").await.unwrap();

    assert!(
        db.projects()
            .get_by_id_and_org(project.id, org_a.id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        db.projects()
            .get_by_id_and_org(project.id, org_b.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn expired_session_does_not_resolve_a_user() {
    let db = memory_pool().await;
    let user = seed_user(&db, "carol@example.com", None).await;
    let now = Utc::now();

    db.users()
        .create_session(user.id, "live-token", now + Duration::hours(1))
        .await
        .unwrap();
    db.users()
        .create_session(user.id, "dead-token", now - Duration::hours(1))
        .await
        .unwrap();

    assert!(
        db.users()
            .get_by_session("live-token", now)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        db.users()
            .get_by_session("dead-token", now)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn append_skips_duplicate_request_ids() {
    let db = memory_pool().await;
    let org = db.organizations().create("acme", 0).await.unwrap();
    let project = db.projects().create(org.id, "checkout").await.unwrap();

    let event = sample_event("req-1", org.id, project.id);
    db.usage().append(&event).await.unwrap();
    db.usage().append(&event).await.unwrap();

    let filter = UsageFilter::for_org(org.id);
    assert_eq!(db.usage().count(&filter).await.unwrap(), 1);
}

#[tokio::test]
async fn append_batch_reports_inserted_rows_only() {
    let db = memory_pool().await;
    let org = db.organizations().create("acme", 0).await.unwrap();
    let project = db.projects().create(org.id, "checkout").await.unwrap();

    db.usage()
        .append(&sample_event("req-1", org.id, project.id))
        .await
        .unwrap();

    let batch = vec![
        sample_event("req-1", org.id, project.id),
        sample_event("req-2", org.id, project.id),
        sample_event("req-3", org.id, project.id),
    ];
    let inserted = db.usage().append_batch(&batch).await.unwrap();
    assert_eq!(inserted, 2);
}

#[tokio::test]
async fn listing_is_scoped_to_the_filter_org() {
    let db = memory_pool().await;
    let org_a = db.organizations().create("org-a", 0).await.unwrap();
    let org_b = db.organizations().create("org-b", 0).await.unwrap();
    let project_a = db.projects().create(org_a.id, "p").await.unwrap();
    let project_b = db.projects().create(org_b.id, "p").await.unwrap();

    db.usage()
        .append(&sample_event("req-a", org_a.id, project_a.id))
        .await
        .unwrap();
    db.usage()
        .append(&sample_event("req-b", org_b.id, project_b.id))
        .await
        .unwrap();

    let entries = db
        .usage()
        .list(&UsageFilter::for_org(org_a.id), PageParams::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request_id, "req-a");
}

#[tokio::test]
async fn pagination_returns_page_sized_slices_with_full_total() {
    let db = memory_pool().await;
    let org = db.organizations().create("acme", 0).await.unwrap();
    let project = db.projects().create(org.id, "checkout").await.unwrap();

    let base = Utc::now();
    for i in 0..5 {
        db.usage()
            .append(&sample_event_at(
                &format!("req-{i}"),
                org.id,
                project.id,
                base + Duration::seconds(i),
            ))
            .await
            .unwrap();
    }

    let filter = UsageFilter::for_org(org.id);
    let usage = db.usage();
    let fetch = |page: i64| {
        usage.list(
            &filter,
            PageParams {
                page,
                page_size: 2,
            },
        )
    };

    let first = fetch(1).await.unwrap();
    assert_eq!(first.len(), 2);
    // Newest first.
    assert_eq!(first[0].request_id, "req-4");
    assert_eq!(first[1].request_id, "req-3");

    // Second page continues where the first left off, no overlap.
    let second = fetch(2).await.unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].request_id, "req-2");
    assert_eq!(second[1].request_id, "req-1");

    // Final partial page, then nothing.
    let third = fetch(3).await.unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].request_id, "req-0");
    assert!(fetch(4).await.unwrap().is_empty());

    assert_eq!(db.usage().count(&filter).await.unwrap(), 5);
}

#[tokio::test]
async fn summary_totals_over_the_filtered_set() {
    let db = memory_pool().await;
    let org = db.organizations().create("acme", 0).await.unwrap();
    let project = db.projects().create(org.id, "checkout").await.unwrap();

    db.usage()
        .append(&sample_event("req-1", org.id, project.id))
        .await
        .unwrap();
    db.usage()
        .append(&sample_event("req-2", org.id, project.id))
        .await
        .unwrap();

    let stats = db
        .usage()
        .summary(&UsageFilter::for_org(org.id))
        .await
        .unwrap();
    assert_eq!(stats.request_count, 2);
    assert_eq!(stats.tokens_sum, 60);
    assert_eq!(stats.cost_microcents, 3000);
    assert!((stats.avg_response_ms - 120.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn summary_of_empty_set_is_all_zeroes() {
    let db = memory_pool().await;
    let org = db.organizations().create("acme", 0).await.unwrap();

    let stats = db
        .usage()
        .summary(&UsageFilter::for_org(org.id))
        .await
        .unwrap();
    assert_eq!(stats.request_count, 0);
    assert_eq!(stats.tokens_sum, 0);
    assert_eq!(stats.avg_response_ms, 0.0);
}
