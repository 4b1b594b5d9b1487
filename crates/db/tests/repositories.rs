//! Repository tests against a live PostgreSQL. Run with
//! `DATABASE_URL=... cargo test -p syncbridge-db -- --ignored`.

use sqlx::PgPool;
use syncbridge_db::models::status::{BulkOperationStatus, SyncJobStatus};
use syncbridge_db::models::sync_job::CreateSyncJob;
use syncbridge_db::repositories::{CanonicalRecordRepo, SyncJobRepo, SyncQueueRepo};

async fn seed_integration(pool: &PgPool, tenant_id: i64) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO integrations (tenant_id, system, name) VALUES ($1, 'netsuite', 'ERP') RETURNING id",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

fn new_job(tenant_id: i64, integration_id: i64) -> CreateSyncJob {
    CreateSyncJob {
        tenant_id,
        integration_id,
        job_type: "full".into(),
        entity_types: vec!["products".into()],
        sync_mode: "pull".into(),
        batch_size: 100,
        priority: "medium".into(),
        created_by: 1,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn lookup_tables_seeded(pool: PgPool) {
    syncbridge_db::health_check(&pool).await.unwrap();
    for table in ["sync_job_statuses", "bulk_operation_statuses"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(count.0 > 0, "{table} should have seed data");
    }
    let (name,): (String,) =
        sqlx::query_as("SELECT name FROM bulk_operation_statuses WHERE id = $1")
            .bind(BulkOperationStatus::RolledBack.id())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(name, "rolled_back");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn jobs_are_tenant_scoped_and_cancel_once(pool: PgPool) {
    let integration = seed_integration(&pool, 10).await;
    let job = SyncJobRepo::create(&pool, &new_job(10, integration)).await.unwrap();
    assert_eq!(job.status(), Some(SyncJobStatus::Pending));

    assert!(SyncJobRepo::find_for_tenant(&pool, 11, job.id).await.unwrap().is_none());
    assert!(SyncJobRepo::cancel(&pool, 10, job.id).await.unwrap());
    assert!(!SyncJobRepo::cancel(&pool, 10, job.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn queue_claims_by_priority_then_age(pool: PgPool) {
    let integration = seed_integration(&pool, 1).await;
    let low = SyncJobRepo::create(&pool, &new_job(1, integration)).await.unwrap();
    let high = SyncJobRepo::create(&pool, &new_job(1, integration)).await.unwrap();
    SyncQueueRepo::enqueue(&pool, low.id, 1, 20).await.unwrap();
    SyncQueueRepo::enqueue(&pool, high.id, 1, 80).await.unwrap();

    let first = SyncQueueRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(first.job_id, high.id);
    let second = SyncQueueRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(second.job_id, low.id);
    assert!(SyncQueueRepo::claim_next(&pool).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn canonical_upsert_returns_previous(pool: PgPool) {
    let v1 = serde_json::json!({"sku": "A", "price": 1});
    let v2 = serde_json::json!({"sku": "A", "price": 2});
    assert!(CanonicalRecordRepo::upsert(&pool, 1, "products", "A", &v1).await.unwrap().is_none());
    assert_eq!(
        CanonicalRecordRepo::upsert(&pool, 1, "products", "A", &v2).await.unwrap(),
        Some(v1)
    );
    assert!(CanonicalRecordRepo::get(&pool, 2, "products", "A").await.unwrap().is_none());
    assert_eq!(
        CanonicalRecordRepo::delete(&pool, 1, "products", "A").await.unwrap(),
        Some(v2)
    );
}
