//! PostgreSQL incident repository tests.
//!
//! Run against a migrated database; skipped when `DATABASE_URL` is unset.

use std::sync::Arc;

use chrono::Utc;
use roadwatch_db::{Error, IdAllocator, IncidentRepository, NewIncident, PgIncidentRepository};
use sqlx::PgPool;

/// Connect to the test database, or `None` to skip.
async fn setup_test_db() -> Option<PgPool> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    Some(
        PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database"),
    )
}

/// Ids far above anything the pipeline allocates, unique per test run.
fn scratch_id(offset: i64) -> i64 {
    1_000_000_000 + (Utc::now().timestamp_micros() % 1_000_000) * 100 + offset
}

#[tokio::test]
async fn test_insert_get_and_duplicate() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let repo = PgIncidentRepository::new(pool);
    let id = scratch_id(0);

    let draft = NewIncident::new("Accident")
        .location("Camera-01 (Video Analysis)")
        .description("Two vehicles collided")
        .image_url("/api/videos/download/during.jpg")
        .snapshot_urls(&["/api/videos/download/before.jpg", "/api/videos/download/during.jpg"]);
    let inserted = repo.insert(id, &draft).await.unwrap();
    assert_eq!(inserted.id, id);

    let fetched = repo.get(id).await.unwrap().expect("row should exist");
    assert_eq!(fetched.incident_type, "Accident");
    assert_eq!(fetched.snapshot_url_list().len(), 2);
    assert!(!fetched.alert_sent);

    let err = repo.insert(id, &draft).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateId(dup) if dup == id));

    repo.mark_alert_sent(id).await.unwrap();
    assert!(repo.get(id).await.unwrap().unwrap().alert_sent);

    assert!(repo.delete(id).await.unwrap());
    assert!(!repo.exists(id).await.unwrap());
}

#[tokio::test]
async fn test_gap_query_sees_hole() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let repo = PgIncidentRepository::new(pool);
    let base = scratch_id(10);

    for id in [base, base + 1, base + 3] {
        repo.insert(id, &NewIncident::new("Accident")).await.unwrap();
    }

    // Other rows may exist, so only check that our hole is reachable.
    let max = repo.max_id().await.unwrap().unwrap();
    assert!(max >= base + 3);
    let gap = repo.next_gap_id().await.unwrap().unwrap();
    assert!(gap <= base + 2);

    for id in [base, base + 1, base + 3] {
        repo.delete(id).await.unwrap();
    }
}

#[tokio::test]
async fn test_allocator_persists_against_postgres() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let repo = Arc::new(PgIncidentRepository::new(pool));
    let allocator = IdAllocator::new(repo.clone());

    let row = allocator
        .persist(&NewIncident::new("Accident").description("allocator smoke test"))
        .await
        .unwrap();
    assert!(row.id >= 1);
    assert!(repo.exists(row.id).await.unwrap());

    let recent = repo.list_recent(10).await.unwrap();
    assert!(recent.iter().any(|r| r.id == row.id));

    repo.delete(row.id).await.unwrap();
}
