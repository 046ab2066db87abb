//! Exercises the upload-job repository against a real Postgres instance.
//! Skipped unless `DATABASE_URL` is set, since this repository layer is
//! SQL-shaped and not worth faking - same rationale as the teacher's
//! `#[ignore]`-by-default integration suites that need a live backend.

use creditscan_core::ids::{CardId, UserId};
use creditscan_core::model::JobStatus;
use creditscan_store::{jobs, pool};
use sqlx::Row;

async fn test_pool() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = pool::connect(&url, 5).await.expect("connect to test database");
    pool::migrate(&pool).await.expect("run migrations");
    Some(pool)
}

#[tokio::test]
async fn duplicate_upload_returns_existing_job_id() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let user_id = UserId::new();
    let card_id = CardId::new();
    sqlx::query("insert into users (id) values ($1)")
        .bind(user_id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("insert into credit_cards (id, user_id, brand, last4) values ($1, $2, 'visa', '4242')")
        .bind(card_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();

    let first = jobs::create_or_find(&pool, user_id, card_id, "hash-a", "path/a.pdf", 1024)
        .await
        .unwrap();
    let first_id = match first {
        jobs::CreateOrFind::Created(job) => job.id,
        jobs::CreateOrFind::Duplicate { .. } => panic!("expected a fresh job"),
    };

    let second = jobs::create_or_find(&pool, user_id, card_id, "hash-a", "path/a.pdf", 1024)
        .await
        .unwrap();
    match second {
        jobs::CreateOrFind::Duplicate { existing_job_id } => assert_eq!(existing_job_id, first_id),
        jobs::CreateOrFind::Created(_) => panic!("expected a duplicate"),
    }
}

#[tokio::test]
async fn transition_requires_matching_from_state() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let user_id = UserId::new();
    let card_id = CardId::new();
    sqlx::query("insert into users (id) values ($1)")
        .bind(user_id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("insert into credit_cards (id, user_id, brand, last4) values ($1, $2, 'visa', '4242')")
        .bind(card_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();

    let created = jobs::create_or_find(&pool, user_id, card_id, "hash-b", "path/b.pdf", 1024)
        .await
        .unwrap();
    let job_id = match created {
        jobs::CreateOrFind::Created(job) => job.id,
        jobs::CreateOrFind::Duplicate { .. } => panic!("expected a fresh job"),
    };

    // Stale `from` - the row is PENDING, not PROCESSING - so this no-ops.
    let moved = jobs::transition(&pool, job_id, JobStatus::Processing, JobStatus::Completed, None, None)
        .await
        .unwrap();
    assert!(!moved);

    let moved = jobs::transition(&pool, job_id, JobStatus::Pending, JobStatus::Processing, None, None)
        .await
        .unwrap();
    assert!(moved);

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_any_row_is_written() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let user_id = UserId::new();
    let card_id = CardId::new();
    sqlx::query("insert into users (id) values ($1)")
        .bind(user_id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("insert into credit_cards (id, user_id, brand, last4) values ($1, $2, 'visa', '4242')")
        .bind(card_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();

    let err = jobs::create_or_find(
        &pool,
        user_id,
        card_id,
        "hash-oversized",
        "path/oversized.pdf",
        jobs::MAX_UPLOAD_BYTES + 1,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, creditscan_core::error::CoreError::UploadTooLarge { .. }));

    let row = sqlx::query("select count(*) as n from upload_jobs where user_id = $1")
        .bind(user_id.as_uuid())
        .fetch_one(&pool)
        .await
        .unwrap();
    let count: i64 = row.get("n");
    assert_eq!(count, 0);
}
