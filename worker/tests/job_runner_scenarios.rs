//! End-to-end job-runner scenarios against a real Postgres instance with
//! faked collaborators (spec §8's S1-S6). Skipped unless `DATABASE_URL` is
//! set, same rationale as `store`'s `#[ignore]`-by-default integration
//! suites: this exercises the real state machine, not a mock of it.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use creditscan_core::ids::{CardId, UserId};
use creditscan_core::model::{JobStatus, StatementStatus};
use creditscan_core::money::Currency;
use creditscan_store::{jobs, pool, Pool};
use rt::Shutdown;
use rust_decimal::Decimal;

#[path = "../src/collaborators.rs"]
mod collaborators;
#[path = "../src/job_runner.rs"]
mod job_runner;
#[path = "../src/rule_applier.rs"]
mod rule_applier;

use collaborators::fakes::{FakeBlobStore, FakeExtractor, FakeLiveRateClient};
use collaborators::{ExtractedStatement, ExtractionResult};
use job_runner::JobRunner;

async fn test_pool() -> Option<Pool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = pool::connect(&url, 5).await.expect("connect to test database");
    pool::migrate(&pool).await.expect("run migrations");
    Some(pool)
}

async fn seed_user_and_card(pool: &Pool) -> (UserId, CardId) {
    let user_id = UserId::new();
    let card_id = CardId::new();
    sqlx::query("insert into users (id) values ($1)")
        .bind(user_id.as_uuid())
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("insert into credit_cards (id, user_id, brand, last4) values ($1, $2, 'visa', '4242')")
        .bind(card_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(pool)
        .await
        .unwrap();
    (user_id, card_id)
}

async fn seed_job(pool: &Pool, user_id: UserId, card_id: CardId, file_hash: &str, path: &str) -> creditscan_core::ids::JobId {
    match jobs::create_or_find(pool, user_id, card_id, file_hash, path, 1024).await.unwrap() {
        jobs::CreateOrFind::Created(job) => job.id,
        jobs::CreateOrFind::Duplicate { existing_job_id } => existing_job_id,
    }
}

fn base_statement(currency: Currency) -> ExtractedStatement {
    ExtractedStatement {
        period_start: NaiveDate::from_ymd_opt(2026, 1, 1),
        period_end: NaiveDate::from_ymd_opt(2026, 1, 31),
        close_date: NaiveDate::from_ymd_opt(2026, 2, 1),
        due_date: NaiveDate::from_ymd_opt(2026, 2, 20),
        previous_balance: Some(Decimal::from(100)),
        current_balance: Some(Decimal::from(150)),
        minimum_payment: Some(Decimal::from(20)),
        currency,
        status: StatementStatus::Active,
        is_fully_paid: false,
    }
}

#[tokio::test]
async fn full_extraction_completes_the_job() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job_id = seed_job(&pool, user_id, card_id, "hash-full", "path/full.pdf").await;

    let blob_store = Arc::new(FakeBlobStore::with_blob("path/full.pdf", b"%PDF-fake".to_vec()));
    let extractor = Arc::new(FakeExtractor::always_succeeds(ExtractionResult::Full {
        statement: base_statement(Currency::Usd),
        transactions: vec![],
        card_limit: None,
    }));
    let live_rate_client = Arc::new(FakeLiveRateClient::default());

    let runner = JobRunner::new(pool.clone(), blob_store, extractor, live_rate_client, std::time::Duration::from_secs(1));
    runner.run(job_id, Shutdown::new()).await;

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.statement_id.is_some());
    assert!(job.error_message.is_none());
}

#[tokio::test]
async fn partial_extraction_lands_as_partial() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job_id = seed_job(&pool, user_id, card_id, "hash-partial", "path/partial.pdf").await;

    let blob_store = Arc::new(FakeBlobStore::with_blob("path/partial.pdf", b"%PDF-fake".to_vec()));
    let extractor = Arc::new(FakeExtractor::always_succeeds(ExtractionResult::Partial {
        statement: base_statement(Currency::Usd),
        transactions: vec![],
        reason: "closing balance illegible".to_owned(),
    }));
    let live_rate_client = Arc::new(FakeLiveRateClient::default());

    let runner = JobRunner::new(pool.clone(), blob_store, extractor, live_rate_client, std::time::Duration::from_secs(1));
    runner.run(job_id, Shutdown::new()).await;

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Partial);
    assert!(job.statement_id.is_some());
}

#[tokio::test]
async fn missing_blob_fails_the_job() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job_id = seed_job(&pool, user_id, card_id, "hash-missing", "path/missing.pdf").await;

    let blob_store = Arc::new(FakeBlobStore::default());
    let extractor = Arc::new(FakeExtractor::always_succeeds(ExtractionResult::Full {
        statement: base_statement(Currency::Usd),
        transactions: vec![],
        card_limit: None,
    }));
    let live_rate_client = Arc::new(FakeLiveRateClient::default());

    let runner = JobRunner::new(pool.clone(), blob_store, extractor, live_rate_client, std::time::Duration::from_secs(1));
    runner.run(job_id, Shutdown::new()).await;

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.is_some());
}

#[tokio::test]
async fn extraction_failure_on_both_models_fails_the_job() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job_id = seed_job(&pool, user_id, card_id, "hash-noext", "path/noext.pdf").await;

    let blob_store = Arc::new(FakeBlobStore::with_blob("path/noext.pdf", b"%PDF-fake".to_vec()));
    // Neither the primary nor the fallback slot is configured, so both
    // attempts fail through to `ExtractionFailed`.
    let extractor = Arc::new(FakeExtractor { primary_result: Mutex::new(None), fallback_result: Mutex::new(None) });
    let live_rate_client = Arc::new(FakeLiveRateClient::default());

    let runner = JobRunner::new(pool.clone(), blob_store, extractor, live_rate_client, std::time::Duration::from_secs(1));
    runner.run(job_id, Shutdown::new()).await;

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let retried = jobs::get(&pool, job_id).await.unwrap();
    assert!(retried.retry_count >= 1, "primary failure should have bumped retry_count before the fallback attempt");
}

#[tokio::test]
async fn unconvertible_card_limit_demotes_to_partial() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job_id = seed_job(&pool, user_id, card_id, "hash-limit", "path/limit.pdf").await;

    let blob_store = Arc::new(FakeBlobStore::with_blob("path/limit.pdf", b"%PDF-fake".to_vec()));
    let extractor = Arc::new(FakeExtractor::always_succeeds(ExtractionResult::Full {
        statement: base_statement(Currency::Usd),
        transactions: vec![],
        // Card limit arrives in ARS while the statement is in USD, and no
        // rate is configured on the fake client, so conversion fails.
        card_limit: Some((Decimal::from(500_000), Currency::Ars)),
    }));
    let live_rate_client = Arc::new(FakeLiveRateClient::default());

    let runner = JobRunner::new(pool.clone(), blob_store, extractor, live_rate_client, std::time::Duration::from_secs(1));
    runner.run(job_id, Shutdown::new()).await;

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Partial);
}

#[tokio::test]
async fn empty_extraction_fails_the_job() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job_id = seed_job(&pool, user_id, card_id, "hash-empty", "path/empty.pdf").await;

    let blob_store = Arc::new(FakeBlobStore::with_blob("path/empty.pdf", b"%PDF-fake".to_vec()));
    let extractor = Arc::new(FakeExtractor::always_succeeds(ExtractionResult::Empty {
        reason: "document is not a statement".to_owned(),
    }));
    let live_rate_client = Arc::new(FakeLiveRateClient::default());

    let runner = JobRunner::new(pool.clone(), blob_store, extractor, live_rate_client, std::time::Duration::from_secs(1));
    runner.run(job_id, Shutdown::new()).await;

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn shutdown_before_start_leaves_the_job_pending() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job_id = seed_job(&pool, user_id, card_id, "hash-shutdown", "path/shutdown.pdf").await;

    let blob_store = Arc::new(FakeBlobStore::with_blob("path/shutdown.pdf", b"%PDF-fake".to_vec()));
    let extractor = Arc::new(FakeExtractor::always_succeeds(ExtractionResult::Full {
        statement: base_statement(Currency::Usd),
        transactions: vec![],
        card_limit: None,
    }));
    let live_rate_client = Arc::new(FakeLiveRateClient::default());

    let shutdown = Shutdown::new();
    shutdown.send();

    let runner = JobRunner::new(pool.clone(), blob_store, extractor, live_rate_client, std::time::Duration::from_secs(1));
    runner.run(job_id, shutdown).await;

    let job = jobs::get(&pool, job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Processing, "a shutdown right after the visibility transition should leave the job non-terminal for crash resumption to pick back up");
}
