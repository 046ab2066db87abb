//! Crash resumption (spec §4.4) and rule application (spec §4.8) against a
//! real Postgres instance. Skipped unless `DATABASE_URL` is set.

use chrono::Utc;
use creditscan_core::ids::{CardId, TagId, UserId};
use creditscan_core::model::{Field, JobStatus, LogicalOperator, Operator};
use creditscan_core::rules::{RuleActionDraft, RuleConditionDraft};
use creditscan_store::{jobs, pool, rules, Pool};

#[path = "../src/rule_applier.rs"]
mod rule_applier;
#[path = "../src/crash_resumption.rs"]
mod crash_resumption;

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

#[tokio::test]
async fn resume_reenqueues_pending_jobs() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;
    let job = match jobs::create_or_find(&pool, user_id, card_id, "hash-resume", "path/resume.pdf", 1024)
        .await
        .unwrap()
    {
        jobs::CreateOrFind::Created(job) => job,
        jobs::CreateOrFind::Duplicate { .. } => panic!("expected a fresh job"),
    };

    let mut enqueued = Vec::new();
    crash_resumption::resume(&pool, 30, |job_id| enqueued.push(job_id)).await.unwrap();

    assert!(enqueued.contains(&job.id));
}

#[tokio::test]
async fn resume_demotes_stale_processing_jobs_and_leaves_fresh_ones_alone() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;

    let stale_job = match jobs::create_or_find(&pool, user_id, card_id, "hash-stale", "path/stale.pdf", 1024)
        .await
        .unwrap()
    {
        jobs::CreateOrFind::Created(job) => job,
        jobs::CreateOrFind::Duplicate { .. } => panic!("expected a fresh job"),
    };
    jobs::transition(&pool, stale_job.id, JobStatus::Pending, JobStatus::Processing, None, None)
        .await
        .unwrap();
    // Backdate `updated_at` so it reads as stale under a 30-minute cutoff.
    sqlx::query("update upload_jobs set updated_at = $1 where id = $2")
        .bind(Utc::now() - chrono::Duration::hours(2))
        .bind(stale_job.id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();

    let fresh_job = match jobs::create_or_find(&pool, user_id, card_id, "hash-fresh", "path/fresh.pdf", 1024)
        .await
        .unwrap()
    {
        jobs::CreateOrFind::Created(job) => job,
        jobs::CreateOrFind::Duplicate { .. } => panic!("expected a fresh job"),
    };
    jobs::transition(&pool, fresh_job.id, JobStatus::Pending, JobStatus::Processing, None, None)
        .await
        .unwrap();

    let mut enqueued = Vec::new();
    crash_resumption::resume(&pool, 30, |job_id| enqueued.push(job_id)).await.unwrap();

    assert!(enqueued.contains(&stale_job.id), "stale processing job should be demoted and re-enqueued");
    assert!(!enqueued.contains(&fresh_job.id), "fresh processing job should be left alone");

    let demoted = jobs::get(&pool, stale_job.id).await.unwrap();
    assert_eq!(demoted.status, JobStatus::Pending);

    let untouched = jobs::get(&pool, fresh_job.id).await.unwrap();
    assert_eq!(untouched.status, JobStatus::Processing);
}

#[tokio::test]
async fn rule_application_tags_matching_transactions() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let (user_id, card_id) = seed_user_and_card(&pool).await;

    let tag_id = TagId::new();
    sqlx::query("insert into tags (id, user_id, label) values ($1, $2, 'coffee')")
        .bind(tag_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();

    let statement_id = creditscan_core::ids::StatementId::new();
    sqlx::query(
        "insert into card_statements (id, card_id, user_id, currency, status, is_fully_paid) \
         values ($1, $2, $3, 'usd', 'active', false)",
    )
    .bind(statement_id.as_uuid())
    .bind(card_id.as_uuid())
    .bind(user_id.as_uuid())
    .execute(&pool)
    .await
    .unwrap();

    let txn_id = creditscan_core::ids::TransactionId::new();
    sqlx::query(
        "insert into transactions (id, statement_id, user_id, txn_date, payee, description, amount, currency) \
         values ($1, $2, $3, current_date, 'Starbucks', 'coffee run', 5.50, 'usd')",
    )
    .bind(txn_id.as_uuid())
    .bind(statement_id.as_uuid())
    .bind(user_id.as_uuid())
    .execute(&pool)
    .await
    .unwrap();

    let conditions = vec![RuleConditionDraft {
        field: Field::Payee,
        operator: Operator::Contains,
        value: "Starbucks".to_owned(),
        value_secondary: None,
        logical_operator: LogicalOperator::And,
    }];
    let actions = vec![RuleActionDraft { tag_id }];
    rules::create(&pool, user_id, "tag coffee", conditions, actions).await.unwrap();

    let summary = rule_applier::apply(&pool, user_id, rule_applier::Scope::AllOwned).await.unwrap();
    assert_eq!(summary.transactions_processed, 1);
    assert_eq!(summary.tags_applied, 1);

    // Applying again is idempotent: the membership already exists.
    let second = rule_applier::apply(&pool, user_id, rule_applier::Scope::AllOwned).await.unwrap();
    assert_eq!(second.tags_applied, 0);
}
