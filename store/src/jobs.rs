//! Upload-job repository and state machine (spec §4.1, C5).

use chrono::{DateTime, Utc};
use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::{CardId, JobId, StatementId, UserId};
use creditscan_core::model::{JobStatus, UploadJob};
use sqlx::Row;
use tracing::instrument;

use crate::codec::{job_status_from_str, job_status_to_str};
use crate::error::{is_unique_violation, map_sqlx};
use crate::pool::Pool;

/// Outcome of [`create_or_find`]: either a freshly created `PENDING` job, or
/// the job that already exists for this `(user_id, file_hash)`.
pub enum CreateOrFind {
    Created(UploadJob),
    Duplicate { existing_job_id: JobId },
}

/// Upload size ceiling (spec §6, `UploadBlob`): "bytes ≤ 25 MiB ... core
/// validates SHA-256 uniqueness and size ceiling redundantly". The
/// collaborator boundary enforces this on the bytes it receives; this is
/// core's own independent check against the size it's told about.
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[instrument(skip(pool, file_path), fields(user_id = %user_id, card_id = %card_id))]
pub async fn create_or_find(
    pool: &Pool,
    user_id: UserId,
    card_id: CardId,
    file_hash: &str,
    file_path: &str,
    file_size_bytes: u64,
) -> CoreResult<CreateOrFind> {
    if file_size_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::UploadTooLarge {
            size_bytes: file_size_bytes,
            max_bytes: MAX_UPLOAD_BYTES,
        });
    }

    let id = JobId::new();
    let now = Utc::now();

    let insert_result = sqlx::query(
        r#"
        insert into upload_jobs
            (id, user_id, card_id, file_hash, file_path, status, retry_count, created_at, updated_at)
        values ($1, $2, $3, $4, $5, 'PENDING', 0, $6, $6)
        on conflict (user_id, file_hash) do nothing
        "#,
    )
    .bind(id.as_uuid())
    .bind(user_id.as_uuid())
    .bind(card_id.as_uuid())
    .bind(file_hash)
    .bind(file_path)
    .bind(now)
    .execute(pool)
    .await;

    let inserted = match insert_result {
        Ok(result) => result.rows_affected() == 1,
        // A concurrent insert can still race us into a unique-violation
        // instead of a silent skip, depending on the exact interleaving
        // with `ON CONFLICT DO NOTHING`'s internal retry; either way it
        // means we lost the race.
        Err(err) if is_unique_violation(&err) => false,
        Err(err) => return Err(map_sqlx(err)),
    };

    if inserted {
        return Ok(CreateOrFind::Created(UploadJob {
            id,
            user_id,
            card_id,
            file_hash: file_hash.to_owned(),
            file_path: file_path.to_owned(),
            status: JobStatus::Pending,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            statement_id: None,
        }));
    }

    let existing_id: uuid::Uuid = sqlx::query("select id from upload_jobs where user_id = $1 and file_hash = $2")
        .bind(user_id.as_uuid())
        .bind(file_hash)
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?
        .get(0);

    Ok(CreateOrFind::Duplicate {
        existing_job_id: JobId::from_uuid(existing_id),
    })
}

#[instrument(skip(pool))]
pub async fn get(pool: &Pool, id: JobId) -> CoreResult<UploadJob> {
    let row = sqlx::query(
        r#"select id, user_id, card_id, file_hash, file_path, status, error_message,
                  retry_count, created_at, updated_at, completed_at, statement_id
           from upload_jobs where id = $1"#,
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx)?
    .ok_or(CoreError::NotFound)?;

    row_to_job(row)
}

/// Fetches a job by id, but only if it's owned by `user_id`. The spec
/// (§6, `GetJob`) grants no superuser bypass here: an unowned job is
/// surfaced as [`CoreError::NotOwned`], which the transport layer maps to
/// the same response as [`CoreError::NotFound`].
#[instrument(skip(pool))]
pub async fn get_owned(pool: &Pool, id: JobId, user_id: UserId) -> CoreResult<UploadJob> {
    let job = get(pool, id).await?;
    if job.user_id != user_id {
        return Err(CoreError::NotOwned);
    }
    Ok(job)
}

/// Conditionally advances `id` from `from` to `to`, iff the row is
/// currently in `from`. Returns whether the transition actually happened -
/// a caller losing the race (another worker already transitioned it) is not
/// an error, just a no-op it should walk away from.
#[instrument(skip(pool, statement_id, error_message))]
pub async fn transition(
    pool: &Pool,
    id: JobId,
    from: JobStatus,
    to: JobStatus,
    statement_id: Option<StatementId>,
    error_message: Option<&str>,
) -> CoreResult<bool> {
    debug_assert!(
        from.can_transition_to(to),
        "attempted illegal transition {from:?} -> {to:?}"
    );

    let now = Utc::now();
    let completed_at = to.is_terminal().then_some(now);

    let result = sqlx::query(
        r#"
        update upload_jobs
        set status = $1,
            updated_at = $2,
            completed_at = coalesce($3, completed_at),
            statement_id = coalesce($4, statement_id),
            error_message = coalesce($5, error_message)
        where id = $6 and status = $7
        "#,
    )
    .bind(job_status_to_str(to))
    .bind(now)
    .bind(completed_at)
    .bind(statement_id.map(|s| s.as_uuid()))
    .bind(error_message)
    .bind(id.as_uuid())
    .bind(job_status_to_str(from))
    .execute(pool)
    .await
    .map_err(map_sqlx)?;

    Ok(result.rows_affected() == 1)
}

/// Unconditional atomic increment of `retry_count`.
#[instrument(skip(pool))]
pub async fn increment_retry(pool: &Pool, id: JobId) -> CoreResult<()> {
    sqlx::query("update upload_jobs set retry_count = retry_count + 1, updated_at = $1 where id = $2")
        .bind(Utc::now())
        .bind(id.as_uuid())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(())
}

/// All jobs in `PENDING`, for crash resumption (§4.4).
#[instrument(skip(pool))]
pub async fn list_pending(pool: &Pool) -> CoreResult<Vec<JobId>> {
    let rows = sqlx::query("select id from upload_jobs where status = 'PENDING'")
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(rows.into_iter().map(|r| JobId::from_uuid(r.get(0))).collect())
}

/// All jobs in `PROCESSING` with `updated_at` older than `stale_before`, for
/// crash resumption (§4.4).
#[instrument(skip(pool))]
pub async fn list_stale_processing(pool: &Pool, stale_before: DateTime<Utc>) -> CoreResult<Vec<JobId>> {
    let rows = sqlx::query("select id from upload_jobs where status = 'PROCESSING' and updated_at < $1")
        .bind(stale_before)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(rows.into_iter().map(|r| JobId::from_uuid(r.get(0))).collect())
}

fn row_to_job(row: sqlx::postgres::PgRow) -> CoreResult<UploadJob> {
    let status_str: String = row.get("status");
    Ok(UploadJob {
        id: JobId::from_uuid(row.get("id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        card_id: CardId::from_uuid(row.get("card_id")),
        file_hash: row.get("file_hash"),
        file_path: row.get("file_path"),
        status: job_status_from_str(&status_str)?,
        error_message: row.get("error_message"),
        retry_count: {
            let count: i32 = row.get("retry_count");
            count as u32
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
        statement_id: row
            .get::<Option<uuid::Uuid>, _>("statement_id")
            .map(StatementId::from_uuid),
    })
}
