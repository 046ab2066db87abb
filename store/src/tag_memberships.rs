//! `TransactionTag` membership (spec §3): a composite-key existence table,
//! insert-or-ignore and delete only, no updates.

use creditscan_core::error::CoreResult;
use creditscan_core::ids::{TagId, TransactionId};
use tracing::instrument;

use crate::error::map_sqlx;
use crate::pool::Pool;

/// Attaches `tag_id` to `transaction_id` if not already attached. Returns
/// whether a new row was actually inserted - the rule applier (C11) sums
/// this to produce `tags_applied`, which must count only newly inserted
/// rows (spec §4.8).
#[instrument(skip(pool))]
pub async fn attach_if_absent(pool: &Pool, transaction_id: TransactionId, tag_id: TagId) -> CoreResult<bool> {
    let result = sqlx::query(
        "insert into transaction_tags (transaction_id, tag_id) values ($1, $2) on conflict do nothing",
    )
    .bind(transaction_id.as_uuid())
    .bind(tag_id.as_uuid())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(result.rows_affected() == 1)
}

#[instrument(skip(pool))]
pub async fn detach(pool: &Pool, transaction_id: TransactionId, tag_id: TagId) -> CoreResult<()> {
    sqlx::query("delete from transaction_tags where transaction_id = $1 and tag_id = $2")
        .bind(transaction_id.as_uuid())
        .bind(tag_id.as_uuid())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn list_tag_ids_for_transaction(pool: &Pool, transaction_id: TransactionId) -> CoreResult<Vec<TagId>> {
    use sqlx::Row;
    let rows = sqlx::query("select tag_id from transaction_tags where transaction_id = $1")
        .bind(transaction_id.as_uuid())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(rows.into_iter().map(|r| TagId::from_uuid(r.get(0))).collect())
}
