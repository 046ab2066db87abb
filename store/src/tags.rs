//! Tag repository (spec §3). Soft-deleted tags are excluded from reads
//! unless explicitly requested.

use std::collections::HashSet;

use chrono::Utc;
use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::{TagId, UserId};
use creditscan_core::model::Tag;
use sqlx::Row;
use tracing::instrument;

use crate::error::map_sqlx;
use crate::pool::Pool;

#[instrument(skip(pool))]
pub async fn create(pool: &Pool, user_id: UserId, label: &str, color: Option<&str>) -> CoreResult<Tag> {
    let id = TagId::new();
    sqlx::query("insert into tags (id, user_id, label, color) values ($1, $2, $3, $4)")
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(label)
        .bind(color)
        .execute(pool)
        .await
        .map_err(map_sqlx)?;

    Ok(Tag {
        id,
        user_id,
        label: label.to_owned(),
        color: color.map(str::to_owned),
        deleted_at: None,
    })
}

#[instrument(skip(pool))]
pub async fn list_live(pool: &Pool, user_id: UserId) -> CoreResult<Vec<Tag>> {
    let rows = sqlx::query("select id, user_id, label, color, deleted_at from tags where user_id = $1 and deleted_at is null")
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(rows.into_iter().map(row_to_tag).collect())
}

#[instrument(skip(pool))]
pub async fn get_owned(pool: &Pool, id: TagId, user_id: UserId) -> CoreResult<Tag> {
    let row = sqlx::query("select id, user_id, label, color, deleted_at from tags where id = $1")
        .bind(id.as_uuid())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(CoreError::NotFound)?;
    let tag = row_to_tag(row);
    if tag.user_id != user_id {
        return Err(CoreError::NotOwned);
    }
    Ok(tag)
}

#[instrument(skip(pool))]
pub async fn soft_delete(pool: &Pool, id: TagId, user_id: UserId) -> CoreResult<()> {
    let result = sqlx::query("update tags set deleted_at = $1 where id = $2 and user_id = $3 and deleted_at is null")
        .bind(Utc::now())
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(pool)
        .await
        .map_err(map_sqlx)?;
    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

/// Updates a live tag's `label`/`color` in place. Spec §3: "Label is unique
/// per live user tag" - a collision surfaces as [`CoreError::Storage`]
/// wrapping the unique-violation, same as [`create`].
#[instrument(skip(pool))]
pub async fn update_tag(pool: &Pool, id: TagId, user_id: UserId, label: &str, color: Option<&str>) -> CoreResult<Tag> {
    let result = sqlx::query(
        "update tags set label = $1, color = $2 where id = $3 and user_id = $4 and deleted_at is null",
    )
    .bind(label)
    .bind(color)
    .bind(id.as_uuid())
    .bind(user_id.as_uuid())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }

    Ok(Tag {
        id,
        user_id,
        label: label.to_owned(),
        color: color.map(str::to_owned),
        deleted_at: None,
    })
}

/// Of `candidate_ids`, returns the subset that are live and owned by
/// `user_id` - exactly the input
/// `creditscan_core::rules::validator::validate_rule` needs to check rule
/// actions against, computed in a single query so the validator stays
/// I/O-free.
#[instrument(skip(pool, candidate_ids))]
pub async fn live_owned_tag_ids(
    pool: &Pool,
    user_id: UserId,
    candidate_ids: &[TagId],
) -> CoreResult<HashSet<TagId>> {
    if candidate_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let ids: Vec<uuid::Uuid> = candidate_ids.iter().map(|id| id.as_uuid()).collect();
    let rows = sqlx::query(
        "select id from tags where user_id = $1 and deleted_at is null and id = any($2)",
    )
    .bind(user_id.as_uuid())
    .bind(&ids[..])
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(rows.into_iter().map(|r| TagId::from_uuid(r.get(0))).collect())
}

fn row_to_tag(row: sqlx::postgres::PgRow) -> Tag {
    Tag {
        id: TagId::from_uuid(row.get("id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        label: row.get("label"),
        color: row.get("color"),
        deleted_at: row.get("deleted_at"),
    }
}
