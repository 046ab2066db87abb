//! Credit-card repository (spec §3). The atomic importer mutates
//! `credit_limit`/`limit_source`/`limit_last_updated_at` directly
//! (`importer::atomic_import`); this module covers the plain CRUD reads and
//! the manual-limit-update path a caller drives outside ingestion.

use chrono::Utc;
use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::{CardId, UserId};
use creditscan_core::model::{CreditCard, LimitSource};
use creditscan_core::money::{Currency, Money};
use sqlx::Row;
use tracing::instrument;

use crate::codec::{limit_source_from_str, limit_source_to_str};
use crate::error::map_sqlx;
use crate::pool::Pool;

#[instrument(skip(pool))]
pub async fn get_owned(pool: &Pool, id: CardId, user_id: UserId) -> CoreResult<CreditCard> {
    let row = sqlx::query(
        "select id, user_id, brand, last4, credit_limit, limit_currency, limit_source, limit_last_updated_at \
         from credit_cards where id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx)?
    .ok_or(CoreError::NotFound)?;

    let card = row_to_card(row)?;
    if card.user_id != user_id {
        return Err(CoreError::NotOwned);
    }
    Ok(card)
}

/// Sets a card's credit limit from a direct user action. `limit_source` is
/// always `manual` here; the atomic importer is the only writer that sets
/// `statement` (spec §3: "mutable by update; `limit_source` ... set only
/// when the limit field is actually changed").
#[instrument(skip(pool))]
pub async fn set_manual_limit(
    pool: &Pool,
    id: CardId,
    user_id: UserId,
    new_limit: Money,
    currency: Currency,
) -> CoreResult<()> {
    let result = sqlx::query(
        r#"update credit_cards
           set credit_limit = $1, limit_currency = $2, limit_source = $3, limit_last_updated_at = $4
           where id = $5 and user_id = $6"#,
    )
    .bind(new_limit.as_decimal())
    .bind(currency.to_string())
    .bind(limit_source_to_str(LimitSource::Manual))
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

fn row_to_card(row: sqlx::postgres::PgRow) -> CoreResult<CreditCard> {
    let limit_currency: Option<String> = row.get("limit_currency");
    let limit_source: Option<String> = row.get("limit_source");
    Ok(CreditCard {
        id: CardId::from_uuid(row.get("id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        brand: row.get("brand"),
        last4: row.get("last4"),
        credit_limit: row.get::<Option<rust_decimal::Decimal>, _>("credit_limit").map(Money::new),
        limit_currency: limit_currency
            .map(|s| s.parse::<Currency>().map_err(|_| CoreError::UnsupportedCurrency))
            .transpose()?,
        limit_source: limit_source.map(|s| limit_source_from_str(&s)).transpose()?,
        limit_last_updated_at: row.get("limit_last_updated_at"),
    })
}
