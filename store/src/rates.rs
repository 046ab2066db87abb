//! Exchange-rate store (spec §4.5/§4.6, C1). Quote *selection* policy lives
//! in `creditscan_core::conversion::select_quote`, which is pure and
//! property-tested without a database; this module only persists rows and
//! loads the candidate set for a pair.

use chrono::{NaiveDate, Utc};
use creditscan_core::conversion::ConvertedAmount;
use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::model::{CurrencyPair, ExchangeRate, Quote};
use creditscan_core::{conversion, Currency, Money};
use rust_decimal::Decimal;
use sqlx::Row;
use tracing::instrument;

use crate::error::map_sqlx;
use crate::pool::Pool;

/// Inserts or overwrites the quote for `(pair, rate_date)`. Spec §3:
/// "Upsert by key; no history semantics beyond most-recent-wins-per-day."
#[instrument(skip(pool))]
pub async fn upsert(pool: &Pool, rate: &ExchangeRate) -> CoreResult<()> {
    let pair = rate.pair.canonical();
    sqlx::query(
        r#"
        insert into exchange_rates (base_currency, quote_currency, rate_date, buy, sell)
        values ($1, $2, $3, $4, $5)
        on conflict (base_currency, quote_currency, rate_date)
        do update set buy = excluded.buy, sell = excluded.sell
        "#,
    )
    .bind(pair.base.to_string())
    .bind(pair.quote.to_string())
    .bind(rate.rate_date)
    .bind(rate.quote.buy)
    .bind(rate.quote.sell)
    .execute(pool)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

/// Loads every stored quote for `pair`'s canonical storage key. Small and
/// bounded in practice (one row per calendar day this system has run).
#[instrument(skip(pool))]
pub async fn list_for_pair(pool: &Pool, pair: CurrencyPair) -> CoreResult<Vec<ExchangeRate>> {
    let canonical = pair.canonical();
    let rows = sqlx::query(
        "select rate_date, buy, sell from exchange_rates where base_currency = $1 and quote_currency = $2",
    )
    .bind(canonical.base.to_string())
    .bind(canonical.quote.to_string())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;

    Ok(rows
        .into_iter()
        .map(|row| ExchangeRate {
            pair: canonical,
            rate_date: row.get::<NaiveDate, _>("rate_date"),
            quote: Quote {
                buy: row.get("buy"),
                sell: row.get("sell"),
            },
        })
        .collect())
}

/// Loads the candidate set for `pair` and applies the lookup policy from
/// spec §4.6 via `creditscan_core::conversion::select_quote`.
#[instrument(skip(pool))]
pub async fn lookup(pool: &Pool, pair: CurrencyPair, date: Option<NaiveDate>) -> CoreResult<Option<ExchangeRate>> {
    let candidates = list_for_pair(pool, pair).await?;
    Ok(conversion::select_quote(&candidates, date).cloned())
}

/// Convenience over [`lookup`] for the only pair this system converts.
pub async fn lookup_usd_ars(pool: &Pool, date: Option<NaiveDate>) -> CoreResult<Option<ExchangeRate>> {
    lookup(pool, CurrencyPair { base: Currency::Usd, quote: Currency::Ars }, date).await
}

/// The `ConvertCurrency(amount, from, to, date?) -> {converted, rate,
/// rate_date}` external interface (spec §6), composed from [`lookup`] and
/// [`creditscan_core::conversion::convert`]. This is the DB-backed
/// conversion service (C3); the live HTTP rate client used at import time
/// for absolute limit conversion is a separate collaborator the worker
/// calls directly.
#[instrument(skip(pool))]
pub async fn convert_currency(
    pool: &Pool,
    amount: Money,
    from: Currency,
    to: Currency,
    date: Option<NaiveDate>,
) -> CoreResult<ConvertedAmount> {
    if from == to {
        return Ok(ConvertedAmount {
            converted: amount,
            rate: Decimal::ONE,
            rate_date: date.unwrap_or_else(|| Utc::now().date_naive()),
        });
    }

    let pair = CurrencyPair { base: from, quote: to };
    let rate = lookup(pool, pair, date).await?.ok_or(CoreError::RateNotFound)?;
    let (converted, applied_rate) = conversion::convert(amount, from, to, rate.quote)?;
    Ok(ConvertedAmount {
        converted,
        rate: applied_rate,
        rate_date: rate.rate_date,
    })
}
