//! Transaction repository (spec §3). Reads are always scoped to an owning
//! user - see spec §9's open question on unscoped listing, resolved in
//! `DESIGN.md` in favor of ownership filtering everywhere.

use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::{StatementId, TransactionId, UserId};
use creditscan_core::model::Transaction;
use creditscan_core::money::{Currency, Money};
use sqlx::Row;
use tracing::instrument;

use crate::error::map_sqlx;
use crate::pool::Pool;

#[instrument(skip(pool))]
pub async fn get_owned(pool: &Pool, id: TransactionId, user_id: UserId) -> CoreResult<Transaction> {
    let row = sqlx::query(
        r#"select id, statement_id, user_id, txn_date, payee, description, amount, currency,
                  coupon, installment_cur, installment_tot
           from transactions where id = $1"#,
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx)?
    .ok_or(CoreError::NotFound)?;

    let txn = row_to_transaction(row)?;
    if txn.user_id != user_id {
        return Err(CoreError::NotOwned);
    }
    Ok(txn)
}

#[instrument(skip(pool))]
pub async fn list_by_statement(pool: &Pool, statement_id: StatementId, user_id: UserId) -> CoreResult<Vec<Transaction>> {
    let rows = sqlx::query(
        r#"select id, statement_id, user_id, txn_date, payee, description, amount, currency,
                  coupon, installment_cur, installment_tot
           from transactions where statement_id = $1 and user_id = $2
           order by txn_date"#,
    )
    .bind(statement_id.as_uuid())
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;
    rows.into_iter().map(row_to_transaction).collect()
}

/// Every transaction owned by `user_id`, for the `AllOwned` rule-application
/// scope (spec §4.8).
#[instrument(skip(pool))]
pub async fn list_all_owned(pool: &Pool, user_id: UserId) -> CoreResult<Vec<Transaction>> {
    let rows = sqlx::query(
        r#"select id, statement_id, user_id, txn_date, payee, description, amount, currency,
                  coupon, installment_cur, installment_tot
           from transactions where user_id = $1
           order by txn_date"#,
    )
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;
    rows.into_iter().map(row_to_transaction).collect()
}

/// The subset of `ids` owned by `user_id` - unowned ids are silently
/// excluded per spec §4.8 ("Transactions not owned by `user_id` are
/// silently excluded").
#[instrument(skip(pool, ids))]
pub async fn list_by_ids_owned(pool: &Pool, ids: &[TransactionId], user_id: UserId) -> CoreResult<Vec<Transaction>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let raw_ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    let rows = sqlx::query(
        r#"select id, statement_id, user_id, txn_date, payee, description, amount, currency,
                  coupon, installment_cur, installment_tot
           from transactions where id = any($1) and user_id = $2
           order by txn_date"#,
    )
    .bind(&raw_ids[..])
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;
    rows.into_iter().map(row_to_transaction).collect()
}

/// Updates the mutable fields of an owned transaction in place. Does not
/// move a transaction between statements - `statement_id` is fixed at
/// creation by the atomic importer.
#[instrument(skip(pool, txn))]
pub async fn update_transaction(pool: &Pool, txn: &Transaction) -> CoreResult<()> {
    let result = sqlx::query(
        r#"update transactions
           set txn_date = $1, payee = $2, description = $3, amount = $4, currency = $5,
               coupon = $6, installment_cur = $7, installment_tot = $8
           where id = $9 and user_id = $10"#,
    )
    .bind(txn.txn_date)
    .bind(&txn.payee)
    .bind(&txn.description)
    .bind(txn.amount.as_decimal())
    .bind(txn.currency.to_string())
    .bind(&txn.coupon)
    .bind(txn.installment_cur)
    .bind(txn.installment_tot)
    .bind(txn.id.as_uuid())
    .bind(txn.user_id.as_uuid())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

fn row_to_transaction(row: sqlx::postgres::PgRow) -> CoreResult<Transaction> {
    let currency_str: String = row.get("currency");
    Ok(Transaction {
        id: TransactionId::from_uuid(row.get("id")),
        statement_id: StatementId::from_uuid(row.get("statement_id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        txn_date: row.get("txn_date"),
        payee: row.get("payee"),
        description: row.get("description"),
        amount: Money::new(row.get::<rust_decimal::Decimal, _>("amount")),
        currency: currency_str.parse::<Currency>().map_err(|_| CoreError::UnsupportedCurrency)?,
        coupon: row.get("coupon"),
        installment_cur: row.get("installment_cur"),
        installment_tot: row.get("installment_tot"),
    })
}
