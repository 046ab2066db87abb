//! Card-statement repository (spec §3).

use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::{CardId, StatementId, UserId};
use creditscan_core::model::CardStatement;
use creditscan_core::money::{Currency, Money};
use sqlx::Row;
use tracing::instrument;

use crate::codec::statement_status_from_str;
use crate::error::map_sqlx;
use crate::pool::Pool;

#[instrument(skip(pool))]
pub async fn get_owned(pool: &Pool, id: StatementId, user_id: UserId) -> CoreResult<CardStatement> {
    let row = sqlx::query(
        r#"select id, card_id, user_id, period_start, period_end, close_date, due_date,
                  previous_balance, current_balance, minimum_payment, currency, status,
                  is_fully_paid, source_file_path
           from card_statements where id = $1"#,
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx)?
    .ok_or(CoreError::NotFound)?;

    let statement = row_to_statement(row)?;
    if statement.user_id != user_id {
        return Err(CoreError::NotOwned);
    }
    Ok(statement)
}

#[instrument(skip(pool))]
pub async fn list_by_card(pool: &Pool, card_id: CardId, user_id: UserId) -> CoreResult<Vec<CardStatement>> {
    let rows = sqlx::query(
        r#"select id, card_id, user_id, period_start, period_end, close_date, due_date,
                  previous_balance, current_balance, minimum_payment, currency, status,
                  is_fully_paid, source_file_path
           from card_statements where card_id = $1 and user_id = $2
           order by period_start desc nulls last"#,
    )
    .bind(card_id.as_uuid())
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;

    rows.into_iter().map(row_to_statement).collect()
}

/// Updates the mutable fields of an owned statement in place, re-checking
/// [`CardStatement::check_invariants`] before writing (spec §3: `period_end
/// >= period_start`, `due_date >= close_date`, non-negative balances).
#[instrument(skip(pool, statement))]
pub async fn update_statement(pool: &Pool, statement: &CardStatement) -> CoreResult<()> {
    statement
        .check_invariants()
        .map_err(|err| CoreError::InvalidStatement { reason: err.to_string() })?;

    let result = sqlx::query(
        r#"update card_statements
           set period_start = $1, period_end = $2, close_date = $3, due_date = $4,
               previous_balance = $5, current_balance = $6, minimum_payment = $7,
               currency = $8, status = $9, is_fully_paid = $10, source_file_path = $11
           where id = $12 and user_id = $13"#,
    )
    .bind(statement.period_start)
    .bind(statement.period_end)
    .bind(statement.close_date)
    .bind(statement.due_date)
    .bind(statement.previous_balance.map(|m| m.as_decimal()))
    .bind(statement.current_balance.map(|m| m.as_decimal()))
    .bind(statement.minimum_payment.map(|m| m.as_decimal()))
    .bind(statement.currency.to_string())
    .bind(crate::codec::statement_status_to_str(statement.status))
    .bind(statement.is_fully_paid)
    .bind(&statement.source_file_path)
    .bind(statement.id.as_uuid())
    .bind(statement.user_id.as_uuid())
    .execute(pool)
    .await
    .map_err(map_sqlx)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

fn row_to_statement(row: sqlx::postgres::PgRow) -> CoreResult<CardStatement> {
    let status_str: String = row.get("status");
    let currency_str: String = row.get("currency");
    Ok(CardStatement {
        id: StatementId::from_uuid(row.get("id")),
        card_id: CardId::from_uuid(row.get("card_id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        close_date: row.get("close_date"),
        due_date: row.get("due_date"),
        previous_balance: row.get::<Option<rust_decimal::Decimal>, _>("previous_balance").map(Money::new),
        current_balance: row.get::<Option<rust_decimal::Decimal>, _>("current_balance").map(Money::new),
        minimum_payment: row.get::<Option<rust_decimal::Decimal>, _>("minimum_payment").map(Money::new),
        currency: currency_str.parse::<Currency>().map_err(|_| CoreError::UnsupportedCurrency)?,
        status: statement_status_from_str(&status_str)?,
        is_fully_paid: row.get("is_fully_paid"),
        source_file_path: row.get("source_file_path"),
    })
}
