//! Atomic importer (spec §4.2, C6): statement + transactions + optional
//! credit-limit mutation, published as a single relational transaction.
//! Either all three land or none do.

use chrono::Utc;
use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::{StatementId, TransactionId};
use creditscan_core::model::{NewCardStatement, NewTransaction};
use creditscan_core::money::{Currency, Money};
use rust_decimal::Decimal;
use sqlx::Row;
use tracing::instrument;

use crate::codec::statement_status_to_str;
use crate::error::map_sqlx_import;
use crate::pool::Pool;

pub struct ImportInput {
    pub statement: NewCardStatement,
    pub transactions: Vec<NewTransaction>,
    /// The card's credit limit, converted into the card's reference
    /// currency, if the extraction carried one (spec §4.3 step 5).
    pub new_limit_in_card_currency: Option<(Money, Currency)>,
}

pub struct ImportOutput {
    pub statement_id: StatementId,
    pub transaction_ids: Vec<TransactionId>,
}

#[instrument(skip(pool, input))]
pub async fn atomic_import(pool: &Pool, input: ImportInput) -> CoreResult<ImportOutput> {
    input
        .statement
        .check_invariants()
        .map_err(|source| CoreError::AtomicImportFailed { source: source.into() })?;

    let mut tx = pool.begin().await.map_err(map_sqlx_import)?;

    let statement_id = StatementId::new();
    let statement = &input.statement;
    sqlx::query(
        r#"
        insert into card_statements
            (id, card_id, user_id, period_start, period_end, close_date, due_date,
             previous_balance, current_balance, minimum_payment, currency, status,
             is_fully_paid, source_file_path)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(statement_id.as_uuid())
    .bind(statement.card_id.as_uuid())
    .bind(statement.user_id.as_uuid())
    .bind(statement.period_start)
    .bind(statement.period_end)
    .bind(statement.close_date)
    .bind(statement.due_date)
    .bind(statement.previous_balance.map(|m| m.as_decimal()))
    .bind(statement.current_balance.map(|m| m.as_decimal()))
    .bind(statement.minimum_payment.map(|m| m.as_decimal()))
    .bind(statement.currency.to_string())
    .bind(statement_status_to_str(statement.status))
    .bind(statement.is_fully_paid)
    .bind(&statement.source_file_path)
    .execute(&mut *tx)
    .await
    .map_err(map_sqlx_import)?;

    let mut transaction_ids = Vec::with_capacity(input.transactions.len());
    for new_txn in &input.transactions {
        let id = TransactionId::new();
        sqlx::query(
            r#"
            insert into transactions
                (id, statement_id, user_id, txn_date, payee, description, amount, currency,
                 coupon, installment_cur, installment_tot)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id.as_uuid())
        .bind(statement_id.as_uuid())
        .bind(statement.user_id.as_uuid())
        .bind(new_txn.txn_date)
        .bind(&new_txn.payee)
        .bind(&new_txn.description)
        .bind(new_txn.amount.as_decimal())
        .bind(new_txn.currency.to_string())
        .bind(&new_txn.coupon)
        .bind(new_txn.installment_cur)
        .bind(new_txn.installment_tot)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_import)?;
        transaction_ids.push(id);
    }

    if let Some((new_limit, limit_currency)) = input.new_limit_in_card_currency {
        let current_limit: Option<Decimal> =
            sqlx::query("select credit_limit from credit_cards where id = $1 for update")
                .bind(statement.card_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_import)?
                .get(0);

        // spec §4.2: only mutate (and only then touch limit_source/
        // limit_last_updated_at) if the new value actually differs.
        if current_limit != Some(new_limit.as_decimal()) {
            sqlx::query(
                r#"update credit_cards
                   set credit_limit = $1, limit_currency = $2, limit_source = 'statement',
                       limit_last_updated_at = $3
                   where id = $4"#,
            )
            .bind(new_limit.as_decimal())
            .bind(limit_currency.to_string())
            .bind(Utc::now())
            .bind(statement.card_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_import)?;
        }
    }

    tx.commit().await.map_err(map_sqlx_import)?;

    Ok(ImportOutput { statement_id, transaction_ids })
}
