use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{StatementId, TransactionId, UserId},
    money::{Currency, Money},
};

/// Always owned transitively by the parent statement's user; `user_id` is
/// denormalized onto the row so ownership filters don't need a join.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub statement_id: StatementId,
    pub user_id: UserId,
    pub txn_date: NaiveDate,
    pub payee: String,
    pub description: String,
    /// Signed; positive = charge, negative = payment/credit.
    pub amount: Money,
    pub currency: Currency,
    pub coupon: Option<String>,
    pub installment_cur: Option<i32>,
    pub installment_tot: Option<i32>,
}

/// A not-yet-persisted transaction, as extracted from a statement before the
/// atomic importer assigns it an id and a statement id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub txn_date: NaiveDate,
    pub payee: String,
    pub description: String,
    pub amount: Money,
    pub currency: Currency,
    pub coupon: Option<String>,
    pub installment_cur: Option<i32>,
    pub installment_tot: Option<i32>,
}
