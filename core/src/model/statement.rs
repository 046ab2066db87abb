use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{CardId, StatementId, UserId},
    money::{Currency, Money},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    Draft,
    Active,
    Paid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardStatement {
    pub id: StatementId,
    pub card_id: CardId,
    pub user_id: UserId,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub previous_balance: Option<Money>,
    pub current_balance: Option<Money>,
    pub minimum_payment: Option<Money>,
    pub currency: Currency,
    pub status: StatementStatus,
    pub is_fully_paid: bool,
    pub source_file_path: Option<String>,
}

/// A not-yet-persisted statement, as the job runner builds it from an
/// extraction result before handing it to the atomic importer (spec §4.2).
/// Carries the same fields as [`CardStatement`] minus the id the store
/// assigns on insert.
#[derive(Clone, Debug, PartialEq)]
pub struct NewCardStatement {
    pub card_id: CardId,
    pub user_id: UserId,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub previous_balance: Option<Money>,
    pub current_balance: Option<Money>,
    pub minimum_payment: Option<Money>,
    pub currency: Currency,
    pub status: StatementStatus,
    pub is_fully_paid: bool,
    pub source_file_path: Option<String>,
}

impl NewCardStatement {
    /// Mirrors [`CardStatement::check_invariants`] for a not-yet-persisted
    /// statement.
    pub fn check_invariants(&self) -> Result<(), StatementInvariantError> {
        if let (Some(start), Some(end)) = (self.period_start, self.period_end) {
            if end < start {
                return Err(StatementInvariantError::PeriodOutOfOrder);
            }
        }
        if let (Some(close), Some(due)) = (self.close_date, self.due_date) {
            if due < close {
                return Err(StatementInvariantError::DueBeforeClose);
            }
        }
        for balance in [&self.previous_balance, &self.current_balance, &self.minimum_payment] {
            if let Some(balance) = balance {
                if balance.is_negative() {
                    return Err(StatementInvariantError::NegativeBalance);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum StatementInvariantError {
    #[error("period_end must be >= period_start")]
    PeriodOutOfOrder,
    #[error("due_date must be >= close_date")]
    DueBeforeClose,
    #[error("balances must be non-negative")]
    NegativeBalance,
}

impl CardStatement {
    /// Checks the invariants from spec §3: `period_end >= period_start` when
    /// both set, `due_date >= close_date` when both set, balances
    /// non-negative. Called before every insert/update.
    pub fn check_invariants(&self) -> Result<(), StatementInvariantError> {
        if let (Some(start), Some(end)) = (self.period_start, self.period_end) {
            if end < start {
                return Err(StatementInvariantError::PeriodOutOfOrder);
            }
        }
        if let (Some(close), Some(due)) = (self.close_date, self.due_date) {
            if due < close {
                return Err(StatementInvariantError::DueBeforeClose);
            }
        }
        for balance in [
            &self.previous_balance,
            &self.current_balance,
            &self.minimum_payment,
        ] {
            if let Some(balance) = balance {
                if balance.is_negative() {
                    return Err(StatementInvariantError::NegativeBalance);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    fn base() -> CardStatement {
        CardStatement {
            id: StatementId::from_uuid(Uuid::nil()),
            card_id: CardId::from_uuid(Uuid::nil()),
            user_id: UserId::from_uuid(Uuid::nil()),
            period_start: None,
            period_end: None,
            close_date: None,
            due_date: None,
            previous_balance: None,
            current_balance: None,
            minimum_payment: None,
            currency: Currency::Usd,
            status: StatementStatus::Active,
            is_fully_paid: false,
            source_file_path: None,
        }
    }

    #[test]
    fn rejects_period_out_of_order() {
        let mut s = base();
        s.period_start = NaiveDate::from_ymd_opt(2026, 2, 1);
        s.period_end = NaiveDate::from_ymd_opt(2026, 1, 1);
        assert_eq!(
            s.check_invariants(),
            Err(StatementInvariantError::PeriodOutOfOrder)
        );
    }

    #[test]
    fn rejects_negative_balance() {
        let mut s = base();
        s.current_balance = Some(Money::new(rust_decimal::Decimal::from(-1)));
        assert_eq!(
            s.check_invariants(),
            Err(StatementInvariantError::NegativeBalance)
        );
    }

    #[test]
    fn accepts_well_formed_statement() {
        let mut s = base();
        s.period_start = NaiveDate::from_ymd_opt(2026, 1, 1);
        s.period_end = NaiveDate::from_ymd_opt(2026, 1, 31);
        s.close_date = NaiveDate::from_ymd_opt(2026, 2, 1);
        s.due_date = NaiveDate::from_ymd_opt(2026, 2, 20);
        assert!(s.check_invariants().is_ok());
    }
}
