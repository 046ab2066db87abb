//! Evaluates one [`Rule`] against one [`Transaction`] (spec §4.7, C10).

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::model::{Field, LogicalOperator, Operator, Rule, RuleCondition, Transaction};

/// Evaluates `rule` against `txn`, returning whether it matches.
///
/// Conditions are sorted by `position` and combined strictly left to right:
/// the first condition's result seeds an accumulator, then each subsequent
/// condition combines in as `accumulator OP_i result_i`, where `OP_i` is
/// that condition's own `logical_operator`. There's no operator precedence.
pub fn evaluate_rule(rule: &Rule, txn: &Transaction) -> bool {
    let mut sorted: Vec<&RuleCondition> = rule.conditions.iter().collect();
    sorted.sort_by_key(|c| c.position);

    let mut conditions = sorted.into_iter();
    let first = match conditions.next() {
        Some(c) => c,
        // Validated rules always have >= 1 condition; an empty rule matches
        // nothing rather than panicking.
        None => return false,
    };

    let mut accumulator = evaluate_condition(first, txn);
    for condition in conditions {
        let result = evaluate_condition(condition, txn);
        accumulator = match condition.logical_operator {
            LogicalOperator::And => accumulator && result,
            LogicalOperator::Or => accumulator || result,
        };
    }
    accumulator
}

/// Evaluates a single condition. A condition whose `value`/`value_secondary`
/// fails to parse for its field's type evaluates to `false` rather than
/// erroring - this keeps evaluation total, so a malformed rule can't crash
/// rule application (spec §4.7, §8 item 5).
fn evaluate_condition(condition: &RuleCondition, txn: &Transaction) -> bool {
    match condition.field {
        Field::Payee => evaluate_text(condition, &txn.payee),
        Field::Description => evaluate_text(condition, &txn.description),
        Field::Amount => evaluate_amount(condition, txn.amount.as_decimal()),
        Field::Date => evaluate_date(condition, txn.txn_date),
    }
}

fn evaluate_text(condition: &RuleCondition, actual: &str) -> bool {
    let actual = actual.to_lowercase();
    let expected = condition.value.to_lowercase();
    match condition.operator {
        Operator::Contains => actual.contains(&expected),
        Operator::Equals => actual == expected,
        _ => false,
    }
}

fn evaluate_amount(condition: &RuleCondition, actual: Decimal) -> bool {
    let Ok(value) = Decimal::from_str(condition.value.trim()) else {
        return false;
    };
    match condition.operator {
        Operator::Equals => actual == value,
        Operator::Gt => actual > value,
        Operator::Lt => actual < value,
        Operator::Between => {
            let Some(secondary) = &condition.value_secondary else {
                return false;
            };
            let Ok(upper) = Decimal::from_str(secondary.trim()) else {
                return false;
            };
            let (low, high) = order(value, upper);
            actual >= low && actual <= high
        }
        _ => false,
    }
}

fn evaluate_date(condition: &RuleCondition, actual: NaiveDate) -> bool {
    let Ok(value) = NaiveDate::parse_from_str(condition.value.trim(), "%Y-%m-%d") else {
        return false;
    };
    match condition.operator {
        Operator::Equals => actual == value,
        Operator::Before => actual < value,
        Operator::After => actual > value,
        Operator::Between => {
            let Some(secondary) = &condition.value_secondary else {
                return false;
            };
            let Ok(upper) = NaiveDate::parse_from_str(secondary.trim(), "%Y-%m-%d") else {
                return false;
            };
            let (low, high) = order(value, upper);
            actual >= low && actual <= high
        }
        _ => false,
    }
}

fn order<T: PartialOrd>(a: T, b: T) -> (T, T) {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => (b, a),
        _ => (a, b),
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::ids::{RuleId, StatementId, TagId, TransactionId, UserId};
    use crate::model::{RuleAction, RuleActionType};
    use crate::money::{Currency, Money};

    fn txn(payee: &str, amount: Decimal, date: &str) -> Transaction {
        Transaction {
            id: TransactionId::from_uuid(Uuid::new_v4()),
            statement_id: StatementId::from_uuid(Uuid::new_v4()),
            user_id: UserId::from_uuid(Uuid::new_v4()),
            txn_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            payee: payee.to_owned(),
            description: String::new(),
            amount: Money::new(amount),
            currency: Currency::Usd,
            coupon: None,
            installment_cur: None,
            installment_tot: None,
        }
    }

    fn condition(
        position: u32,
        field: Field,
        operator: Operator,
        value: &str,
        secondary: Option<&str>,
        logical_operator: LogicalOperator,
    ) -> RuleCondition {
        RuleCondition {
            rule_id: RuleId::new(),
            position,
            field,
            operator,
            value: value.to_owned(),
            value_secondary: secondary.map(str::to_owned),
            logical_operator,
        }
    }

    fn rule(conditions: Vec<RuleCondition>) -> Rule {
        Rule {
            id: RuleId::new(),
            user_id: UserId::new(),
            name: "test".to_owned(),
            is_active: true,
            conditions,
            actions: vec![RuleAction {
                rule_id: RuleId::new(),
                kind: RuleActionType::AddTag,
                tag_id: TagId::new(),
            }],
        }
    }

    /// Scenario S4: `payee contains "coffee" AND amount between 1 and 50`.
    #[test]
    fn s4_conjunction_matches_both_sides() {
        let r = rule(vec![
            condition(0, Field::Payee, Operator::Contains, "coffee", None, LogicalOperator::And),
            condition(1, Field::Amount, Operator::Between, "1", Some("50"), LogicalOperator::And),
        ]);

        assert!(evaluate_rule(&r, &txn("Blue Bottle Coffee", dec!(12.50), "2026-01-05")));
        assert!(!evaluate_rule(&r, &txn("Blue Bottle Coffee", dec!(99), "2026-01-05")));
        assert!(!evaluate_rule(&r, &txn("Gas Station", dec!(12.50), "2026-01-05")));
    }

    /// Scenario S5: `amount gt 100 OR payee equals "Acme"`, left to right
    /// with no precedence - T1 matches via the right disjunct, T2 via the
    /// left.
    #[test]
    fn s5_disjunction_short_circuit_semantics() {
        let r = rule(vec![
            condition(0, Field::Amount, Operator::Gt, "100", None, LogicalOperator::And),
            condition(1, Field::Payee, Operator::Equals, "Acme", None, LogicalOperator::Or),
        ]);

        let t1 = txn("Acme", dec!(50), "2026-01-05");
        let t2 = txn("Other", dec!(200), "2026-01-05");
        assert!(evaluate_rule(&r, &t1));
        assert!(evaluate_rule(&r, &t2));
    }

    #[test]
    fn unparseable_value_evaluates_false_not_panic() {
        let r = rule(vec![condition(
            0,
            Field::Amount,
            Operator::Gt,
            "not-a-number",
            None,
            LogicalOperator::And,
        )]);
        assert!(!evaluate_rule(&r, &txn("Anyone", dec!(1000), "2026-01-05")));
    }

    #[test]
    fn text_match_is_case_insensitive() {
        let r = rule(vec![condition(
            0,
            Field::Payee,
            Operator::Equals,
            "ACME",
            None,
            LogicalOperator::And,
        )]);
        assert!(evaluate_rule(&r, &txn("acme", dec!(1), "2026-01-05")));
    }

    #[test]
    fn date_between_is_inclusive() {
        let r = rule(vec![condition(
            0,
            Field::Date,
            Operator::Between,
            "2026-01-01",
            Some("2026-01-31"),
            LogicalOperator::And,
        )]);
        assert!(evaluate_rule(&r, &txn("x", dec!(1), "2026-01-01")));
        assert!(evaluate_rule(&r, &txn("x", dec!(1), "2026-01-31")));
        assert!(!evaluate_rule(&r, &txn("x", dec!(1), "2026-02-01")));
    }
}
