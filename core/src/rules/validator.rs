//! Validates a rule's conditions and actions against the field/operator
//! matrix from spec §3 and §4.7. Pure: tag liveness/ownership is resolved by
//! the caller (`store`, which owns the tag table) and passed in as a set of
//! ids known to be live and owned, keeping this module free of I/O.

use std::collections::HashSet;

use crate::{
    error::CoreError,
    ids::{RuleId, TagId},
    model::{Field, LogicalOperator, Operator, RuleAction, RuleActionType, RuleCondition},
};

/// An unvalidated, unpositioned condition, as a caller would build it from a
/// create/update request before positions are assigned.
#[derive(Clone, Debug)]
pub struct RuleConditionDraft {
    pub field: Field,
    pub operator: Operator,
    pub value: String,
    pub value_secondary: Option<String>,
    pub logical_operator: LogicalOperator,
}

#[derive(Clone, Debug)]
pub struct RuleActionDraft {
    pub tag_id: TagId,
}

/// Whether `(field, operator)` is a legal combination per spec §3's matrix:
///
/// - `payee`/`description`: `contains`, `equals`
/// - `amount`: `equals`, `gt`, `lt`, `between`
/// - `date`: `equals`, `before`, `after`, `between`
///
/// This spec deliberately does not accept `gte`/`lte` even though the
/// underlying data model could represent them - see spec §9's open question.
pub fn operator_allowed(field: Field, operator: Operator) -> bool {
    use Field::*;
    use Operator::*;
    matches!(
        (field, operator),
        (Payee | Description, Contains | Equals)
            | (Amount, Equals | Gt | Lt | Between)
            | (Date, Equals | Before | After | Between)
    )
}

/// Validates and builds the positioned conditions/actions for a rule.
/// `live_owned_tag_ids` must contain exactly the tag ids from
/// [`RuleActionDraft::tag_id`] that reference a live tag owned by the rule's
/// user - computed by the caller with a single query before calling this.
///
/// Returns [`CoreError::InvalidRule`] on the first violation found, in the
/// order: non-empty conditions, non-empty actions, field/operator matrix,
/// `between` requires `value_secondary`, action tags are live and owned.
pub fn validate_rule(
    rule_id: RuleId,
    conditions: &[RuleConditionDraft],
    actions: &[RuleActionDraft],
    live_owned_tag_ids: &HashSet<TagId>,
) -> Result<(Vec<RuleCondition>, Vec<RuleAction>), CoreError> {
    if conditions.is_empty() {
        return Err(CoreError::InvalidRule {
            reason: "a rule must have at least one condition".to_owned(),
        });
    }
    if actions.is_empty() {
        return Err(CoreError::InvalidRule {
            reason: "a rule must have at least one action".to_owned(),
        });
    }

    for draft in conditions {
        if !operator_allowed(draft.field, draft.operator) {
            return Err(CoreError::InvalidRule {
                reason: format!(
                    "operator {:?} is not valid for field {:?}",
                    draft.operator, draft.field
                ),
            });
        }
        if draft.operator == Operator::Between && draft.value_secondary.is_none() {
            return Err(CoreError::InvalidRule {
                reason: "`between` requires value_secondary".to_owned(),
            });
        }
    }

    for draft in actions {
        if !live_owned_tag_ids.contains(&draft.tag_id) {
            return Err(CoreError::InvalidRule {
                reason: format!("tag {} is not a live, owned tag", draft.tag_id),
            });
        }
    }

    // Positions are renumbered densely 0..n-1 on every write (spec §4.7).
    let conditions = conditions
        .iter()
        .enumerate()
        .map(|(position, draft)| RuleCondition {
            rule_id,
            position: position as u32,
            field: draft.field,
            operator: draft.operator,
            value: draft.value.clone(),
            value_secondary: draft.value_secondary.clone(),
            logical_operator: draft.logical_operator,
        })
        .collect();

    let actions = actions
        .iter()
        .map(|draft| RuleAction {
            rule_id,
            kind: RuleActionType::AddTag,
            tag_id: draft.tag_id,
        })
        .collect();

    Ok((conditions, actions))
}

#[cfg(test)]
mod test {
    use super::*;

    fn draft(field: Field, operator: Operator, value: &str, secondary: Option<&str>) -> RuleConditionDraft {
        RuleConditionDraft {
            field,
            operator,
            value: value.to_owned(),
            value_secondary: secondary.map(str::to_owned),
            logical_operator: LogicalOperator::And,
        }
    }

    #[test]
    fn rejects_empty_conditions() {
        let rule_id = RuleId::new();
        let actions = [RuleActionDraft { tag_id: TagId::new() }];
        let tags: HashSet<_> = actions.iter().map(|a| a.tag_id).collect();
        let err = validate_rule(rule_id, &[], &actions, &tags).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_empty_actions() {
        let rule_id = RuleId::new();
        let conditions = [draft(Field::Payee, Operator::Contains, "coffee", None)];
        let err = validate_rule(rule_id, &conditions, &[], &HashSet::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_gt_on_payee() {
        let rule_id = RuleId::new();
        let conditions = [draft(Field::Payee, Operator::Gt, "5", None)];
        let actions = [RuleActionDraft { tag_id: TagId::new() }];
        let tags: HashSet<_> = actions.iter().map(|a| a.tag_id).collect();
        let err = validate_rule(rule_id, &conditions, &actions, &tags).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_between_without_secondary() {
        let rule_id = RuleId::new();
        let conditions = [draft(Field::Amount, Operator::Between, "1", None)];
        let actions = [RuleActionDraft { tag_id: TagId::new() }];
        let tags: HashSet<_> = actions.iter().map(|a| a.tag_id).collect();
        let err = validate_rule(rule_id, &conditions, &actions, &tags).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { .. }));
    }

    #[test]
    fn rejects_action_on_non_live_tag() {
        let rule_id = RuleId::new();
        let conditions = [draft(Field::Payee, Operator::Contains, "coffee", None)];
        let actions = [RuleActionDraft { tag_id: TagId::new() }];
        let err = validate_rule(rule_id, &conditions, &actions, &HashSet::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { .. }));
    }

    #[test]
    fn positions_renumbered_densely() {
        let rule_id = RuleId::new();
        let conditions = [
            draft(Field::Payee, Operator::Contains, "coffee", None),
            draft(Field::Amount, Operator::Between, "1", Some("50")),
        ];
        let actions = [RuleActionDraft { tag_id: TagId::new() }];
        let tags: HashSet<_> = actions.iter().map(|a| a.tag_id).collect();
        let (built_conditions, _) = validate_rule(rule_id, &conditions, &actions, &tags).unwrap();
        assert_eq!(built_conditions[0].position, 0);
        assert_eq!(built_conditions[1].position, 1);
    }
}
