//! Rule repository (spec §4.7, C9). Validation is delegated to
//! `creditscan_core::rules::validate_rule`, which is pure; this module's job
//! is resolving the tag-liveness set it needs and persisting the result.

use std::collections::HashMap;

use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::{RuleId, TagId, UserId};
use creditscan_core::model::{Rule, RuleAction, RuleActionType, RuleCondition};
use creditscan_core::rules::{validate_rule, RuleActionDraft, RuleConditionDraft};
use sqlx::Row;
use tracing::instrument;

use crate::codec::{field_from_str, field_to_str, logical_operator_from_str, logical_operator_to_str, operator_from_str, operator_to_str};
use crate::error::map_sqlx;
use crate::pool::Pool;
use crate::tags;

/// Validates and persists a new rule. `conditions`/`actions` are the
/// caller's unpositioned drafts; positions are assigned densely by the
/// validator.
#[instrument(skip(pool, conditions, actions))]
pub async fn create(
    pool: &Pool,
    user_id: UserId,
    name: &str,
    conditions: Vec<RuleConditionDraft>,
    actions: Vec<RuleActionDraft>,
) -> CoreResult<Rule> {
    let candidate_tag_ids: Vec<TagId> = actions.iter().map(|a| a.tag_id).collect();
    let live_owned = tags::live_owned_tag_ids(pool, user_id, &candidate_tag_ids).await?;

    let rule_id = RuleId::new();
    let (conditions, actions) = validate_rule(rule_id, &conditions, &actions, &live_owned)?;

    let mut tx = pool.begin().await.map_err(map_sqlx)?;

    sqlx::query("insert into rules (id, user_id, name, is_active) values ($1, $2, $3, true)")
        .bind(rule_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

    for condition in &conditions {
        sqlx::query(
            r#"insert into rule_conditions
                (rule_id, position, field, operator, value, value_secondary, logical_operator)
               values ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(rule_id.as_uuid())
        .bind(condition.position as i32)
        .bind(field_to_str(condition.field))
        .bind(operator_to_str(condition.operator))
        .bind(&condition.value)
        .bind(&condition.value_secondary)
        .bind(logical_operator_to_str(condition.logical_operator))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
    }

    for (position, action) in actions.iter().enumerate() {
        sqlx::query("insert into rule_actions (rule_id, position, kind, tag_id) values ($1, $2, 'add_tag', $3)")
            .bind(rule_id.as_uuid())
            .bind(position as i32)
            .bind(action.tag_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
    }

    tx.commit().await.map_err(map_sqlx)?;

    Ok(Rule {
        id: rule_id,
        user_id,
        name: name.to_owned(),
        is_active: true,
        conditions,
        actions,
    })
}

/// Updates a rule in place. `name`/`is_active` are applied when `Some`;
/// `conditions`/`actions` are re-validated and replace the existing set when
/// `Some` - spec §4.7: "validation runs on create and on update when the
/// list is present", and spec §3: "no empty condition/action lists on
/// update either", so a `Some(vec![])` is rejected exactly as `create` would
/// reject it. Whichever of `conditions`/`actions` is left `None` is
/// re-validated against the rule's existing set, so e.g. updating only the
/// actions still re-checks the field/operator matrix on the untouched
/// conditions.
#[instrument(skip(pool, conditions, actions))]
pub async fn update_rule(
    pool: &Pool,
    id: RuleId,
    user_id: UserId,
    name: Option<&str>,
    is_active: Option<bool>,
    conditions: Option<Vec<RuleConditionDraft>>,
    actions: Option<Vec<RuleActionDraft>>,
) -> CoreResult<Rule> {
    let existing = get_owned(pool, id, user_id).await?;

    let conditions = conditions.unwrap_or_else(|| existing.conditions.iter().map(condition_to_draft).collect());
    let actions = actions.unwrap_or_else(|| existing.actions.iter().map(action_to_draft).collect());

    let candidate_tag_ids: Vec<TagId> = actions.iter().map(|a| a.tag_id).collect();
    let live_owned = tags::live_owned_tag_ids(pool, user_id, &candidate_tag_ids).await?;
    let (conditions, actions) = validate_rule(id, &conditions, &actions, &live_owned)?;

    let name = name.unwrap_or(&existing.name);
    let is_active = is_active.unwrap_or(existing.is_active);

    let mut tx = pool.begin().await.map_err(map_sqlx)?;

    let result = sqlx::query("update rules set name = $1, is_active = $2 where id = $3 and user_id = $4")
        .bind(name)
        .bind(is_active)
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }

    sqlx::query("delete from rule_conditions where rule_id = $1")
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
    sqlx::query("delete from rule_actions where rule_id = $1")
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

    for condition in &conditions {
        sqlx::query(
            r#"insert into rule_conditions
                (rule_id, position, field, operator, value, value_secondary, logical_operator)
               values ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id.as_uuid())
        .bind(condition.position as i32)
        .bind(field_to_str(condition.field))
        .bind(operator_to_str(condition.operator))
        .bind(&condition.value)
        .bind(&condition.value_secondary)
        .bind(logical_operator_to_str(condition.logical_operator))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
    }

    for (position, action) in actions.iter().enumerate() {
        sqlx::query("insert into rule_actions (rule_id, position, kind, tag_id) values ($1, $2, 'add_tag', $3)")
            .bind(id.as_uuid())
            .bind(position as i32)
            .bind(action.tag_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
    }

    tx.commit().await.map_err(map_sqlx)?;

    Ok(Rule {
        id,
        user_id,
        name: name.to_owned(),
        is_active,
        conditions,
        actions,
    })
}

fn condition_to_draft(condition: &RuleCondition) -> RuleConditionDraft {
    RuleConditionDraft {
        field: condition.field,
        operator: condition.operator,
        value: condition.value.clone(),
        value_secondary: condition.value_secondary.clone(),
        logical_operator: condition.logical_operator,
    }
}

fn action_to_draft(action: &RuleAction) -> RuleActionDraft {
    RuleActionDraft { tag_id: action.tag_id }
}

#[instrument(skip(pool))]
pub async fn get_owned(pool: &Pool, id: RuleId, user_id: UserId) -> CoreResult<Rule> {
    let row = sqlx::query("select id, user_id, name, is_active from rules where id = $1")
        .bind(id.as_uuid())
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(CoreError::NotFound)?;

    let owner = UserId::from_uuid(row.get("user_id"));
    if owner != user_id {
        return Err(CoreError::NotOwned);
    }

    let conditions = load_conditions(pool, id).await?;
    let actions = load_actions(pool, id).await?;

    Ok(Rule {
        id,
        user_id: owner,
        name: row.get("name"),
        is_active: row.get("is_active"),
        conditions,
        actions,
    })
}

/// Every active rule owned by `user_id`, with conditions and actions eager
/// loaded - exactly what the rule applier (C11) needs per application run.
#[instrument(skip(pool))]
pub async fn list_active_for_user(pool: &Pool, user_id: UserId) -> CoreResult<Vec<Rule>> {
    let rule_rows = sqlx::query("select id, user_id, name, is_active from rules where user_id = $1 and is_active")
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;

    let mut rules = Vec::with_capacity(rule_rows.len());
    for row in rule_rows {
        let id = RuleId::from_uuid(row.get("id"));
        rules.push(Rule {
            id,
            user_id: UserId::from_uuid(row.get("user_id")),
            name: row.get("name"),
            is_active: row.get("is_active"),
            conditions: Vec::new(),
            actions: Vec::new(),
        });
    }

    if rules.is_empty() {
        return Ok(rules);
    }

    let rule_ids: Vec<uuid::Uuid> = rules.iter().map(|r| r.id.as_uuid()).collect();
    let mut conditions_by_rule = load_conditions_for_rules(pool, &rule_ids).await?;
    let mut actions_by_rule = load_actions_for_rules(pool, &rule_ids).await?;

    for rule in &mut rules {
        rule.conditions = conditions_by_rule.remove(&rule.id).unwrap_or_default();
        rule.actions = actions_by_rule.remove(&rule.id).unwrap_or_default();
    }

    Ok(rules)
}

async fn load_conditions(pool: &Pool, rule_id: RuleId) -> CoreResult<Vec<RuleCondition>> {
    let rows = sqlx::query(
        r#"select rule_id, position, field, operator, value, value_secondary, logical_operator
           from rule_conditions where rule_id = $1 order by position"#,
    )
    .bind(rule_id.as_uuid())
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;
    rows.into_iter().map(row_to_condition).collect()
}

async fn load_actions(pool: &Pool, rule_id: RuleId) -> CoreResult<Vec<RuleAction>> {
    let rows = sqlx::query("select rule_id, tag_id from rule_actions where rule_id = $1 order by position")
        .bind(rule_id.as_uuid())
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;
    Ok(rows.into_iter().map(row_to_action).collect())
}

async fn load_conditions_for_rules(
    pool: &Pool,
    rule_ids: &[uuid::Uuid],
) -> CoreResult<HashMap<RuleId, Vec<RuleCondition>>> {
    let rows = sqlx::query(
        r#"select rule_id, position, field, operator, value, value_secondary, logical_operator
           from rule_conditions where rule_id = any($1) order by rule_id, position"#,
    )
    .bind(rule_ids)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx)?;

    let mut by_rule: HashMap<RuleId, Vec<RuleCondition>> = HashMap::new();
    for row in rows {
        let condition = row_to_condition(row)?;
        by_rule.entry(condition.rule_id).or_default().push(condition);
    }
    Ok(by_rule)
}

async fn load_actions_for_rules(pool: &Pool, rule_ids: &[uuid::Uuid]) -> CoreResult<HashMap<RuleId, Vec<RuleAction>>> {
    let rows = sqlx::query("select rule_id, tag_id from rule_actions where rule_id = any($1) order by rule_id, position")
        .bind(rule_ids)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;

    let mut by_rule: HashMap<RuleId, Vec<RuleAction>> = HashMap::new();
    for row in rows {
        let action = row_to_action(row);
        by_rule.entry(action.rule_id).or_default().push(action);
    }
    Ok(by_rule)
}

fn row_to_condition(row: sqlx::postgres::PgRow) -> CoreResult<RuleCondition> {
    let field_str: String = row.get("field");
    let operator_str: String = row.get("operator");
    let logical_str: String = row.get("logical_operator");
    Ok(RuleCondition {
        rule_id: RuleId::from_uuid(row.get("rule_id")),
        position: {
            let position: i32 = row.get("position");
            position as u32
        },
        field: field_from_str(&field_str)?,
        operator: operator_from_str(&operator_str)?,
        value: row.get("value"),
        value_secondary: row.get("value_secondary"),
        logical_operator: logical_operator_from_str(&logical_str)?,
    })
}

fn row_to_action(row: sqlx::postgres::PgRow) -> RuleAction {
    RuleAction {
        rule_id: RuleId::from_uuid(row.get("rule_id")),
        kind: RuleActionType::AddTag,
        tag_id: TagId::from_uuid(row.get("tag_id")),
    }
}
