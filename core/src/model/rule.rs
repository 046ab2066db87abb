use serde::{Deserialize, Serialize};

use crate::ids::{RuleId, TagId, UserId};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Payee,
    Description,
    Amount,
    Date,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Contains,
    Equals,
    Gt,
    Lt,
    Between,
    Before,
    After,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

/// One condition in a [`Rule`], at a fixed `position` in its evaluation
/// order. `logical_operator` is ignored on the first condition (there's
/// nothing to its left to combine with).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub rule_id: RuleId,
    pub position: u32,
    pub field: Field,
    pub operator: Operator,
    pub value: String,
    pub value_secondary: Option<String>,
    pub logical_operator: LogicalOperator,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleActionType {
    AddTag,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    pub rule_id: RuleId,
    #[serde(rename = "type")]
    pub kind: RuleActionType,
    pub tag_id: TagId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub user_id: UserId,
    pub name: String,
    pub is_active: bool,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}
