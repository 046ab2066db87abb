//! The rule validator (spec §4.7, C9) and evaluator (spec §4.7, C10).

pub mod evaluator;
pub mod validator;

pub use evaluator::evaluate_rule;
pub use validator::{validate_rule, RuleActionDraft, RuleConditionDraft};
