//! Pure domain logic for the statement-ingestion/rule-engine service: entity
//! types, the error taxonomy, currency conversion math, and the rule
//! validator/evaluator. No I/O; see `store` for persistence and `worker` for
//! orchestration.

pub mod conversion;
pub mod error;
pub mod ids;
pub mod model;
pub mod money;
pub mod rules;

pub use error::{CoreError, CoreResult, Sanitized};
pub use money::{Currency, Money};
