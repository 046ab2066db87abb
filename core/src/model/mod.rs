//! The entities from spec §3, as plain Rust structs. Nothing here touches
//! I/O; `store` maps these to and from SQL rows.

mod card;
mod exchange_rate;
mod rule;
mod statement;
mod tag;
mod transaction;
mod upload_job;

pub use card::{CreditCard, LimitSource};
pub use exchange_rate::{CurrencyPair, ExchangeRate, Quote};
pub use rule::{Field, LogicalOperator, Operator, Rule, RuleAction, RuleActionType, RuleCondition};
pub use statement::{CardStatement, NewCardStatement, StatementInvariantError, StatementStatus};
pub use tag::Tag;
pub use transaction::{NewTransaction, Transaction};
pub use upload_job::{JobStatus, UploadJob};
