//! Plain-text encodings for the enums in `creditscan_core::model` as stored
//! in `text`/`check`-constrained columns (see `migrations/0001_init.sql`).
//! Kept in `store` rather than `core` since it's a storage-format concern,
//! not a domain one.

use creditscan_core::error::CoreError;
use creditscan_core::model::{Field, JobStatus, LimitSource, LogicalOperator, Operator, StatementStatus};

pub(crate) fn job_status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "PENDING",
        JobStatus::Processing => "PROCESSING",
        JobStatus::Completed => "COMPLETED",
        JobStatus::Partial => "PARTIAL",
        JobStatus::Failed => "FAILED",
    }
}

pub(crate) fn job_status_from_str(s: &str) -> Result<JobStatus, CoreError> {
    match s {
        "PENDING" => Ok(JobStatus::Pending),
        "PROCESSING" => Ok(JobStatus::Processing),
        "COMPLETED" => Ok(JobStatus::Completed),
        "PARTIAL" => Ok(JobStatus::Partial),
        "FAILED" => Ok(JobStatus::Failed),
        other => Err(corrupt_row("upload_jobs.status", other)),
    }
}

pub(crate) fn statement_status_to_str(status: StatementStatus) -> &'static str {
    match status {
        StatementStatus::Draft => "draft",
        StatementStatus::Active => "active",
        StatementStatus::Paid => "paid",
    }
}

pub(crate) fn statement_status_from_str(s: &str) -> Result<StatementStatus, CoreError> {
    match s {
        "draft" => Ok(StatementStatus::Draft),
        "active" => Ok(StatementStatus::Active),
        "paid" => Ok(StatementStatus::Paid),
        other => Err(corrupt_row("card_statements.status", other)),
    }
}

pub(crate) fn limit_source_to_str(source: LimitSource) -> &'static str {
    match source {
        LimitSource::Manual => "manual",
        LimitSource::Statement => "statement",
    }
}

pub(crate) fn limit_source_from_str(s: &str) -> Result<LimitSource, CoreError> {
    match s {
        "manual" => Ok(LimitSource::Manual),
        "statement" => Ok(LimitSource::Statement),
        other => Err(corrupt_row("credit_cards.limit_source", other)),
    }
}

pub(crate) fn field_to_str(field: Field) -> &'static str {
    match field {
        Field::Payee => "payee",
        Field::Description => "description",
        Field::Amount => "amount",
        Field::Date => "date",
    }
}

pub(crate) fn field_from_str(s: &str) -> Result<Field, CoreError> {
    match s {
        "payee" => Ok(Field::Payee),
        "description" => Ok(Field::Description),
        "amount" => Ok(Field::Amount),
        "date" => Ok(Field::Date),
        other => Err(corrupt_row("rule_conditions.field", other)),
    }
}

pub(crate) fn operator_to_str(operator: Operator) -> &'static str {
    match operator {
        Operator::Contains => "contains",
        Operator::Equals => "equals",
        Operator::Gt => "gt",
        Operator::Lt => "lt",
        Operator::Between => "between",
        Operator::Before => "before",
        Operator::After => "after",
    }
}

pub(crate) fn operator_from_str(s: &str) -> Result<Operator, CoreError> {
    match s {
        "contains" => Ok(Operator::Contains),
        "equals" => Ok(Operator::Equals),
        "gt" => Ok(Operator::Gt),
        "lt" => Ok(Operator::Lt),
        "between" => Ok(Operator::Between),
        "before" => Ok(Operator::Before),
        "after" => Ok(Operator::After),
        other => Err(corrupt_row("rule_conditions.operator", other)),
    }
}

pub(crate) fn logical_operator_to_str(op: LogicalOperator) -> &'static str {
    match op {
        LogicalOperator::And => "AND",
        LogicalOperator::Or => "OR",
    }
}

pub(crate) fn logical_operator_from_str(s: &str) -> Result<LogicalOperator, CoreError> {
    match s {
        "AND" => Ok(LogicalOperator::And),
        "OR" => Ok(LogicalOperator::Or),
        other => Err(corrupt_row("rule_conditions.logical_operator", other)),
    }
}

/// A stored enum column held a value outside its known set. This only
/// happens if the schema's `check` constraint and this module's match arms
/// drift apart - treat it as a storage defect, not a validation error.
fn corrupt_row(column: &str, value: &str) -> CoreError {
    CoreError::Storage {
        source: anyhow::anyhow!("unrecognized value {value:?} in column {column}"),
    }
}
