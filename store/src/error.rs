//! Maps `sqlx` failures onto the core error taxonomy so repository methods
//! can return `creditscan_core::CoreResult` directly.

use creditscan_core::CoreError;

pub(crate) fn map_sqlx(err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::RowNotFound => CoreError::NotFound,
        other => CoreError::Storage { source: other.into() },
    }
}

pub(crate) fn map_sqlx_import(err: sqlx::Error) -> CoreError {
    CoreError::AtomicImportFailed { source: err.into() }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}
