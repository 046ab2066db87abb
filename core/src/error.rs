//! The closed error taxonomy from spec §4.9, plus the sanitization function
//! that turns an internal [`CoreError`] into the short, enum-like message
//! stored on [`crate::model::UploadJob::error_message`].
//!
//! Modeled on the teacher's `BackendApiError`/`BackendErrorKind` split (an
//! internal, chatty error vs. a wire-safe kind+message), simplified: this
//! core never serializes an error code across a wire, so there's no
//! `ErrorKindGenerated`/`error_kind!` macro machinery here, just a closed
//! `enum` and a `Display` impl callers can log with `{:#}`.

use thiserror::Error;

use crate::ids::JobId;

/// Every error kind the core can produce, independent of transport. Callers
/// outside the core (the transport layer) are responsible for mapping
/// [`CoreError::NotOwned`] to a 404 so ownership checks don't leak resource
/// existence - see spec §7.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `(user_id, file_hash)` collided with an existing upload job.
    #[error("duplicate upload: existing job {existing_job_id}")]
    DuplicateFile { existing_job_id: JobId },

    /// The blob store reported a miss for a path the job expected to exist.
    #[error("source file unavailable")]
    BlobUnavailable,

    /// Both the primary and fallback extraction model calls failed.
    #[error("extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    /// Extraction produced usable but incomplete data.
    #[error("extraction partial: {reason}")]
    ExtractionPartial { reason: String },

    /// No exchange rate quote could satisfy the requested lookup.
    #[error("no exchange rate available for the requested date")]
    RateNotFound,

    /// The requested currency pair isn't one this system converts.
    #[error("unsupported currency pair")]
    UnsupportedCurrency,

    /// The atomic import transaction failed after a valid extraction.
    #[error("atomic import failed: {source}")]
    AtomicImportFailed {
        #[source]
        source: anyhow::Error,
    },

    /// A rule-application run raised an error. Never fatal to the job.
    #[error("rule application failed: {source}")]
    RuleApplicationFailed {
        #[source]
        source: anyhow::Error,
    },

    /// The rule validator rejected a create/update request.
    #[error("invalid rule: {reason}")]
    InvalidRule { reason: String },

    /// A statement create/update violated one of its invariants (spec §3:
    /// period ordering, due/close ordering, non-negative balances).
    #[error("invalid statement: {reason}")]
    InvalidStatement { reason: String },

    /// An upload exceeded the size ceiling core enforces independently of
    /// the collaborator's own check.
    #[error("upload too large: {size_bytes} bytes exceeds the {max_bytes}-byte ceiling")]
    UploadTooLarge { size_bytes: u64, max_bytes: u64 },

    /// The requested resource doesn't exist.
    #[error("not found")]
    NotFound,

    /// The resource exists but isn't owned by the caller. The transport
    /// layer MUST map this to the same response as [`CoreError::NotFound`]
    /// unless the endpoint contract explicitly grants a superuser bypass.
    #[error("not owned by caller")]
    NotOwned,

    /// Any other relational-store failure (constraint violation, I/O,
    /// serialization conflict) not covered by a more specific variant.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: anyhow::Error,
    },
}

/// A short, enum-like message safe to show a user or persist on a job row.
/// Never contains a path, credential, or stack frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Sanitized(String);

impl Sanitized {
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Sanitized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl CoreError {
    /// Whether this error terminates a job as `FAILED` (as opposed to one of
    /// the non-terminal or demote-to-`PARTIAL` outcomes the job runner
    /// handles itself, e.g. [`CoreError::RateNotFound`]).
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            Self::BlobUnavailable | Self::ExtractionFailed { .. } | Self::AtomicImportFailed { .. }
        )
    }

    /// Maps this error to the short, user-facing string stored in
    /// `UploadJob::error_message`. Strips everything the source error chain
    /// might have embedded (file paths, HTTP bodies, stack-like detail).
    pub fn sanitize(&self) -> Sanitized {
        let msg = match self {
            Self::DuplicateFile { .. } => "duplicate file",
            Self::BlobUnavailable => "source file unavailable",
            Self::ExtractionFailed { .. } => "could not extract statement data",
            Self::ExtractionPartial { .. } => "statement data was incomplete",
            Self::RateNotFound => "exchange rate unavailable",
            Self::UnsupportedCurrency => "unsupported currency",
            Self::AtomicImportFailed { .. } => "failed to save statement",
            Self::RuleApplicationFailed { .. } => "rule application failed",
            Self::InvalidRule { .. } => "invalid rule",
            Self::InvalidStatement { .. } => "invalid statement",
            Self::UploadTooLarge { .. } => "upload too large",
            Self::NotFound | Self::NotOwned => "not found",
            Self::Storage { .. } => "storage error",
        };
        Sanitized(msg.to_owned())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
