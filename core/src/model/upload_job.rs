use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CardId, JobId, StatementId, UserId};

/// The upload-job state graph from spec §4.1:
///
/// ```text
/// PENDING ──► PROCESSING ──► COMPLETED
///                       ├──► PARTIAL
///                       └──► FAILED
/// PROCESSING ──► PENDING     (crash resumption only, when stale)
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    /// `{COMPLETED, PARTIAL, FAILED}` - once reached, the job row is
    /// immutable (spec §4.1).
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }

    /// Whether `self -> to` is a legal edge in the state graph above. Used
    /// by `store`'s conditional `UPDATE ... WHERE status = $from` as a
    /// sanity check before issuing the query, and by tests asserting the
    /// graph's shape.
    pub fn can_transition_to(self, to: Self) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Partial)
                | (Processing, Failed)
                | (Processing, Pending)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: JobId,
    pub user_id: UserId,
    pub card_id: CardId,
    pub file_hash: String,
    pub file_path: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub statement_id: Option<StatementId>,
}
