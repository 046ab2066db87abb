use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{TagId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub user_id: UserId,
    pub label: String,
    pub color: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tag {
    #[inline]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}
