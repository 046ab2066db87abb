use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ids::{CardId, UserId},
    money::{Currency, Money},
};

/// Where a card's `credit_limit` was last set from. `statement` limits are
/// overwritten by a later statement only if the extracted value differs
/// (spec §4.2); `manual` limits are only overwritten by the owning user.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSource {
    Manual,
    Statement,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: CardId,
    pub user_id: UserId,
    pub brand: String,
    pub last4: String,
    pub credit_limit: Option<Money>,
    pub limit_currency: Option<Currency>,
    pub limit_source: Option<LimitSource>,
    pub limit_last_updated_at: Option<DateTime<Utc>>,
}
