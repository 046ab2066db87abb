use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Currency;

/// The only pair this system converts (spec §3): `(USD, ARS)`, canonically
/// from-USD-to-ARS. The reverse direction is derived by inverting the
/// spread, not by storing a second row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
}

impl CurrencyPair {
    pub const USD_ARS: Self = Self {
        base: Currency::Usd,
        quote: Currency::Ars,
    };

    /// Whether this is the canonical `(USD, ARS)` pair or its reverse.
    pub fn is_supported(&self) -> bool {
        matches!(
            (self.base, self.quote),
            (Currency::Usd, Currency::Ars) | (Currency::Ars, Currency::Usd)
        )
    }

    /// The canonical storage key: quotes are always keyed by `(USD, ARS)`
    /// regardless of which conversion direction a caller asked for.
    pub fn canonical(&self) -> Self {
        Self::USD_ARS
    }
}

/// A `(buy, sell)` quote for [`CurrencyPair::USD_ARS`] on a specific date.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub buy: Decimal,
    pub sell: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub pair: CurrencyPair,
    pub rate_date: NaiveDate,
    pub quote: Quote,
}
