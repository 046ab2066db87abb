//! Pure currency-conversion math (spec §4.6). Quote *lookup* against the
//! relational rate store lives in `store`; this module only knows how to
//! pick the best candidate out of a set of quotes already in memory, and how
//! to apply a chosen quote to an amount. Keeping both pure makes them cheap
//! to property-test (spec §8 item 4) without a database.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    error::CoreError,
    model::{CurrencyPair, ExchangeRate, Quote},
    money::{Currency, Money},
};

/// Picks the best [`ExchangeRate`] out of `available` for the requested
/// `date`, per spec §4.6's lookup policy:
///
/// 1. Exact date match.
/// 2. Otherwise, the closest earlier-or-later date (ties prefer earlier).
/// 3. If no date was supplied, the latest available quote.
pub fn select_quote(available: &[ExchangeRate], date: Option<NaiveDate>) -> Option<&ExchangeRate> {
    match date {
        Some(date) => {
            if let Some(exact) = available.iter().find(|r| r.rate_date == date) {
                return Some(exact);
            }
            available.iter().min_by_key(|r| {
                let days = (r.rate_date - date).num_days();
                // Ties between an earlier and later candidate at the same
                // absolute distance prefer the earlier one: bias the earlier
                // side's key down by one so it sorts first.
                let bias = if days < 0 { 0 } else { 1 };
                (days.unsigned_abs(), bias)
            })
        }
        None => available.iter().max_by_key(|r| r.rate_date),
    }
}

/// Result of the `ConvertCurrency` external interface (spec §6):
/// `{converted, rate, rate_date}`. `rate_date` is the date the applied
/// quote was stored for, not necessarily the date requested.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvertedAmount {
    pub converted: Money,
    pub rate: Decimal,
    pub rate_date: NaiveDate,
}

/// Converts `amount` from `from` to `to` using `quote`, which the caller
/// must have already looked up for the relevant pair/date via
/// [`select_quote`]. Returns the converted amount and the rate actually
/// applied (1 for the identity case).
///
/// - Identity (`from == to`): rate `1`, amount unchanged.
/// - USD -> ARS: multiply by `quote.sell`.
/// - ARS -> USD: multiply by `1 / quote.buy` (the spread inverts, buy and
///   sell swap roles for the reverse direction).
/// - Any other pair: [`CoreError::UnsupportedCurrency`].
pub fn convert(amount: Money, from: Currency, to: Currency, quote: Quote) -> Result<(Money, Decimal), CoreError> {
    if from == to {
        return Ok((amount, Decimal::ONE));
    }

    let pair = CurrencyPair { base: from, quote: to };
    if !pair.is_supported() {
        return Err(CoreError::UnsupportedCurrency);
    }

    let rate = match (from, to) {
        (Currency::Usd, Currency::Ars) => quote.sell,
        (Currency::Ars, Currency::Usd) => Decimal::ONE / quote.buy,
        _ => unreachable!("checked by is_supported above"),
    };

    let converted = amount
        .checked_mul_rate(rate)
        .ok_or(CoreError::UnsupportedCurrency)?;
    Ok((converted, rate))
}
