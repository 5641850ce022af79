// src/utils/precision.rs
use rust_decimal::{Decimal, RoundingStrategy};

/// Количество базового актива на `quote_amount` по цене `price`,
/// округлённое до `dp` знаков (банковское округление, как у биржевого `round`).
/// Пример: 50 / 100000 при dp=5 -> 0.0005
pub fn order_quantity(quote_amount: Decimal, price: Decimal, dp: u32) -> Decimal {
    if price.is_zero() {
        return Decimal::ZERO;
    }
    (quote_amount / price).round_dp(dp).normalize()
}

/// Exit price for a fill at `fill_price` with the given markup fraction.
///
/// Rounded to `dp` decimals. For a positive markup the result is never at or
/// below the fill: if nearest rounding would land there, it goes up one tick.
pub fn exit_price(fill_price: Decimal, markup: Decimal, dp: u32) -> Decimal {
    let raw = fill_price * (Decimal::ONE + markup);
    let rounded = raw.round_dp(dp);
    if markup > Decimal::ZERO && rounded <= fill_price {
        return raw.round_dp_with_strategy(dp, RoundingStrategy::ToPositiveInfinity);
    }
    rounded
}

/// Quantity left to sell after the exchange took `commission` out of the
/// bought asset, truncated so it never exceeds what the account holds.
pub fn sellable_quantity(filled: Decimal, commission: Decimal, dp: u32) -> Decimal {
    if commission <= Decimal::ZERO {
        return filled;
    }
    (filled - commission)
        .round_dp_with_strategy(dp, RoundingStrategy::ToZero)
        .max(Decimal::ZERO)
        .normalize()
}
