// src/core/lifecycle.rs
use crate::connectors::traits::ExchangeClient;
use crate::error::TradeError;
use crate::types::{new_client_order_id, OpenedPosition, Side, TimeInForce};
use crate::utils::deadline::{bounded, is_timeout};
use crate::utils::precision::{exit_price, order_quantity, sellable_quantity};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct OrderParams {
    /// Quote side of the symbol. The rest of the symbol is the bought asset,
    /// commission charged in it is not available to the exit leg.
    pub quote_asset: String,
    pub profit_percent: Decimal,
    pub fees_percent: Decimal,
    pub fee_adjusted_exit: bool,
    pub quantity_precision: u32,
    pub price_precision: u32,
    pub settle_delay: Duration,
    pub exchange_timeout: Duration,
}

impl OrderParams {
    /// Наценка exit-ноги. Комиссия добавляется только если включено.
    pub fn exit_markup(&self) -> Decimal {
        if self.fee_adjusted_exit {
            self.profit_percent + self.fees_percent * Decimal::TWO
        } else {
            self.profit_percent
        }
    }

    fn base_asset<'a>(&self, symbol: &'a str) -> Option<&'a str> {
        symbol
            .strip_suffix(self.quote_asset.as_str())
            .filter(|base| !base.is_empty())
    }
}

#[derive(Debug)]
pub enum Outcome {
    Opened(OpenedPosition),
    Failed(TradeError),
}

/// Market entry followed by a resting GTC limit exit.
///
/// A filled entry is never rolled back: if the exit leg fails, the
/// returned error carries the fill so the operator can place it by hand.
pub struct OrderManager {
    exchange: Arc<dyn ExchangeClient>,
    params: OrderParams,
}

impl OrderManager {
    pub fn new(exchange: Arc<dyn ExchangeClient>, params: OrderParams) -> Self {
        Self { exchange, params }
    }

    pub async fn open_position(
        &self,
        symbol: &str,
        last_spot_price: Decimal,
        entry_quote_qty: Decimal,
    ) -> Outcome {
        let p = &self.params;
        let entry_failed = |reason: String| {
            error!("❌ Entry for {} failed: {}", symbol, reason);
            Outcome::Failed(TradeError::EntryRejected {
                symbol: symbol.to_string(),
                reason,
            })
        };

        // 1. Объём с точностью лота
        let quantity = order_quantity(entry_quote_qty, last_spot_price, p.quantity_precision);
        if quantity.is_zero() {
            return entry_failed(format!(
                "quantity for {} at {} rounds to zero",
                entry_quote_qty, last_spot_price
            ));
        }

        // 2. Entry: market buy
        let entry_id = new_client_order_id();
        let report = match bounded(
            p.exchange_timeout,
            "market buy",
            self.exchange
                .place_market_order(symbol, Side::Buy, quantity, &entry_id),
        )
        .await
        {
            Ok(report) => report,
            Err(e) if is_timeout(&e) => {
                return Outcome::Failed(self.entry_unknown(symbol, &entry_id, quantity, e).await)
            }
            Err(e) => return entry_failed(format!("{:#}", e)),
        };

        let Some((fill_price, filled_qty)) = report.average_fill() else {
            return entry_failed(format!(
                "order {} reported no fills (status {})",
                report.order_id, report.status
            ));
        };
        let commission = report.commissions();
        info!(
            "✅ Entry filled: {} {} @ {} (order {} / {}, {} fills, commission {:?})",
            filled_qty,
            symbol,
            fill_price,
            report.order_id,
            entry_id,
            report.fills.len(),
            commission
        );

        // Комиссия в базовом активе уменьшает то, что можно продать
        let base_fee = p
            .base_asset(symbol)
            .and_then(|base| commission.get(base).copied())
            .unwrap_or(Decimal::ZERO);
        let exit_qty = sellable_quantity(filled_qty, base_fee, p.quantity_precision);

        // 3. Exit price from the realized fill
        let target = exit_price(fill_price, p.exit_markup(), p.price_precision);
        info!("New order price: {}", target);

        // Heuristic wait, not a fill confirmation
        tokio::time::sleep(p.settle_delay).await;

        // 4. Exit: resting limit sell
        let exit_failed = |reason: String| {
            error!(
                "🚨 Exit leg failed, {} {} bought @ {} has no resting sell: {}",
                filled_qty, symbol, fill_price, reason
            );
            Outcome::Failed(TradeError::ExitRejected {
                symbol: symbol.to_string(),
                quantity: filled_qty,
                fill_price,
                exit_price: target,
                reason,
            })
        };
        if exit_qty.is_zero() {
            return exit_failed(format!(
                "nothing left to sell after {} commission",
                base_fee
            ));
        }

        let exit_id = new_client_order_id();
        let ack = match bounded(
            p.exchange_timeout,
            "limit sell",
            self.exchange.place_limit_order(
                symbol,
                Side::Sell,
                TimeInForce::Gtc,
                exit_qty,
                target,
                &exit_id,
            ),
        )
        .await
        {
            Ok(ack) => ack,
            Err(e) => return exit_failed(format!("{:#} (client id {})", e, exit_id)),
        };
        info!("Exit order {} / {} resting ({})", ack.id, exit_id, ack.status);

        Outcome::Opened(self.project(
            symbol,
            last_spot_price,
            &report.order_id,
            &ack.id,
            exit_qty,
            fill_price,
            target,
            commission,
        ))
    }

    /// The buy may have reached the exchange. Ask for it by client id once,
    /// so the operator learns what happened, but never place the exit blind.
    async fn entry_unknown(
        &self,
        symbol: &str,
        client_order_id: &str,
        quantity: Decimal,
        cause: anyhow::Error,
    ) -> TradeError {
        let mut reason = format!("{:#}", cause);
        match bounded(
            self.params.exchange_timeout,
            "order lookup",
            self.exchange.order_status_by_client_id(symbol, client_order_id),
        )
        .await
        {
            Ok(ack) => reason.push_str(&format!(
                ", exchange reports order {} as {}",
                ack.id, ack.status
            )),
            Err(e) => reason.push_str(&format!(", lookup failed: {:#}", e)),
        }
        warn!(
            "⁉️ Entry {} for {} {} unresolved: {}",
            client_order_id, quantity, symbol, reason
        );
        TradeError::EntryUnknown {
            symbol: symbol.to_string(),
            client_order_id: client_order_id.to_string(),
            quantity,
            reason,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn project(
        &self,
        symbol: &str,
        last_spot_price: Decimal,
        entry_order_id: &str,
        exit_order_id: &str,
        quantity: Decimal,
        entry_price: Decimal,
        exit_price: Decimal,
        entry_commission: BTreeMap<String, Decimal>,
    ) -> OpenedPosition {
        let estimated_fees =
            ((entry_price + exit_price) * quantity * self.params.fees_percent).round_dp(4);
        let profit_quote = ((exit_price - entry_price) * quantity).round_dp(4);
        let profit_pct =
            ((exit_price / entry_price - Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2);

        OpenedPosition {
            symbol: symbol.to_string(),
            entry_order_id: entry_order_id.to_string(),
            exit_order_id: exit_order_id.to_string(),
            last_spot_price,
            quantity,
            entry_price,
            exit_price,
            profit_quote,
            profit_pct,
            estimated_fees,
            entry_commission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params(fee_adjusted_exit: bool) -> OrderParams {
        OrderParams {
            quote_asset: "USDT".into(),
            profit_percent: dec!(0.01),
            fees_percent: dec!(0.001),
            fee_adjusted_exit,
            quantity_precision: 5,
            price_precision: 2,
            settle_delay: Duration::ZERO,
            exchange_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn markup_ignores_fees_unless_enabled() {
        assert_eq!(params(false).exit_markup(), dec!(0.01));
        assert_eq!(params(true).exit_markup(), dec!(0.012));
    }

    #[test]
    fn base_asset_is_symbol_without_quote() {
        let p = params(false);
        assert_eq!(p.base_asset("BTCUSDT"), Some("BTC"));
        assert_eq!(p.base_asset("ETHBTC"), None);
        assert_eq!(p.base_asset("USDT"), None);
    }
}
