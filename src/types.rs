// src/types.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        }
    }
}

/// Последняя сделка по символу. Живёт один цикл, никуда не сохраняется.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub price: Decimal,
    pub qty: Decimal,
    pub commission: Decimal,
    pub commission_asset: String,
}

/// Fresh `newClientOrderId`. Generated before submission so the order can be
/// looked up on the exchange even when its response never arrives.
pub fn new_client_order_id() -> String {
    format!("sf-{}", Uuid::new_v4().simple())
}

/// Result of a market order as reported by the exchange.
#[derive(Debug, Clone)]
pub struct MarketOrderReport {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub status: String,
    pub executed_qty: Decimal,
    pub cumulative_quote_qty: Decimal,
    pub fills: Vec<Fill>,
}

impl MarketOrderReport {
    /// Volume-weighted fill price and total filled quantity.
    ///
    /// Falls back to `cumulative_quote_qty / executed_qty` when the exchange
    /// returned no fill breakdown. `None` means nothing was filled.
    pub fn average_fill(&self) -> Option<(Decimal, Decimal)> {
        let filled: Decimal = self.fills.iter().map(|f| f.qty).sum();
        if !filled.is_zero() {
            let notional: Decimal = self.fills.iter().map(|f| f.price * f.qty).sum();
            return Some((notional / filled, filled));
        }
        if !self.executed_qty.is_zero() {
            return Some((
                self.cumulative_quote_qty / self.executed_qty,
                self.executed_qty,
            ));
        }
        None
    }

    /// Commission charged for the fills, summed per asset.
    pub fn commissions(&self) -> BTreeMap<String, Decimal> {
        let mut out = BTreeMap::new();
        for f in self.fills.iter().filter(|f| !f.commission.is_zero()) {
            *out.entry(f.commission_asset.clone()).or_insert(Decimal::ZERO) += f.commission;
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub status: String,
}

/// Открытая позиция: entry заполнен, exit-ордер выставлен.
#[derive(Debug, Clone, Serialize)]
pub struct OpenedPosition {
    pub symbol: String,
    pub entry_order_id: String,
    pub exit_order_id: String,
    pub last_spot_price: Decimal,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub profit_quote: Decimal,
    pub profit_pct: Decimal,
    pub estimated_fees: Decimal,
    /// Commission the exchange actually charged on the entry, per asset.
    pub entry_commission: BTreeMap<String, Decimal>,
}

/// Messages for the operator channel.
#[derive(Debug, Clone)]
pub enum Notification {
    TradeOpened {
        position: OpenedPosition,
        adjusted_prediction: Decimal,
        price_impact: Decimal,
    },
    TradeFailed {
        symbol: String,
        reason: String,
    },
    CycleError(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::TradeOpened {
                position: p,
                adjusted_prediction,
                price_impact,
            } => {
                writeln!(f, "--------OPEN ORDER-------")?;
                writeln!(f, "Symbol: {}", p.symbol)?;
                writeln!(f, "Last spot price: {}", p.last_spot_price)?;
                writeln!(f, "Order price: {}", p.entry_price)?;
                writeln!(f, "New Order price: {}", p.exit_price)?;
                writeln!(f, "Predict price: {}", adjusted_prediction)?;
                writeln!(f, "Quantity: {}", p.quantity)?;
                writeln!(f, "Price impact: {}", price_impact)?;
                writeln!(f, "Est. fees: {}$", p.estimated_fees)?;
                for (asset, amount) in &p.entry_commission {
                    writeln!(f, "Entry commission: {} {}", amount, asset)?;
                }
                writeln!(f, "Profit USD: {}$", p.profit_quote)?;
                write!(f, "Profit %: {}%", p.profit_pct)
            }
            Notification::TradeFailed { symbol, reason } => {
                write!(f, "Error during trade {}: {}", symbol, reason)
            }
            Notification::CycleError(reason) => write!(f, "Cycle error: {}", reason),
        }
    }
}
