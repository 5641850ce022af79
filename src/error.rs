// src/error.rs
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures of a single trading cycle. None of them stop the loop.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("prediction unavailable: {0}")]
    PredictionUnavailable(String),

    #[error("market data unavailable: {0}")]
    MarketData(String),

    #[error("entry order for {symbol} failed: {reason}")]
    EntryRejected { symbol: String, reason: String },

    /// The market buy was sent but no answer came back in time. It may
    /// have filled; `client_order_id` identifies it on the exchange.
    #[error(
        "entry order for {symbol} ({quantity}, client id {client_order_id}) has unknown outcome, \
         check the exchange before trading again: {reason}"
    )]
    EntryUnknown {
        symbol: String,
        client_order_id: String,
        quantity: Decimal,
        reason: String,
    },

    #[error(
        "exit order for {symbol} failed after entry filled {quantity} @ {fill_price} \
         (intended exit {exit_price}), position is unprotected: {reason}"
    )]
    ExitRejected {
        symbol: String,
        quantity: Decimal,
        fill_price: Decimal,
        exit_price: Decimal,
        reason: String,
    },

    #[error("cycle panicked: {0}")]
    CyclePanicked(String),
}

impl TradeError {
    /// True for failures that happened while orders were being placed.
    pub fn is_order_failure(&self) -> bool {
        matches!(
            self,
            TradeError::EntryRejected { .. }
                | TradeError::EntryUnknown { .. }
                | TradeError::ExitRejected { .. }
        )
    }
}
