// src/core/decision.rs
use crate::connectors::traits::{ExchangeClient, MarketDataSource};
use crate::error::TradeError;
use crate::predictors::traits::PricePredictor;
use crate::utils::deadline::bounded;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DecisionParams {
    pub quote_asset: String,
    pub quote_interval: String,
    pub min_order_value: Decimal,
    pub available_price_impact: Decimal,
    pub prediction_offset: Decimal,
    pub exchange_timeout: Duration,
    pub prediction_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeDecision {
    pub symbol: String,
    pub last_price: Decimal,
    pub raw_prediction: Decimal,
    pub adjusted_prediction: Decimal,
    pub price_impact: Decimal,
    pub can_trade: bool,
    /// `can_trade` и impact строго выше порога
    pub authorized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    InsufficientFunds { free: Decimal, floor: Decimal },
    Evaluated(TradeDecision),
}

/// Compares a calibrated forecast with the last traded price.
pub fn assess(
    symbol: &str,
    raw_prediction: Decimal,
    offset: Decimal,
    last_price: Decimal,
    threshold: Decimal,
) -> TradeDecision {
    let adjusted_prediction = raw_prediction - offset;
    let price_impact = adjusted_prediction - last_price;
    let can_trade = last_price < adjusted_prediction;

    TradeDecision {
        symbol: symbol.to_string(),
        last_price,
        raw_prediction,
        adjusted_prediction,
        price_impact,
        can_trade,
        authorized: can_trade && price_impact > threshold,
    }
}

pub struct DecisionEngine {
    predictor: Arc<dyn PricePredictor>,
    market: Arc<dyn MarketDataSource>,
    exchange: Arc<dyn ExchangeClient>,
    params: DecisionParams,
}

impl DecisionEngine {
    pub fn new(
        predictor: Arc<dyn PricePredictor>,
        market: Arc<dyn MarketDataSource>,
        exchange: Arc<dyn ExchangeClient>,
        params: DecisionParams,
    ) -> Self {
        Self {
            predictor,
            market,
            exchange,
            params,
        }
    }

    pub fn min_order_value(&self) -> Decimal {
        self.params.min_order_value
    }

    /// Reads balance, forecast and last price. Never places orders.
    pub async fn evaluate(&self, symbol: &str) -> Result<Evaluation, TradeError> {
        let p = &self.params;

        let free = bounded(
            p.exchange_timeout,
            "balance",
            self.exchange.balance(&p.quote_asset),
        )
        .await
        .map_err(|e| TradeError::MarketData(format!("{:#}", e)))?;

        if free < p.min_order_value {
            warn!(
                "BALANCE SMALL: {} {} free, need {}",
                free, p.quote_asset, p.min_order_value
            );
            return Ok(Evaluation::InsufficientFunds {
                free,
                floor: p.min_order_value,
            });
        }

        let raw_prediction = bounded(
            p.prediction_timeout,
            self.predictor.name(),
            self.predictor.predict(),
        )
        .await
        .map_err(|e| TradeError::PredictionUnavailable(format!("{:#}", e)))?;

        let quote = bounded(
            p.exchange_timeout,
            "latest price",
            self.market.latest_price(symbol, &p.quote_interval),
        )
        .await
        .map_err(|e| TradeError::MarketData(format!("{:#}", e)))?;

        let decision = assess(
            symbol,
            raw_prediction,
            p.prediction_offset,
            quote.price,
            p.available_price_impact,
        );

        info!(
            "Predict price: {} | Last spot price: {} | Price impact: {} | Can trade: {}",
            decision.adjusted_prediction, decision.last_price, decision.price_impact, decision.can_trade
        );
        debug!("Decision: {:?}", decision);

        Ok(Evaluation::Evaluated(decision))
    }
}
