// src/predictors/ema_trend.rs
use crate::connectors::traits::MarketDataSource;
use crate::predictors::traits::PricePredictor;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::sync::Arc;
use ta::indicators::ExponentialMovingAverage;
use ta::Next;

/// Model-free baseline: the EMA of recent closes pushed one step along its slope.
pub struct EmaTrendPredictor {
    market: Arc<dyn MarketDataSource>,
    symbol: String,
    interval: String,
    history: usize,
    period: usize,
}

impl EmaTrendPredictor {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        symbol: String,
        interval: String,
        history: usize,
        period: usize,
    ) -> Self {
        Self {
            market,
            symbol,
            interval,
            history,
            period,
        }
    }

    pub fn forecast(closes: &[f64], period: usize) -> Result<f64> {
        if closes.len() < 2 {
            bail!("Need at least 2 closes, got {}", closes.len());
        }
        let mut ema = ExponentialMovingAverage::new(period)
            .map_err(|e| anyhow!("Invalid EMA period {}: {:?}", period, e))?;

        let mut prev = 0.0;
        let mut last = 0.0;
        for close in closes {
            prev = last;
            last = ema.next(*close);
        }
        Ok(last + (last - prev))
    }
}

#[async_trait]
impl PricePredictor for EmaTrendPredictor {
    fn name(&self) -> &str {
        "ema_trend"
    }

    async fn predict(&self) -> Result<Decimal> {
        let klines = self
            .market
            .klines(&self.symbol, &self.interval, self.history)
            .await?;

        let closes: Vec<f64> = klines.iter().filter_map(|k| k.close.to_f64()).collect();
        let forecast = Self::forecast(&closes, self.period)?;

        Decimal::from_f64(forecast)
            .map(|d| d.round_dp(8))
            .ok_or_else(|| anyhow!("Forecast {} is not representable", forecast))
    }
}
