// src/predictors/model_service.rs
use crate::connectors::traits::MarketDataSource;
use crate::predictors::traits::PricePredictor;
use crate::types::Kline;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    symbol: &'a str,
    interval: &'a str,
    // [open, high, low, close, volume] по каждой свече, старые первыми
    features: Vec<[f64; 5]>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    price: f64,
}

/// Forecasts by sending recent OHLCV rows to an HTTP model service.
pub struct ModelServicePredictor {
    market: Arc<dyn MarketDataSource>,
    http_client: Client,
    model_url: Url,
    symbol: String,
    interval: String,
    history: usize,
    window: usize,
}

impl ModelServicePredictor {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        model_url: &str,
        symbol: String,
        interval: String,
        history: usize,
        window: usize,
    ) -> Result<Self> {
        let model_url = Url::parse(model_url)
            .with_context(|| format!("Invalid model url: {}", model_url))?;

        Ok(Self {
            market,
            http_client: Client::new(),
            model_url,
            symbol,
            interval,
            history,
            window,
        })
    }

    fn features(&self, klines: &[Kline]) -> Result<Vec<[f64; 5]>> {
        if klines.len() < self.window {
            bail!(
                "Model needs {} klines, market returned {}",
                self.window,
                klines.len()
            );
        }
        klines[klines.len() - self.window..]
            .iter()
            .map(|k| -> Result<[f64; 5]> {
                let row = [k.open, k.high, k.low, k.close, k.volume];
                let mut out = [0.0; 5];
                for (slot, value) in out.iter_mut().zip(row) {
                    *slot = value
                        .to_f64()
                        .ok_or_else(|| anyhow!("Kline value {} out of range", value))?;
                }
                Ok(out)
            })
            .collect()
    }
}

#[async_trait]
impl PricePredictor for ModelServicePredictor {
    fn name(&self) -> &str {
        "model_service"
    }

    async fn predict(&self) -> Result<Decimal> {
        let klines = self
            .market
            .klines(&self.symbol, &self.interval, self.history)
            .await?;

        let request = PredictRequest {
            symbol: &self.symbol,
            interval: &self.interval,
            features: self.features(&klines)?,
        };

        let reply: PredictResponse = self
            .http_client
            .post(self.model_url.clone())
            .json(&request)
            .send()
            .await
            .context("Model service unreachable")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed model service reply")?;

        if !reply.price.is_finite() || reply.price <= 0.0 {
            bail!("Model returned unusable price {}", reply.price);
        }
        Decimal::from_f64(reply.price).ok_or_else(|| anyhow!("Unrepresentable price {}", reply.price))
    }
}
