// src/predictors/traits.rs
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Opaque near-term price forecast. May be slow, may fail.
#[async_trait]
pub trait PricePredictor: Send + Sync {
    fn name(&self) -> &str;

    // Raw forecast, before any calibration offset
    async fn predict(&self) -> Result<Decimal>;
}
