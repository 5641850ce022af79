// src/predictors/mod.rs
pub mod ema_trend;
pub mod model_service;
pub mod traits;
