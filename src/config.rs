// src/config.rs

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    ModelService,
    EmaTrend,
}

impl PredictorKind {
    /// Offset subtracted from a raw forecast when none is configured.
    /// The model service output carries a fixed bias; the EMA forecast does not.
    pub fn default_offset(self) -> Decimal {
        match self {
            PredictorKind::ModelService => Decimal::ONE_HUNDRED,
            PredictorKind::EmaTrend => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictorConfig {
    pub kind: PredictorKind,
    pub model_url: Option<String>,
    pub interval: String,
    pub history: usize,
    pub window: usize,
    pub ema_period: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PrecisionConfig {
    pub quantity: u32,
    pub price: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    pub base_delay_ms: u64,
    pub traded_cooldown_secs: u64,
    pub insufficient_funds_backoff_secs: u64,
    pub settle_delay_ms: u64,
    pub exchange_timeout_secs: u64,
    pub prediction_timeout_secs: u64,
    pub notify_timeout_secs: u64,
}

impl TimingConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn traded_cooldown(&self) -> Duration {
        Duration::from_secs(self.traded_cooldown_secs)
    }

    pub fn insufficient_funds_backoff(&self) -> Duration {
        Duration::from_secs(self.insufficient_funds_backoff_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    pub fn prediction_timeout(&self) -> Duration {
        Duration::from_secs(self.prediction_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub binance_api_key: String,
    pub binance_key_secret: String,
    pub binance_base_url: String,
    pub tg_token: String,
    pub tg_chat_id: String,
    pub telegram_base_url: String,

    pub symbol: String,
    pub quote_asset: String,
    pub quote_interval: String,
    // Минимальный размер ордера и одновременно порог баланса
    pub min_order_value: Decimal,
    pub fees_percent: Decimal,
    pub profit_percent: Decimal,
    pub available_price_impact: Decimal,
    // None -> default of the chosen predictor
    pub prediction_offset: Option<Decimal>,
    pub fee_adjusted_exit: bool,
    pub log_dir: String,

    pub precision: PrecisionConfig,
    pub timing: TimingConfig,
    pub predictor: PredictorConfig,
}

impl AppConfig {
    /// Settings.toml (optional) overlaid with the process environment.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::default().separator("__"));

        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("binance_base_url", "https://api.binance.com")?
            .set_default("telegram_base_url", "https://api.telegram.org")?
            .set_default("symbol", "BTCUSDT")?
            .set_default("quote_asset", "USDT")?
            .set_default("quote_interval", "1s")?
            .set_default("fee_adjusted_exit", false)?
            .set_default("log_dir", "logs")?
            .set_default("precision.quantity", 5)?
            .set_default("precision.price", 2)?
            .set_default("timing.base_delay_ms", 1000)?
            .set_default("timing.traded_cooldown_secs", 30)?
            .set_default("timing.insufficient_funds_backoff_secs", 10)?
            .set_default("timing.settle_delay_ms", 2000)?
            .set_default("timing.exchange_timeout_secs", 15)?
            .set_default("timing.prediction_timeout_secs", 30)?
            .set_default("timing.notify_timeout_secs", 10)?
            .set_default("predictor.kind", "ema_trend")?
            .set_default("predictor.interval", "5m")?
            .set_default("predictor.history", 100)?
            .set_default("predictor.window", 60)?
            .set_default("predictor.ema_period", 12)
    }

    pub fn calibration_offset(&self) -> Decimal {
        self.prediction_offset
            .unwrap_or_else(|| self.predictor.kind.default_offset())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_order_value <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "min_order_value must be positive".into(),
            ));
        }
        if self.profit_percent <= Decimal::ZERO {
            return Err(ConfigError::Message("profit_percent must be positive".into()));
        }
        if self.fees_percent < Decimal::ZERO || self.available_price_impact < Decimal::ZERO {
            return Err(ConfigError::Message(
                "fees_percent and available_price_impact must not be negative".into(),
            ));
        }
        if self.predictor.history == 0 || self.predictor.window == 0 {
            return Err(ConfigError::Message(
                "predictor.history and predictor.window must be positive".into(),
            ));
        }
        if self.predictor.window > self.predictor.history {
            return Err(ConfigError::Message(
                "predictor.window cannot exceed predictor.history".into(),
            ));
        }
        if self.predictor.kind == PredictorKind::ModelService && self.predictor.model_url.is_none()
        {
            return Err(ConfigError::Message(
                "predictor.model_url is required for the model_service predictor".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use rust_decimal_macros::dec;

    const REQUIRED: &str = r#"
        binance_api_key = "key"
        binance_key_secret = "secret"
        tg_token = "token"
        tg_chat_id = "42"
        min_order_value = "50"
        fees_percent = "0.001"
        profit_percent = "0.01"
        available_price_impact = "4"
    "#;

    fn load(extra: &str) -> Result<AppConfig, ConfigError> {
        let text = format!("{}\n{}", REQUIRED, extra);
        let builder = AppConfig::defaults()?.add_source(File::from_str(&text, FileFormat::Toml));
        AppConfig::from_builder(builder)
    }

    #[test]
    fn required_values_and_defaults() {
        let cfg = load("").unwrap();
        assert_eq!(cfg.min_order_value, dec!(50));
        assert_eq!(cfg.profit_percent, dec!(0.01));
        assert_eq!(cfg.prediction_offset, None);
        assert_eq!(cfg.calibration_offset(), dec!(0));
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.precision.quantity, 5);
        assert_eq!(cfg.timing.traded_cooldown(), Duration::from_secs(30));
        assert_eq!(cfg.timing.base_delay(), Duration::from_secs(1));
        assert_eq!(cfg.predictor.kind, PredictorKind::EmaTrend);
        assert!(!cfg.fee_adjusted_exit);
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let builder = AppConfig::defaults()
            .unwrap()
            .add_source(File::from_str("min_order_value = \"50\"", FileFormat::Toml));
        assert!(AppConfig::from_builder(builder).is_err());
    }

    #[test]
    fn model_service_needs_url() {
        let err = load("[predictor]\nkind = \"model_service\"").unwrap_err();
        assert!(err.to_string().contains("model_url"));

        let cfg = load("[predictor]\nkind = \"model_service\"\nmodel_url = \"http://localhost:8000/predict\"")
            .unwrap();
        assert_eq!(cfg.predictor.kind, PredictorKind::ModelService);
        // соседние ключи секции остаются по умолчанию
        assert_eq!(cfg.predictor.history, 100);
    }

    #[test]
    fn offset_follows_predictor_unless_set() {
        let model = "[predictor]\nkind = \"model_service\"\nmodel_url = \"http://localhost:8000/predict\"";
        assert_eq!(load(model).unwrap().calibration_offset(), dec!(100));
        assert_eq!(load("").unwrap().calibration_offset(), dec!(0));

        let pinned = load(&format!("prediction_offset = \"12.5\"\n{}", model)).unwrap();
        assert_eq!(pinned.calibration_offset(), dec!(12.5));
    }

    #[test]
    fn rejects_non_positive_profit() {
        let text = REQUIRED.replace("profit_percent = \"0.01\"", "profit_percent = \"0\"");
        let builder = AppConfig::defaults()
            .unwrap()
            .add_source(File::from_str(&text, FileFormat::Toml));
        assert!(AppConfig::from_builder(builder).is_err());
    }
}
