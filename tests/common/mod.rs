//! In-memory collaborators for driving the trading loop in tests.
//!
//! The exchange records every call so tests can assert exactly which
//! orders were (or were not) placed.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use spot_forecaster::connectors::traits::{ExchangeClient, MarketDataSource};
use spot_forecaster::core::decision::{DecisionEngine, DecisionParams};
use spot_forecaster::core::engine::{Cadence, TradingEngine};
use spot_forecaster::core::lifecycle::{OrderManager, OrderParams};
use spot_forecaster::predictors::traits::PricePredictor;
use spot_forecaster::types::*;

pub const SYMBOL: &str = "BTCUSDT";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Balance(String),
    Market {
        symbol: String,
        side: Side,
        quantity: Decimal,
    },
    Limit {
        symbol: String,
        side: Side,
        time_in_force: TimeInForce,
        quantity: Decimal,
        price: Decimal,
    },
    Status(String),
    Cancel(String),
}

/// Fill whose commission was paid in BNB, so the bought amount is intact.
pub fn fill(price: Decimal, qty: Decimal) -> Fill {
    Fill {
        price,
        qty,
        commission: Decimal::ZERO,
        commission_asset: "BNB".into(),
    }
}

/// Exchange stub with a scripted balance and scripted fills.
pub struct RecordingExchange {
    balance: Decimal,
    fills: Vec<Fill>,
    entry_error: Option<String>,
    exit_error: Option<String>,
    entry_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    client_ids: Mutex<Vec<String>>,
}

impl RecordingExchange {
    pub fn new(balance: Decimal, fills: Vec<Fill>) -> Self {
        Self {
            balance,
            fills,
            entry_error: None,
            exit_error: None,
            entry_delay: None,
            calls: Mutex::new(Vec::new()),
            client_ids: Mutex::new(Vec::new()),
        }
    }

    /// The market buy is recorded, then its response takes `delay` to arrive.
    pub fn slow_entry(mut self, delay: Duration) -> Self {
        self.entry_delay = Some(delay);
        self
    }

    pub fn failing_entry(mut self, msg: &str) -> Self {
        self.entry_error = Some(msg.to_string());
        self
    }

    pub fn failing_exit(mut self, msg: &str) -> Self {
        self.exit_error = Some(msg.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Market and limit submissions only.
    pub fn order_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Market { .. } | Call::Limit { .. }))
            .collect()
    }

    /// Client order ids of submitted orders, in submission order.
    pub fn client_ids(&self) -> Vec<String> {
        self.client_ids.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ExchangeClient for RecordingExchange {
    async fn server_time(&self) -> Result<i64> {
        Ok(0)
    }

    async fn balance(&self, asset: &str) -> Result<Decimal> {
        self.record(Call::Balance(asset.to_string()));
        Ok(self.balance)
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        client_order_id: &str,
    ) -> Result<MarketOrderReport> {
        self.record(Call::Market {
            symbol: symbol.to_string(),
            side,
            quantity,
        });
        self.client_ids.lock().unwrap().push(client_order_id.to_string());
        if let Some(delay) = self.entry_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = &self.entry_error {
            return Err(anyhow!(msg.clone()));
        }
        let executed: Decimal = self.fills.iter().map(|f| f.qty).sum();
        Ok(MarketOrderReport {
            order_id: "1001".into(),
            client_order_id: client_order_id.to_string(),
            symbol: symbol.to_string(),
            status: "FILLED".into(),
            executed_qty: executed,
            cumulative_quote_qty: self.fills.iter().map(|f| f.price * f.qty).sum(),
            fills: self.fills.clone(),
        })
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        time_in_force: TimeInForce,
        quantity: Decimal,
        price: Decimal,
        client_order_id: &str,
    ) -> Result<OrderAck> {
        self.record(Call::Limit {
            symbol: symbol.to_string(),
            side,
            time_in_force,
            quantity,
            price,
        });
        self.client_ids.lock().unwrap().push(client_order_id.to_string());
        if let Some(msg) = &self.exit_error {
            return Err(anyhow!(msg.clone()));
        }
        Ok(OrderAck {
            id: "1002".into(),
            client_order_id: client_order_id.to_string(),
            symbol: symbol.to_string(),
            status: "NEW".into(),
        })
    }

    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderAck> {
        self.record(Call::Status(order_id.to_string()));
        Ok(OrderAck {
            id: order_id.to_string(),
            client_order_id: "sf-exit".into(),
            symbol: symbol.to_string(),
            status: "NEW".into(),
        })
    }

    async fn order_status_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<OrderAck> {
        self.record(Call::Status(client_order_id.to_string()));
        Ok(OrderAck {
            id: "1001".into(),
            client_order_id: client_order_id.to_string(),
            symbol: symbol.to_string(),
            status: "FILLED".into(),
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck> {
        self.record(Call::Cancel(order_id.to_string()));
        Ok(OrderAck {
            id: order_id.to_string(),
            client_order_id: "sf-exit".into(),
            symbol: symbol.to_string(),
            status: "CANCELED".into(),
        })
    }
}

pub enum Forecast {
    Price(Decimal),
    Fail(String),
    Hang,
    Panic,
}

pub struct ScriptedPredictor {
    forecast: Forecast,
    calls: AtomicUsize,
}

impl ScriptedPredictor {
    pub fn new(forecast: Forecast) -> Self {
        Self {
            forecast,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PricePredictor for ScriptedPredictor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn predict(&self) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.forecast {
            Forecast::Price(p) => Ok(*p),
            Forecast::Fail(msg) => Err(anyhow!(msg.clone())),
            Forecast::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(anyhow!("unreachable"))
            }
            Forecast::Panic => panic!("model exploded"),
        }
    }
}

pub struct FixedMarket(pub Decimal);

#[async_trait]
impl MarketDataSource for FixedMarket {
    async fn latest_price(&self, symbol: &str, _interval: &str) -> Result<Quote> {
        Ok(Quote {
            symbol: symbol.to_string(),
            price: self.0,
            timestamp: 0,
        })
    }

    async fn klines(&self, _symbol: &str, _interval: &str, _limit: usize) -> Result<Vec<Kline>> {
        Ok(vec![])
    }
}

pub struct Harness {
    pub engine: TradingEngine,
    pub exchange: Arc<RecordingExchange>,
    pub predictor: Arc<ScriptedPredictor>,
    pub notifications: mpsc::Receiver<Notification>,
}

impl Harness {
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

pub fn decision_params(threshold: Decimal) -> DecisionParams {
    DecisionParams {
        quote_asset: "USDT".into(),
        quote_interval: "1s".into(),
        min_order_value: Decimal::from(50),
        available_price_impact: threshold,
        prediction_offset: Decimal::from(100),
        exchange_timeout: Duration::from_secs(1),
        prediction_timeout: Duration::from_millis(200),
    }
}

pub fn order_params() -> OrderParams {
    OrderParams {
        quote_asset: "USDT".into(),
        profit_percent: Decimal::new(1, 2),
        fees_percent: Decimal::new(1, 3),
        fee_adjusted_exit: false,
        quantity_precision: 5,
        price_precision: 2,
        settle_delay: Duration::ZERO,
        exchange_timeout: Duration::from_secs(1),
    }
}

/// Loop wired to stubs: `last_price` from the market, `forecast` from the model.
/// No pauses between cycles.
pub fn harness(
    exchange: RecordingExchange,
    forecast: Forecast,
    last_price: Decimal,
    threshold: Decimal,
) -> Harness {
    paced_harness(
        exchange,
        forecast,
        last_price,
        threshold,
        Cadence {
            base_delay: Duration::ZERO,
            traded_cooldown: Duration::ZERO,
            insufficient_funds_backoff: Duration::ZERO,
        },
    )
}

pub fn paced_harness(
    exchange: RecordingExchange,
    forecast: Forecast,
    last_price: Decimal,
    threshold: Decimal,
    cadence: Cadence,
) -> Harness {
    let exchange = Arc::new(exchange);
    let predictor = Arc::new(ScriptedPredictor::new(forecast));
    let (tx, rx) = mpsc::channel(16);

    let decision = DecisionEngine::new(
        predictor.clone(),
        Arc::new(FixedMarket(last_price)),
        exchange.clone(),
        decision_params(threshold),
    );
    let orders = OrderManager::new(exchange.clone(), order_params());
    let engine = TradingEngine::new(
        SYMBOL.to_string(),
        decision,
        orders,
        tx,
        cadence,
    );

    Harness {
        engine,
        exchange,
        predictor,
        notifications: rx,
    }
}
