use crate::types::{Kline, MarketOrderReport, OrderAck, Quote, Side, TimeInForce};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest traded price, taken from the newest kline of `interval`.
    async fn latest_price(&self, symbol: &str, interval: &str) -> Result<Quote>;

    async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Kline>>;
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    // Reachability check at startup
    async fn server_time(&self) -> Result<i64>;

    /// Free amount of `asset`, zero if the account does not hold it.
    async fn balance(&self, asset: &str) -> Result<Decimal>;

    /// `client_order_id` is chosen by the caller so that an order whose
    /// response was lost can still be found with `order_status_by_client_id`.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        client_order_id: &str,
    ) -> Result<MarketOrderReport>;

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        time_in_force: TimeInForce,
        quantity: Decimal,
        price: Decimal,
        client_order_id: &str,
    ) -> Result<OrderAck>;

    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderAck>;

    async fn order_status_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<OrderAck>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}
