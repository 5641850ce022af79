// src/connectors/binance.rs
use crate::connectors::messages::{
    BinanceAccountInfo, BinanceApiError, BinanceOrderResponse, BinanceServerTime,
};
use crate::connectors::traits::{ExchangeClient, MarketDataSource};
use crate::types::{Kline, MarketOrderReport, OrderAck, Quote, Side, TimeInForce};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW_MS: &str = "5000";

pub struct BinanceClient {
    api_key: String,
    secret_key: String,
    http_client: Client,
    base_rest_url: String,
}

impl BinanceClient {
    pub fn new(api_key: String, secret_key: String, base_rest_url: &str) -> Result<Self> {
        let base = Url::parse(base_rest_url)
            .with_context(|| format!("Invalid Binance base url: {}", base_rest_url))?;
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            api_key,
            secret_key,
            http_client,
            base_rest_url: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn sign(&self, query_string: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .context("Invalid secret key length")?;
        mac.update(query_string.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> Result<String> {
        let mut params = params;
        params.push(("recvWindow", RECV_WINDOW_MS.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let query_string = serde_urlencoded::to_string(&params)?;
        let signature = self.sign(&query_string)?;

        Ok(format!("{}&signature={}", query_string, signature))
    }

    async fn send_signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T> {
        let full_query = self.sign_and_build_query(params)?;
        let url = format!("{}{}?{}", self.base_rest_url, endpoint, full_query);

        let response = self
            .http_client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;

        decode(response, endpoint).await
    }

    async fn send_public_request<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_rest_url, endpoint);
        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;

        decode(response, endpoint).await
    }
}

/// Non-2xx responses carry Binance's {code, msg}; keep it in the error.
async fn decode<T: for<'de> Deserialize<'de>>(response: Response, endpoint: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return match serde_json::from_str::<BinanceApiError>(&body) {
            Ok(api) => Err(anyhow!(
                "Binance rejected {} ({}): {} {}",
                endpoint,
                status,
                api.code,
                api.msg
            )),
            Err(_) => Err(anyhow!("Binance {} returned {}: {}", endpoint, status, body)),
        };
    }
    response
        .json::<T>()
        .await
        .with_context(|| format!("Malformed response from {}", endpoint))
}

fn field(row: &[serde_json::Value], idx: usize) -> Result<Decimal> {
    let raw = row
        .get(idx)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Kline field {} missing", idx))?;
    // Парсинг в Decimal
    Ok(Decimal::from_str(raw)?)
}

fn parse_kline(row: &[serde_json::Value]) -> Result<Kline> {
    let open_time = row
        .first()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Kline open time missing"))?;

    Ok(Kline {
        open_time,
        open: field(row, 1)?,
        high: field(row, 2)?,
        low: field(row, 3)?,
        close: field(row, 4)?,
        volume: field(row, 5)?,
    })
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn latest_price(&self, symbol: &str, interval: &str) -> Result<Quote> {
        let kline = self
            .klines(symbol, interval, 1)
            .await?
            .pop()
            .ok_or_else(|| anyhow!("No klines returned for {}", symbol))?;

        Ok(Quote {
            symbol: symbol.to_string(),
            price: kline.close,
            timestamp: Utc::now().timestamp_millis() as u64,
        })
    }

    async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Kline>> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .send_public_request(
                "/api/v3/klines",
                vec![
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn server_time(&self) -> Result<i64> {
        let resp: BinanceServerTime = self.send_public_request("/api/v3/time", vec![]).await?;
        Ok(resp.server_time)
    }

    async fn balance(&self, asset: &str) -> Result<Decimal> {
        let resp: BinanceAccountInfo = self
            .send_signed_request(Method::GET, "/api/v3/account", vec![])
            .await?;

        Ok(resp
            .balances
            .iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO))
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        client_order_id: &str,
    ) -> Result<MarketOrderReport> {
        if quantity <= Decimal::ZERO {
            bail!("Refusing market order with quantity {}", quantity);
        }
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("newClientOrderId", client_order_id.to_string()),
            ("newOrderRespType", "FULL".to_string()),
        ];

        info!(
            "🚀 Sending Order: {} MARKET {} {} ({})",
            side.as_str(),
            quantity,
            symbol,
            client_order_id
        );

        let resp: BinanceOrderResponse = self
            .send_signed_request(Method::POST, "/api/v3/order", params)
            .await?;
        debug!("Market order response: {:?}", resp);

        Ok(resp.into())
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
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", time_in_force.as_str().to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("price", price.to_string()),
            ("newClientOrderId", client_order_id.to_string()),
        ];

        info!(
            "🚀 Sending Order: {} LIMIT {} {} {} @ {} ({})",
            side.as_str(),
            time_in_force.as_str(),
            quantity,
            symbol,
            price,
            client_order_id
        );

        let resp: BinanceOrderResponse = self
            .send_signed_request(Method::POST, "/api/v3/order", params)
            .await?;

        Ok(resp.into())
    }

    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderAck> {
        let resp: BinanceOrderResponse = self
            .send_signed_request(
                Method::GET,
                "/api/v3/order",
                vec![
                    ("symbol", symbol.to_string()),
                    ("orderId", order_id.to_string()),
                ],
            )
            .await?;

        Ok(resp.into())
    }

    async fn order_status_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<OrderAck> {
        let resp: BinanceOrderResponse = self
            .send_signed_request(
                Method::GET,
                "/api/v3/order",
                vec![
                    ("symbol", symbol.to_string()),
                    ("origClientOrderId", client_order_id.to_string()),
                ],
            )
            .await?;

        Ok(resp.into())
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck> {
        info!("Cancelling order {} on {}", order_id, symbol);
        let resp: BinanceOrderResponse = self
            .send_signed_request(
                Method::DELETE,
                "/api/v3/order",
                vec![
                    ("symbol", symbol.to_string()),
                    ("orderId", order_id.to_string()),
                ],
            )
            .await?;

        Ok(resp.into())
    }
}
