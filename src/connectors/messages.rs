// src/connectors/messages.rs
use crate::types::{Fill, MarketOrderReport, OrderAck};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Ошибка REST API Binance: {"code": -2010, "msg": "..."}
#[derive(Debug, Deserialize)]
pub struct BinanceApiError {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct BinanceServerTime {
    #[serde(rename = "serverTime")]
    pub server_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct BinanceBalance {
    pub asset: String,
    pub free: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BinanceAccountInfo {
    pub balances: Vec<BinanceBalance>,
}

#[derive(Debug, Deserialize)]
pub struct BinanceFill {
    pub price: Decimal,
    pub qty: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(rename = "commissionAsset", default)]
    pub commission_asset: String,
}

/// Ответ на POST /api/v3/order (newOrderRespType=FULL).
/// Поля fills нет у LIMIT-ордеров, поэтому default.
#[derive(Debug, Deserialize)]
pub struct BinanceOrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: u64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    pub symbol: String,
    pub status: String,
    #[serde(rename = "executedQty", default)]
    pub executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty", default)]
    pub cumulative_quote_qty: Decimal,
    #[serde(default)]
    pub fills: Vec<BinanceFill>,
}

impl From<BinanceOrderResponse> for MarketOrderReport {
    fn from(resp: BinanceOrderResponse) -> Self {
        MarketOrderReport {
            order_id: resp.order_id.to_string(),
            client_order_id: resp.client_order_id,
            symbol: resp.symbol,
            status: resp.status,
            executed_qty: resp.executed_qty,
            cumulative_quote_qty: resp.cumulative_quote_qty,
            fills: resp
                .fills
                .into_iter()
                .map(|f| Fill {
                    price: f.price,
                    qty: f.qty,
                    commission: f.commission,
                    commission_asset: f.commission_asset,
                })
                .collect(),
        }
    }
}

impl From<BinanceOrderResponse> for OrderAck {
    fn from(resp: BinanceOrderResponse) -> Self {
        OrderAck {
            id: resp.order_id.to_string(),
            client_order_id: resp.client_order_id,
            symbol: resp.symbol,
            status: resp.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_full_market_order_response() {
        let body = r#"{
            "symbol": "BTCUSDT",
            "orderId": 28,
            "orderListId": -1,
            "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
            "transactTime": 1507725176595,
            "price": "0.00000000",
            "origQty": "0.00050000",
            "executedQty": "0.00050000",
            "cummulativeQuoteQty": "50.00000000",
            "status": "FILLED",
            "timeInForce": "GTC",
            "type": "MARKET",
            "side": "BUY",
            "fills": [
                {"price": "100000.00", "qty": "0.00050000", "commission": "0.0000005", "commissionAsset": "BTC", "tradeId": 56}
            ]
        }"#;
        let resp: BinanceOrderResponse = serde_json::from_str(body).unwrap();
        let report = MarketOrderReport::from(resp);
        assert_eq!(report.order_id, "28");
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].price, dec!(100000));
        assert_eq!(report.fills[0].commission, dec!(0.0000005));
        assert_eq!(report.fills[0].commission_asset, "BTC");
        assert_eq!(report.commissions()["BTC"], dec!(0.0000005));
        assert_eq!(report.average_fill(), Some((dec!(100000), dec!(0.0005))));
    }

    #[test]
    fn limit_ack_without_fills() {
        let body = r#"{"symbol":"BTCUSDT","orderId":29,"clientOrderId":"x","status":"NEW"}"#;
        let ack = OrderAck::from(serde_json::from_str::<BinanceOrderResponse>(body).unwrap());
        assert_eq!(ack.id, "29");
        assert_eq!(ack.status, "NEW");
    }
}
