// In crates/api-client/src/types.rs

use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Client for a broker REST API that authenticates each request with an
/// API key and an HMAC-SHA256 signature. Orders go to the NSE cash segment.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The persistent HTTP client.
    pub http_client: Client,
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Ohlc {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Response of `GET /v1/live-data/quote`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Quote {
    pub trading_symbol: String,
    pub ohlc: Ohlc,
    pub last_price: Decimal,
}

/// Response of `GET /v1/market/status`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MarketStatus {
    pub date: NaiveDate,
    pub is_trading_day: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    Pending,
    /// Filled, fully or partially.
    Executed,
    Cancelled,
    Rejected,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    #[serde(rename = "MARKET")]
    Market,
    /// Stop-loss market: a market sell once the trigger price trades.
    #[serde(rename = "SL_M")]
    StopLossMarket,
}

/// Body of `POST /v1/order/create`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NewOrderRequest<'a> {
    pub trading_symbol: &'a str,
    pub quantity: u64,
    pub exchange: &'static str,
    pub segment: &'static str,
    /// Delivery, not intraday.
    pub product: &'static str,
    pub order_type: OrderType,
    pub transaction_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
}

/// Body of `POST /v1/order/modify`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModifyOrderRequest<'a> {
    pub order_id: &'a str,
    pub quantity: u64,
    pub trigger_price: Decimal,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: OrderStatus,
}

/// One entry of `GET /v1/order/list`, also returned by `GET /v1/order/detail`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OrderDetail {
    pub order_id: String,
    pub trading_symbol: String,
    pub transaction_type: String,
    pub order_type: String,
    pub status: OrderStatus,
    pub quantity: u64,
    #[serde(default)]
    pub filled_quantity: u64,
    pub average_fill_price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
}

impl OrderDetail {
    pub fn is_stop_loss(&self) -> bool {
        self.order_type == "SL_M"
    }

    /// Still waiting at the exchange.
    pub fn is_working(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::Pending)
    }
}

/// Error body the broker sends with non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Successful responses are wrapped in `{"status": "SUCCESS", "payload": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub payload: T,
}
