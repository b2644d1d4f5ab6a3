// In crates/api-client/src/lib.rs

use std::time::Duration;

use app_config::BrokerSettings;
use chrono::{NaiveDate, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode, Url, header::CONTENT_TYPE};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

pub mod error;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use types::*;
use types::{Envelope, ErrorBody};

const EXCHANGE: &str = "NSE";
const SEGMENT: &str = "CASH";
const PRODUCT: &str = "CNC";

impl ApiClient {
    /// Constructs a new ApiClient from the broker settings.
    pub fn new(settings: &BrokerSettings) -> Result<Self> {
        if settings.api_key.is_empty() || settings.secret_key.is_empty() {
            return Err(Error::ClientBuildError(
                "broker.api_key and broker.secret_key must be set for live trading".to_string(),
            ));
        }
        let base_url = settings.rest_base_url.trim().trim_end_matches('/');
        if Url::parse(base_url).is_err() {
            return Err(Error::ClientBuildError(format!(
                "broker.rest_base_url must be an absolute URL, got '{}'",
                settings.rest_base_url
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;

        Ok(ApiClient {
            http_client,
            api_key: settings.api_key.clone(),
            secret_key: settings.secret_key.clone(),
            base_url: base_url.to_string(),
        })
    }

    /// Generates a hex HMAC-SHA256 signature for `payload`.
    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| Error::ClientBuildError(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let base = format!("{}{}", self.base_url, path);
        let url = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        url.map_err(|e| Error::ClientBuildError(e.to_string()))
    }

    /// Sends a signed request and unwraps the response payload.
    ///
    /// The signature covers `timestamp + METHOD + path?query + body`.
    async fn send<T: DeserializeOwned>(&self, method: Method, url: Url, body: Option<String>) -> Result<T> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let body = body.unwrap_or_default();
        let signature = self.sign(&format!("{timestamp}{method}{path_and_query}{body}"))?;

        tracing::debug!(%method, path = %path_and_query, "Broker request");

        let mut request = self
            .http_client
            .request(method, url)
            .header("X-API-KEY", &self.api_key)
            .header("X-TIMESTAMP", &timestamp)
            .header("X-SIGNATURE", signature);
        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        parse_response(status, &text)
    }

    /// Fetches the live quote for a ticker.
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let url = self.url(
            "/v1/live-data/quote",
            &[("exchange", EXCHANGE), ("segment", SEGMENT), ("trading_symbol", symbol)],
        )?;
        self.send(Method::GET, url, None).await
    }

    /// Whether the exchange is open on `date`.
    pub async fn market_status(&self, date: NaiveDate) -> Result<MarketStatus> {
        let date = date.format("%Y-%m-%d").to_string();
        let url = self.url("/v1/market/status", &[("exchange", EXCHANGE), ("date", &date)])?;
        self.send(Method::GET, url, None).await
    }

    pub async fn place_market_buy(&self, symbol: &str, quantity: u64) -> Result<OrderResponse> {
        self.create_order(NewOrderRequest {
            trading_symbol: symbol,
            quantity,
            exchange: EXCHANGE,
            segment: SEGMENT,
            product: PRODUCT,
            order_type: OrderType::Market,
            transaction_type: "BUY",
            trigger_price: None,
        })
        .await
    }

    /// Places a stop-loss market sell for `quantity` shares at `trigger_price`.
    pub async fn place_stop_loss(&self, symbol: &str, quantity: u64, trigger_price: Decimal) -> Result<OrderResponse> {
        self.create_order(NewOrderRequest {
            trading_symbol: symbol,
            quantity,
            exchange: EXCHANGE,
            segment: SEGMENT,
            product: PRODUCT,
            order_type: OrderType::StopLossMarket,
            transaction_type: "SELL",
            trigger_price: Some(trigger_price),
        })
        .await
    }

    async fn create_order(&self, order: NewOrderRequest<'_>) -> Result<OrderResponse> {
        let body = serde_json::to_string(&order)?;
        let url = self.url("/v1/order/create", &[])?;
        let response: OrderResponse = self.send(Method::POST, url, Some(body)).await?;
        tracing::info!(
            symbol = order.trading_symbol,
            qty = order.quantity,
            order_id = %response.order_id,
            status = ?response.status,
            "Order placed"
        );
        Ok(response)
    }

    pub async fn modify_stop_loss(&self, order_id: &str, quantity: u64, trigger_price: Decimal) -> Result<OrderResponse> {
        let body = serde_json::to_string(&ModifyOrderRequest { order_id, quantity, trigger_price })?;
        let url = self.url("/v1/order/modify", &[])?;
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn order_detail(&self, order_id: &str) -> Result<OrderDetail> {
        let url = self.url("/v1/order/detail", &[("segment", SEGMENT), ("order_id", order_id)])?;
        self.send(Method::GET, url, None).await
    }

    /// Today's orders for the cash segment.
    pub async fn list_orders(&self) -> Result<Vec<OrderDetail>> {
        let url = self.url("/v1/order/list", &[("segment", SEGMENT)])?;
        self.send(Method::GET, url, None).await
    }
}

/// Unwraps a success envelope or turns an error body into `Error::ApiError`.
fn parse_response<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T> {
    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorBody>(text) {
            Ok(body) => Error::ApiError { code: body.error.code, msg: body.error.message },
            Err(_) => Error::ApiError { code: status.as_str().to_string(), msg: text.to_string() },
        });
    }
    let envelope: Envelope<T> = serde_json::from_str(text)?;
    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn client() -> ApiClient {
        ApiClient::new(&BrokerSettings {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            rest_base_url: "https://broker.example/".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn signature_is_stable_hex() {
        let c = client();
        let a = c.sign("1700000000000GET/v1/market/status?date=2024-01-02").unwrap();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_eq!(a, c.sign("1700000000000GET/v1/market/status?date=2024-01-02").unwrap());
        assert_ne!(a, c.sign("1700000000001GET/v1/market/status?date=2024-01-02").unwrap());
    }

    #[test]
    fn urls_are_encoded_against_the_trimmed_base() {
        let url = client().url("/v1/live-data/quote", &[("trading_symbol", "M&M")]).unwrap();
        assert_eq!(url.as_str(), "https://broker.example/v1/live-data/quote?trading_symbol=M%26M");
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let result = ApiClient::new(&BrokerSettings {
            api_key: String::new(),
            secret_key: String::new(),
            rest_base_url: "https://broker.example".to_string(),
        });
        assert!(matches!(result, Err(Error::ClientBuildError(_))));
    }

    #[test]
    fn missing_base_url_is_rejected() {
        let result = ApiClient::new(&BrokerSettings {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            rest_base_url: String::new(),
        });
        assert!(matches!(result, Err(Error::ClientBuildError(msg)) if msg.contains("rest_base_url")));
    }

    #[test]
    fn success_payload_is_unwrapped() {
        let quote: Quote = parse_response(
            StatusCode::OK,
            r#"{"status":"SUCCESS","payload":{"trading_symbol":"INFY","last_price":1510.5,
                "ohlc":{"open":1500,"high":1520.25,"low":1495,"close":1502.1}}}"#,
        )
        .unwrap();
        assert_eq!(quote.ohlc.open, dec!(1500));
        assert_eq!(quote.last_price, dec!(1510.5));
    }

    #[test]
    fn error_bodies_become_api_errors() {
        let err = parse_response::<Quote>(
            StatusCode::BAD_REQUEST,
            r#"{"status":"FAILURE","error":{"code":"GA004","message":"Invalid symbol"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ApiError { ref code, .. } if code == "GA004"));

        let err = parse_response::<Quote>(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, Error::ApiError { ref code, .. } if code == "502"));
    }
}
