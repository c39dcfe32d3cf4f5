//! MEXC futures REST API client.

use crate::config::ExchangeConfig;
use crate::exchange::error::{ExchangeError, ExchangeResult};
use crate::exchange::traits::FuturesGateway;
use crate::exchange::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const ASSETS_PATH: &str = "/api/v1/private/account/assets";
const OPEN_POSITIONS_PATH: &str = "/api/v1/private/position/open_positions";
const TICKER_PATH: &str = "/api/v1/contract/ticker";
const CONTRACT_DETAIL_PATH: &str = "/api/v1/contract/detail";
const HISTORY_ORDERS_PATH: &str = "/api/v1/private/order/list/history_orders";

/// MEXC API client for the USDT-margined futures market.
pub struct MexcClient {
    http: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
    recv_window_secs: u64,
}

impl MexcClient {
    /// Create a new MEXC client from configuration.
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            recv_window_secs: config.recv_window_secs,
        })
    }

    /// Current timestamp in milliseconds.
    fn timestamp() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    // ==================== Transport ====================

    #[instrument(skip(self))]
    async fn get_public<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        endpoint: &'static str,
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;

        read_envelope(response, endpoint).await
    }

    #[instrument(skip(self, params))]
    async fn get_signed<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        params: &[(&str, String)],
        endpoint: &'static str,
    ) -> ExchangeResult<T> {
        let param_string = encode_params(params);
        let request_time = Self::timestamp().to_string();
        let signature = sign(&self.api_key, &self.secret_key, &request_time, &param_string);

        let url = if param_string.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, param_string)
        };

        let response = self
            .http
            .get(&url)
            .header("ApiKey", &self.api_key)
            .header("Request-Time", &request_time)
            .header("Signature", signature)
            .header("Recv-Window", self.recv_window_secs.to_string())
            .send()
            .await?;

        read_envelope(response, endpoint).await
    }
}

/// Sort parameters by key and join them as `k=v` pairs with URL-encoded values.
pub fn encode_params(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 over `api_key + request_time + param_string`, hex encoded.
pub fn sign(api_key: &str, secret_key: &str, request_time: &str, param_string: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(api_key.as_bytes());
    mac.update(request_time.as_bytes());
    mac.update(param_string.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check status and envelope, then decode the `data` payload.
///
/// A successful envelope without `data` (absent or `null`) decodes to
/// `T::default()`, i.e. an empty list for the list endpoints.
async fn read_envelope<T: DeserializeOwned + Default>(
    response: Response,
    endpoint: &'static str,
) -> ExchangeResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!(endpoint, status = status.as_u16(), "Exchange returned HTTP error");
        return Err(ExchangeError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(&body)
        .map_err(|source| ExchangeError::Decode { endpoint, source })?;

    if !envelope.success || envelope.code != 0 {
        return Err(ExchangeError::Api {
            code: envelope.code,
            message: envelope
                .message
                .unwrap_or_else(|| "no message".to_string()),
        });
    }

    let data = match envelope.data {
        Some(serde_json::Value::Null) | None => {
            debug!(endpoint, "Exchange returned no data");
            return Ok(T::default());
        }
        Some(data) => data,
    };
    debug!(endpoint, "Decoding exchange payload");
    serde_json::from_value(data).map_err(|source| ExchangeError::Decode { endpoint, source })
}

#[async_trait]
impl FuturesGateway for MexcClient {
    async fn account_assets(&self) -> ExchangeResult<Vec<AssetBalance>> {
        self.get_signed(ASSETS_PATH, &[], "account assets").await
    }

    async fn open_positions(&self) -> ExchangeResult<Vec<OpenPosition>> {
        self.get_signed(OPEN_POSITIONS_PATH, &[], "open positions")
            .await
    }

    async fn tickers(&self) -> ExchangeResult<Vec<Ticker>> {
        self.get_public(TICKER_PATH, "tickers").await
    }

    async fn contracts(&self) -> ExchangeResult<Vec<ContractDetail>> {
        self.get_public(CONTRACT_DETAIL_PATH, "contract details")
            .await
    }

    async fn history_orders(&self, query: HistoryQuery) -> ExchangeResult<OrderPage> {
        let page: RawOrderPage = self
            .get_signed(HISTORY_ORDERS_PATH, &query.params(), "history orders")
            .await?;
        Ok(page.into())
    }
}
