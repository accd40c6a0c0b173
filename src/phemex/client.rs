//! Signed REST client for the Phemex spot API

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use hmac::{Hmac, Mac};
use log::{debug, error};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tokio::sync::Mutex;

use super::types::{
    ApiResponse, MarketResponse, NewSpotOrder, OrderList, SpotOrder, SpotTicker,
    NO_OPEN_ORDERS_CODE,
};
use crate::grid::{GridError, GridResult};

type HmacSha256 = Hmac<Sha256>;

pub const MAINNET_API_URL: &str = "https://api.phemex.com";
pub const TESTNET_API_URL: &str = "https://testnet-api.phemex.com";

/// Phemex client settings.
///
/// `Debug` masks the key and never prints the secret.
#[derive(Clone)]
pub struct PhemexConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub testnet: bool,
    /// Overrides the mainnet/testnet URL
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Seconds a signature stays valid
    pub expiry_secs: i64,
    /// Minimum spacing between two requests
    pub min_request_interval_ms: u64,
}

/// First and last four characters of a key, or a placeholder for short keys
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***REDACTED***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

impl fmt::Debug for PhemexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = match &self.api_key {
            Some(key) => mask_key(key),
            None => "<none>".to_string(),
        };

        f.debug_struct("PhemexConfig")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .field("testnet", &self.testnet)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("expiry_secs", &self.expiry_secs)
            .field("min_request_interval_ms", &self.min_request_interval_ms)
            .finish()
    }
}

impl Default for PhemexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            testnet: false,
            base_url: None,
            timeout_secs: 30,
            expiry_secs: 60,
            min_request_interval_ms: 100,
        }
    }
}

impl PhemexConfig {
    /// Public-only configuration (market data, paper trading)
    pub fn public() -> Self {
        Self::default()
    }

    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_secret: Some(api_secret.into()),
            ..Self::default()
        }
    }

    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_expiry_secs(mut self, secs: i64) -> Self {
        self.expiry_secs = secs;
        self
    }

    pub fn with_min_request_interval_ms(mut self, ms: u64) -> Self {
        self.min_request_interval_ms = ms;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    pub fn rest_base_url(&self) -> &str {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/');
        }
        if self.testnet {
            TESTNET_API_URL
        } else {
            MAINNET_API_URL
        }
    }
}

pub struct PhemexClient {
    config: PhemexConfig,
    http: Client,
    last_request: Mutex<Option<Instant>>,
}

impl PhemexClient {
    pub fn new(config: PhemexConfig) -> GridResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http,
            last_request: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PhemexConfig {
        &self.config
    }

    /// hex(HMAC-SHA256(secret, path + query + expiry + body))
    pub(crate) fn sign(secret: &str, path: &str, query: &str, expiry: i64, body: &str) -> GridResult<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| GridError::MissingCredentials(e.to_string()))?;
        mac.update(path.as_bytes());
        mac.update(query.as_bytes());
        mac.update(expiry.to_string().as_bytes());
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn credentials(&self) -> GridResult<(&str, &str)> {
        match (&self.config.api_key, &self.config.api_secret) {
            (Some(key), Some(secret)) => Ok((key.as_str(), secret.as_str())),
            _ => Err(GridError::MissingCredentials(
                "PHEMEX_API_KEY and PHEMEX_API_SECRET are required for trading".into(),
            )),
        }
    }

    fn url(&self, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.config.rest_base_url(), path)
        } else {
            format!("{}{}?{}", self.config.rest_base_url(), path, query)
        }
    }

    /// Keep at least `min_request_interval_ms` between requests
    async fn throttle(&self) {
        let interval = Duration::from_millis(self.config.min_request_interval_ms);
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Unauthenticated market data request
    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> GridResult<T> {
        let query = Self::build_query(params);
        let url = self.url(path, &query);

        self.throttle().await;
        debug!("GET {}", url);

        let response = self.http.get(&url).send().await?;
        let body = Self::read_body(response).await?;
        let parsed: MarketResponse<T> = Self::parse(&body)?;
        parsed.into_result()
    }

    /// Authenticated trading request
    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<String>,
    ) -> GridResult<Option<T>> {
        let (api_key, api_secret) = self.credentials()?;
        let query = Self::build_query(params);
        let body = body.unwrap_or_default();
        let expiry = Utc::now().timestamp() + self.config.expiry_secs;
        let signature = Self::sign(api_secret, path, &query, expiry, &body)?;
        let url = self.url(path, &query);

        self.throttle().await;
        debug!("{} (signed) {}", method, path);

        let mut request = self
            .http
            .request(method, &url)
            .header("x-phemex-access-token", api_key)
            .header("x-phemex-request-expiry", expiry.to_string())
            .header("x-phemex-request-signature", signature);

        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let text = Self::read_body(response).await?;
        let parsed: ApiResponse<T> = Self::parse(&text)?;
        parsed.into_result()
    }

    async fn read_body(response: reqwest::Response) -> GridResult<String> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        // Error bodies still carry the business code when Phemex produced them
        if let Ok(envelope) = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body) {
            if envelope.code != 0 {
                return Err(GridError::Api {
                    code: envelope.code,
                    message: envelope.msg,
                });
            }
        }

        Err(GridError::Api {
            code: status.as_u16() as i64,
            message: body,
        })
    }

    fn parse<T: DeserializeOwned>(body: &str) -> GridResult<T> {
        serde_json::from_str(body).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, body);
            GridError::JsonParse(e.to_string())
        })
    }

    pub async fn spot_ticker(&self, symbol: &str) -> GridResult<SpotTicker> {
        self.public_get("/md/spot/ticker/24hr", &[("symbol", symbol.to_string())])
            .await
    }

    /// Resting orders; an empty book is reported by Phemex as an error code
    pub async fn spot_open_orders(&self, symbol: &str) -> GridResult<Vec<SpotOrder>> {
        let result = self
            .signed_request::<OrderList>(
                Method::GET,
                "/spot/orders",
                &[("symbol", symbol.to_string())],
                None,
            )
            .await;

        match result {
            Ok(Some(list)) => Ok(list.into_vec()),
            Ok(None) => Ok(Vec::new()),
            Err(GridError::Api { code, .. }) if code == NO_OPEN_ORDERS_CODE => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn place_spot_order(&self, order: &NewSpotOrder) -> GridResult<SpotOrder> {
        let body = serde_json::to_string(order)?;
        self.signed_request::<SpotOrder>(Method::POST, "/spot/orders", &[], Some(body))
            .await?
            .ok_or_else(|| GridError::Exchange("order response without data".into()))
    }

    pub async fn cancel_spot_order(&self, symbol: &str, order_id: &str) -> GridResult<()> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderID", order_id.to_string()),
        ];

        match self
            .signed_request::<serde_json::Value>(Method::DELETE, "/spot/orders", &params, None)
            .await
        {
            Ok(_) => Ok(()),
            Err(GridError::Api { code, message }) if code == NO_OPEN_ORDERS_CODE => {
                Err(GridError::OrderNotFound(format!("{} ({})", order_id, message)))
            }
            Err(e) => Err(e),
        }
    }
}
