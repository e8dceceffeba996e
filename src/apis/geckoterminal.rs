/// GeckoTerminal API client
///
/// API Documentation: https://www.geckoterminal.com/dex-api
///
/// One endpoint is used:
/// 1. /{network}/tokens/multi/{addresses} - Metrics for several tokens at once
///
/// Numeric fields arrive as strings and are parsed into [`TokenQuote`].
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Config;
use crate::errors::{WatchError, WatchResult};
use crate::http::{build_client_from_config, classify_send_error, RateLimiter, RetryPolicy};
use crate::logger::{self, LogTag};

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TokensMultiResponse {
    #[serde(default)]
    pub data: Vec<TokenEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TokenEntry {
    pub attributes: TokenAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenAttributes {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<i64>,
    pub price_usd: Option<String>,
    pub fdv_usd: Option<String>,
    #[serde(default)]
    pub volume_usd: VolumeUsd,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeUsd {
    pub h24: Option<String>,
}

/// Parsed numeric view of one token from the multi endpoint.
/// `fdv_usd` maps to market cap.
#[derive(Debug, Clone)]
pub struct TokenQuote {
    pub address: String,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub volume_24h_usd: f64,
}

impl TokenAttributes {
    /// Convert string-typed attributes into a numeric quote.
    ///
    /// Address and price are required; market cap and volume fall back to
    /// zero when the API omits them.
    pub fn to_quote(&self) -> WatchResult<TokenQuote> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| WatchError::Parse("token entry missing address".to_string()))?;

        let price_usd = parse_decimal_field(self.price_usd.as_deref(), "price_usd")?;

        let market_cap_usd = self
            .fdv_usd
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);

        let volume_24h_usd = self
            .volume_usd
            .h24
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(TokenQuote {
            address,
            price_usd,
            market_cap_usd,
            volume_24h_usd,
        })
    }
}

fn parse_decimal_field(raw: Option<&str>, field: &str) -> WatchResult<f64> {
    let raw =
        raw.ok_or_else(|| WatchError::Parse(format!("token entry missing {}", field)))?;
    raw.parse::<f64>()
        .map_err(|e| WatchError::Parse(format!("bad {} value {:?}: {}", field, raw, e)))
}

// ============================================================================
// CLIENT IMPLEMENTATION
// ============================================================================

/// GeckoTerminal API client with rate limiting and retries
pub struct GeckoTerminalClient {
    client: Client,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    base_url: String,
    timeout_secs: u64,
}

impl GeckoTerminalClient {
    pub fn from_config(config: &Config) -> WatchResult<Self> {
        Ok(Self {
            client: build_client_from_config(config)?,
            rate_limiter: RateLimiter::new(config.api.rate_limit_per_minute),
            retry: RetryPolicy::from_config(&config.api),
            base_url: config.api.geckoterminal_url.trim_end_matches('/').to_string(),
            timeout_secs: config.api.request_timeout_seconds,
        })
    }

    /// Fetch metrics for several tokens on one network in a single call.
    pub async fn fetch_tokens_multi(
        &self,
        network: &str,
        addresses: &[String],
    ) -> WatchResult<Vec<TokenQuote>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        // Comma must be pre-encoded or the endpoint returns only the first token.
        let joined = addresses.join("%2C");
        let url = format!("{}/{}/tokens/multi/{}", self.base_url, network, joined);

        logger::debug(
            LogTag::Api,
            &format!(
                "[GECKOTERMINAL] Fetching tokens multi: network={}, count={}",
                network,
                addresses.len()
            ),
        );

        let response: TokensMultiResponse =
            self.get_json("geckoterminal tokens_multi", &url).await?;

        let mut quotes = Vec::with_capacity(response.data.len());
        for entry in response.data {
            match entry.attributes.to_quote() {
                Ok(quote) => quotes.push(quote),
                Err(err) => logger::warning(
                    LogTag::Api,
                    &format!("[GECKOTERMINAL] Skipping malformed token entry: {}", err),
                ),
            }
        }

        Ok(quotes)
    }

    /// Price of the reference token used for gas USD conversion.
    pub async fn fetch_reference_price(&self, network: &str, address: &str) -> WatchResult<f64> {
        let quotes = self
            .fetch_tokens_multi(network, &[address.to_string()])
            .await?;

        quotes.into_iter().next().map(|q| q.price_usd).ok_or_else(|| {
            WatchError::Parse(format!("no price returned for reference token {}", address))
        })
    }

    async fn get_json<T>(&self, label: &str, url: &str) -> WatchResult<T>
    where
        T: DeserializeOwned,
    {
        self.retry.run(label, || self.attempt_get::<T>(url)).await
    }

    async fn attempt_get<T>(&self, url: &str) -> WatchResult<T>
    where
        T: DeserializeOwned,
    {
        let _guard = self.rate_limiter.acquire().await?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WatchError::Parse(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
        "data": [
            {
                "id": "eth_0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
                "type": "token",
                "attributes": {
                    "address": "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
                    "name": "Wrapped Ether",
                    "symbol": "WETH",
                    "decimals": 18,
                    "price_usd": "2456.78",
                    "fdv_usd": "7390000000",
                    "volume_usd": { "h24": "1234567.89" }
                }
            },
            {
                "id": "eth_0xdac17f958d2ee523a2206206994597c13d831ec7",
                "type": "token",
                "attributes": {
                    "address": "0xdac17f958d2ee523a2206206994597c13d831ec7",
                    "name": "Tether",
                    "symbol": "USDT",
                    "decimals": 6,
                    "price_usd": "1.0",
                    "fdv_usd": null,
                    "volume_usd": {}
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_tokens_multi_response() {
        let response: TokensMultiResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        assert_eq!(response.data.len(), 2);

        let weth = response.data[0].attributes.to_quote().unwrap();
        assert_eq!(weth.address, "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        assert!((weth.price_usd - 2456.78).abs() < 1e-9);
        assert!((weth.market_cap_usd - 7_390_000_000.0).abs() < 1.0);
        assert!((weth.volume_24h_usd - 1_234_567.89).abs() < 1e-6);
    }

    #[test]
    fn test_missing_optional_fields_fall_back_to_zero() {
        let response: TokensMultiResponse = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        let usdt = response.data[1].attributes.to_quote().unwrap();
        assert!((usdt.price_usd - 1.0).abs() < 1e-9);
        assert_eq!(usdt.market_cap_usd, 0.0);
        assert_eq!(usdt.volume_24h_usd, 0.0);
    }

    #[test]
    fn test_missing_price_is_an_error() {
        let attrs = TokenAttributes {
            address: Some("0xabc".to_string()),
            name: None,
            symbol: None,
            decimals: None,
            price_usd: None,
            fdv_usd: None,
            volume_usd: VolumeUsd::default(),
        };
        assert!(attrs.to_quote().is_err());
    }

    #[test]
    fn test_missing_address_is_an_error() {
        let attrs = TokenAttributes {
            address: None,
            name: None,
            symbol: None,
            decimals: None,
            price_usd: Some("1.0".to_string()),
            fdv_usd: None,
            volume_usd: VolumeUsd::default(),
        };
        assert!(attrs.to_quote().is_err());
    }

    #[test]
    fn test_empty_data_parses() {
        let response: TokensMultiResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(response.data.is_empty());
    }
}
