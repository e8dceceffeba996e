/// Etherscan gas oracle client
///
/// One endpoint is used:
/// 1. ?module=gastracker&action=gasoracle - Current gas prices in gwei
///
/// The USD conversion multiplies the fast gas price by an estimated per-swap
/// gas budget and the reference ETH price fetched from GeckoTerminal.
use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::errors::{WatchError, WatchResult};
use crate::http::{build_client_from_config, classify_send_error, RateLimiter, RetryPolicy};
use crate::logger::{self, LogTag};
use crate::metrics::round2;

/// Gas units assumed per swap when quoting gas in USD.
pub const SWAP_GAS_UNITS: f64 = 356_190.0;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Raw gas oracle envelope.
///
/// On errors Etherscan replaces `result` with a plain string, so the field
/// stays a `Value` and extraction is explicit.
#[derive(Debug, Deserialize)]
pub struct GasOracleResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl GasOracleResponse {
    /// Fast gas price in gwei, if the oracle returned one.
    pub fn fast_gas_gwei(&self) -> WatchResult<f64> {
        let raw = self
            .result
            .get("FastGasPrice")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                WatchError::Parse(format!(
                    "gas oracle response missing FastGasPrice (status={:?}, message={:?})",
                    self.status, self.message
                ))
            })?;

        raw.parse::<f64>()
            .map_err(|e| WatchError::Parse(format!("bad FastGasPrice value {:?}: {}", raw, e)))
    }
}

/// Convert a gwei gas price into the USD cost of one swap.
pub fn gas_price_usd(gwei: f64, eth_price_usd: f64) -> f64 {
    round2(gwei * SWAP_GAS_UNITS * 1e-9 * eth_price_usd)
}

// ============================================================================
// CLIENT IMPLEMENTATION
// ============================================================================

/// Etherscan API client with rate limiting and retries
pub struct EtherscanClient {
    client: Client,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl EtherscanClient {
    pub fn from_config(config: &Config) -> WatchResult<Self> {
        Ok(Self {
            client: build_client_from_config(config)?,
            rate_limiter: RateLimiter::new(config.api.rate_limit_per_minute),
            retry: RetryPolicy::from_config(&config.api),
            base_url: config.api.etherscan_url.trim_end_matches('/').to_string(),
            api_key: config.api.etherscan_api_key.clone(),
            timeout_secs: config.api.request_timeout_seconds,
        })
    }

    /// Current fast gas price in gwei.
    pub async fn fetch_gas_gwei(&self) -> WatchResult<f64> {
        let url = format!(
            "{}?module=gastracker&action=gasoracle&apikey={}",
            self.base_url, self.api_key
        );

        logger::debug(LogTag::Gas, "[ETHERSCAN] Fetching gas oracle");

        let response: GasOracleResponse = self
            .retry
            .run("etherscan gas_oracle", || self.attempt_get(&url))
            .await?;

        response.fast_gas_gwei()
    }

    async fn attempt_get(&self, url: &str) -> WatchResult<GasOracleResponse> {
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
            .json::<GasOracleResponse>()
            .await
            .map_err(|e| WatchError::Parse(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gas_oracle_response() {
        let body = r#"{
            "status": "1",
            "message": "OK",
            "result": {
                "LastBlock": "18999999",
                "SafeGasPrice": "20",
                "ProposeGasPrice": "25",
                "FastGasPrice": "30",
                "suggestBaseFee": "19.5",
                "gasUsedRatio": "0.5,0.4,0.6"
            }
        }"#;

        let response: GasOracleResponse = serde_json::from_str(body).unwrap();
        assert!((response.fast_gas_gwei().unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_envelope_is_a_parse_error() {
        // Etherscan reports rate limiting with a string result.
        let body = r#"{
            "status": "0",
            "message": "NOTOK",
            "result": "Max rate limit reached"
        }"#;

        let response: GasOracleResponse = serde_json::from_str(body).unwrap();
        assert!(response.fast_gas_gwei().is_err());
    }

    #[test]
    fn test_gas_price_usd_conversion() {
        // 30 gwei * 356190 units * 1e-9 * 2000 USD = 21.3714 -> 21.37
        let usd = gas_price_usd(30.0, 2000.0);
        assert!((usd - 21.37).abs() < 1e-9);
    }

    #[test]
    fn test_gas_price_usd_zero_inputs() {
        assert_eq!(gas_price_usd(0.0, 2000.0), 0.0);
        assert_eq!(gas_price_usd(30.0, 0.0), 0.0);
    }
}
