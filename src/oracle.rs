//! Gas price and asset/fiat rate oracles.
//!
//! The two lookups are independent and fail independently; either failure
//! is fatal to a run, since no cost can be computed without both.

use crate::config::{Config, FiatSource};
use crate::cost::gwei_to_wei;
use crate::error::OracleError;
use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info, trace};

/// External prices needed to turn gas into money.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Recommended gas price in wei.
    async fn fetch_gas_price(&self) -> Result<U256, OracleError>;

    /// Price of one unit of the native asset in fiat.
    async fn fetch_asset_fiat_rate(&self) -> Result<f64, OracleError>;
}

/// Etherscan gas tracker plus an Etherscan or CoinGecko fiat rate.
#[derive(Debug, Clone)]
pub struct OracleClient {
    client: reqwest::Client,
    api_key: String,
    chain_id: u64,
    etherscan_url: String,
    coingecko_url: String,
    fiat_source: FiatSource,
}

/// Envelope of every Etherscan API response.
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GasOracle {
    propose_gas_price: String,
}

#[derive(Debug, Deserialize)]
struct EthPrice {
    ethusd: String,
}

impl OracleClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone().unwrap_or_default(),
            chain_id: config.chain_id,
            etherscan_url: config.endpoints.etherscan_url.clone(),
            coingecko_url: config.endpoints.coingecko_url.trim_end_matches('/').to_string(),
            fiat_source: config.fiat_source,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, OracleError> {
        let unavailable = |source: reqwest::Error| OracleError::Unavailable {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .inspect_err(|err| error!(%endpoint, %err, "failed to fetch from oracle"))
            .map_err(unavailable)?;

        let body = response.text().await.map_err(unavailable)?;
        trace!(%endpoint, %body, "oracle response");

        serde_json::from_str(&body).map_err(|e| OracleError::Malformed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    /// Call an Etherscan module/action and unwrap its `result`.
    async fn etherscan<T: DeserializeOwned>(
        &self,
        module: &str,
        action: &str,
    ) -> Result<T, OracleError> {
        let endpoint = format!("etherscan {module}/{action}");
        let chain_id = self.chain_id.to_string();
        let query = [
            ("chainid", chain_id.as_str()),
            ("module", module),
            ("action", action),
            ("apikey", self.api_key.as_str()),
        ];

        let response: EtherscanResponse =
            self.get_json(&endpoint, &self.etherscan_url, &query).await?;

        if response.status != "1" {
            let detail = response.result.as_str().unwrap_or_default();
            return Err(OracleError::Rejected {
                endpoint,
                message: format!("{} {detail}", response.message).trim().to_string(),
            });
        }

        serde_json::from_value(response.result)
            .map_err(|e| OracleError::Malformed { endpoint, reason: e.to_string() })
    }

    async fn coingecko_rate(&self) -> Result<f64, OracleError> {
        let endpoint = "coingecko simple/price";
        let url = format!("{}/simple/price", self.coingecko_url);
        let query = [("ids", "ethereum"), ("vs_currencies", "usd")];

        let data: HashMap<String, HashMap<String, f64>> =
            self.get_json(endpoint, &url, &query).await?;

        data.get("ethereum")
            .and_then(|prices| prices.get("usd"))
            .copied()
            .ok_or_else(|| OracleError::Malformed {
                endpoint: endpoint.to_string(),
                reason: "missing ethereum.usd".to_string(),
            })
    }
}

#[async_trait]
impl PriceOracle for OracleClient {
    async fn fetch_gas_price(&self) -> Result<U256, OracleError> {
        let oracle: GasOracle = self.etherscan("gastracker", "gasoracle").await?;
        let wei = gwei_to_wei(&oracle.propose_gas_price).map_err(|e| OracleError::Malformed {
            endpoint: "etherscan gastracker/gasoracle".to_string(),
            reason: e.to_string(),
        })?;
        info!(gwei = %oracle.propose_gas_price, "fetched gas price");
        Ok(wei)
    }

    async fn fetch_asset_fiat_rate(&self) -> Result<f64, OracleError> {
        let (endpoint, rate) = match self.fiat_source {
            FiatSource::Etherscan => {
                let price: EthPrice = self.etherscan("stats", "ethprice").await?;
                let rate = price.ethusd.trim().parse::<f64>().map_err(|e| {
                    OracleError::Malformed {
                        endpoint: "etherscan stats/ethprice".to_string(),
                        reason: format!("ethusd {:?}: {e}", price.ethusd),
                    }
                })?;
                ("etherscan stats/ethprice", rate)
            }
            FiatSource::Coingecko => ("coingecko simple/price", self.coingecko_rate().await?),
        };

        if !rate.is_finite() || rate <= 0.0 {
            return Err(OracleError::Malformed {
                endpoint: endpoint.to_string(),
                reason: format!("implausible rate {rate}"),
            });
        }
        info!(rate, "fetched fiat rate");
        Ok(rate)
    }
}
