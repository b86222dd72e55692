//! Live deployment simulation.

use crate::error::SimulationError;
use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, trace};

/// Anything that can estimate the gas of a contract-creation transaction.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Short backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Gas used by a transaction with no recipient and `data` as init code.
    async fn estimate_deployment_gas(&self, data: &[u8]) -> Result<u64, SimulationError>;

    /// Current network fees, if the backend knows them.
    async fn fee_data(&self) -> Result<Option<FeeData>, SimulationError> {
        Ok(None)
    }
}

/// Fee data reported by a node, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: U256,
    pub max_priority_fee_per_gas: Option<U256>,
}

/// JSON-RPC node reached over HTTP.
#[derive(Debug, Clone)]
pub struct RpcNode {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcNode {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, SimulationError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let transport = |source: reqwest::Error| SimulationError::Transport {
            endpoint: self.url.clone(),
            source,
        };
        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        trace!(method, ?response, "node response");

        if let Some(err) = response.error {
            return Err(SimulationError::Rejected { method, code: err.code, message: err.message });
        }
        let result = response.result.ok_or_else(|| SimulationError::Malformed {
            method,
            reason: "missing result".to_string(),
        })?;
        serde_json::from_value(result)
            .map_err(|e| SimulationError::Malformed { method, reason: e.to_string() })
    }

    async fn quantity(&self, method: &'static str) -> Result<U256, SimulationError> {
        let raw: String = self.request(method, json!([])).await?;
        parse_quantity(&raw).ok_or_else(|| SimulationError::Malformed {
            method,
            reason: format!("not a hex quantity: {raw}"),
        })
    }
}

#[async_trait]
impl Simulator for RpcNode {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn estimate_deployment_gas(&self, data: &[u8]) -> Result<u64, SimulationError> {
        let method = "eth_estimateGas";
        let tx = json!({ "data": format!("0x{}", hex::encode(data)) });
        let raw: String = self.request(method, json!([tx])).await?;

        let gas = raw
            .strip_prefix("0x")
            .and_then(|digits| u64::from_str_radix(digits, 16).ok())
            .ok_or_else(|| SimulationError::Malformed {
                method,
                reason: format!("not a gas quantity: {raw}"),
            })?;
        debug!(gas, "node estimated deployment gas");
        Ok(gas)
    }

    async fn fee_data(&self) -> Result<Option<FeeData>, SimulationError> {
        let (gas_price, priority) = tokio::join!(
            self.quantity("eth_gasPrice"),
            self.quantity("eth_maxPriorityFeePerGas"),
        );

        // Older nodes lack eth_maxPriorityFeePerGas; treat that as no tip.
        let max_priority_fee_per_gas = priority
            .inspect_err(|err| debug!(%err, "no priority fee from node"))
            .ok();

        Ok(Some(FeeData { gas_price: gas_price?, max_priority_fee_per_gas }))
    }
}

fn parse_quantity(raw: &str) -> Option<U256> {
    let digits = raw.strip_prefix("0x")?;
    U256::from_str_radix(digits, 16).ok()
}
