//! Two-tier gas estimation: live simulation first, size heuristic second.

use crate::compile::decode_bytecode;
use crate::error::SimulationError;
use crate::simulate::Simulator;
use crate::types::{DeploymentPayload, GasEstimate, GasSource};
use tracing::{info, warn};

/// Flat cost of any transaction.
pub const BASE_TX_GAS: u64 = 21_000;
/// Linear per-byte approximation of deployment data cost.
pub const GAS_PER_BYTE: u64 = 200;

/// Which tier an estimate attempt is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Simulation,
    Heuristic,
}

/// Produces a [`GasEstimate`] for a deployment payload.
#[derive(Debug, Clone, Copy)]
pub struct GasEstimator {
    base_gas: u64,
    gas_per_byte: u64,
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self { base_gas: BASE_TX_GAS, gas_per_byte: GAS_PER_BYTE }
    }
}

impl GasEstimator {
    /// The tier an estimate starts in.
    ///
    /// Simulation needs both a capability and real bytecode; a size hint or
    /// a non-deployable artifact goes straight to the heuristic.
    pub fn initial_tier(payload: &DeploymentPayload, simulator: Option<&dyn Simulator>) -> Tier {
        match (payload, simulator) {
            (DeploymentPayload::Bytecode(_), Some(_)) => Tier::Simulation,
            _ => Tier::Heuristic,
        }
    }

    /// Estimate gas, falling back to the heuristic whenever simulation fails.
    pub async fn estimate(
        &self,
        payload: &DeploymentPayload,
        simulator: Option<&dyn Simulator>,
    ) -> GasEstimate {
        let mut tier = Self::initial_tier(payload, simulator);

        loop {
            match (tier, payload, simulator) {
                (Tier::Simulation, DeploymentPayload::Bytecode(hex), Some(simulator)) => {
                    match self.simulate(hex, simulator).await {
                        Ok(estimate) => return estimate,
                        Err(err) => {
                            warn!(
                                backend = simulator.name(),
                                %err,
                                "simulation failed, falling back to bytecode size estimation"
                            );
                            tier = Tier::Heuristic;
                        }
                    }
                }
                _ => return self.heuristic(payload),
            }
        }
    }

    /// Simulation tier: the capability's figure is used as-is.
    pub async fn simulate(
        &self,
        bytecode_hex: &str,
        simulator: &dyn Simulator,
    ) -> Result<GasEstimate, SimulationError> {
        let data = decode_bytecode(bytecode_hex)?;
        let gas_units = simulator.estimate_deployment_gas(&data).await?;
        info!(backend = simulator.name(), gas_units, "simulated deployment");

        Ok(GasEstimate {
            gas_units,
            source: GasSource::Simulated,
            byte_size: data.len() as u64,
        })
    }

    /// Heuristic tier: base cost plus a flat cost per byte of payload.
    ///
    /// Non-deployable artifacts get the base cost only.
    pub fn heuristic(&self, payload: &DeploymentPayload) -> GasEstimate {
        let byte_size = payload.byte_len();
        let gas_units = self.base_gas.saturating_add(byte_size.saturating_mul(self.gas_per_byte));
        info!(byte_size, gas_units, "heuristic gas estimate");

        GasEstimate { gas_units, source: GasSource::Heuristic, byte_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        gas: Option<u64>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(gas: u64) -> Self {
            Self { gas: Some(gas), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { gas: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Simulator for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn estimate_deployment_gas(&self, _data: &[u8]) -> Result<u64, SimulationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gas.ok_or_else(|| SimulationError::Reverted(String::new()))
        }
    }

    fn bytecode(bytes: usize) -> DeploymentPayload {
        DeploymentPayload::Bytecode("60".repeat(bytes))
    }

    #[tokio::test]
    async fn heuristic_without_simulator() {
        let estimate = GasEstimator::default().estimate(&bytecode(2000), None).await;
        assert_eq!(estimate.gas_units, 421_000);
        assert_eq!(estimate.source, GasSource::Heuristic);
        assert_eq!(estimate.byte_size, 2000);
    }

    #[tokio::test]
    async fn failing_simulation_falls_back() {
        let simulator = Fixed::failing();
        let estimate = GasEstimator::default().estimate(&bytecode(10), Some(&simulator)).await;

        assert_eq!(simulator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(estimate.source, GasSource::Heuristic);
        assert_eq!(estimate.gas_units, 21_000 + 10 * 200);
    }

    #[tokio::test]
    async fn successful_simulation_is_used_as_is() {
        let simulator = Fixed::ok(123_456);
        let estimate = GasEstimator::default().estimate(&bytecode(10), Some(&simulator)).await;

        assert_eq!(estimate.source, GasSource::Simulated);
        assert_eq!(estimate.gas_units, 123_456);
        assert_eq!(estimate.byte_size, 10);
    }

    #[tokio::test]
    async fn invalid_hex_falls_back_without_calling_simulator() {
        let simulator = Fixed::ok(1);
        let payload = DeploymentPayload::Bytecode("zz".into());
        let estimate = GasEstimator::default().estimate(&payload, Some(&simulator)).await;

        assert_eq!(simulator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(estimate.source, GasSource::Heuristic);
    }

    #[tokio::test]
    async fn size_hint_skips_simulation() {
        let simulator = Fixed::ok(1);
        let payload = DeploymentPayload::SizeHint(30_000);
        assert_eq!(GasEstimator::initial_tier(&payload, Some(&simulator)), Tier::Heuristic);

        let estimate = GasEstimator::default().estimate(&payload, Some(&simulator)).await;
        assert_eq!(estimate.gas_units, 21_000 + 30_000 * 200);
        assert_eq!(simulator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_deployable_gets_minimum() {
        let estimate = GasEstimator::default()
            .estimate(&DeploymentPayload::NoDeployableBytecode, None)
            .await;
        assert_eq!(estimate.gas_units, BASE_TX_GAS);
        assert_eq!(estimate.byte_size, 0);
    }

    #[test]
    fn heuristic_is_exact_for_many_sizes() {
        let estimator = GasEstimator::default();
        for bytes in [0usize, 1, 2, 31, 24_576, 49_152] {
            let estimate = estimator.heuristic(&bytecode(bytes));
            assert_eq!(estimate.gas_units, 21_000 + bytes as u64 * 200);
        }
    }
}
