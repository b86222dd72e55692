//! Summaries over repeated pricing of one contract.
//!
//! Gas prices and fiat rates move between oracle calls; pricing the same
//! estimate several times gives a mean and a spread instead of one draw.

use crate::cost::to_decimal;
use crate::error::CostError;
use crate::types::{CostReport, GasEstimate};
use serde::Serialize;

/// Mean and population standard deviation of a set of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
}

impl Summary {
    /// Zero for an empty slice.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self { mean, std_dev: variance.sqrt() }
    }
}

/// One contract priced `samples` times against a single gas estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampledReport {
    pub contract: String,
    pub contract_name: Option<String>,
    pub gas: GasEstimate,
    pub samples: usize,
    pub asset_fiat_rate: Summary,
    pub gas_units: Summary,
    pub gas_price_gwei: Summary,
    pub total_cost_denominated: Summary,
    pub total_cost_fiat: Summary,
}

impl SampledReport {
    pub fn from_costs(
        contract: String,
        contract_name: Option<String>,
        gas: GasEstimate,
        costs: &[CostReport],
    ) -> Result<Self, CostError> {
        let mut gas_prices = Vec::with_capacity(costs.len());
        let mut denominated = Vec::with_capacity(costs.len());
        for cost in costs {
            gas_prices.push(to_decimal(cost.gas_price_wei, "gwei")?);
            denominated.push(to_decimal(cost.total_cost_wei, "ether")?);
        }

        let metric = |f: fn(&CostReport) -> f64| {
            Summary::of(&costs.iter().map(f).collect::<Vec<_>>())
        };

        Ok(Self {
            contract,
            contract_name,
            gas,
            samples: costs.len(),
            asset_fiat_rate: metric(|c| c.asset_fiat_rate),
            gas_units: metric(|c| c.gas_units as f64),
            gas_price_gwei: Summary::of(&gas_prices),
            total_cost_denominated: Summary::of(&denominated),
            total_cost_fiat: metric(|c| c.total_cost_fiat),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::aggregate;
    use crate::types::GasSource;
    use alloy_primitives::U256;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn population_std_dev() {
        let summary = Summary::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(summary.mean, 5.0);
        assert_eq!(summary.std_dev, 2.0);
    }

    #[test]
    fn single_sample_has_no_spread() {
        assert_eq!(Summary::of(&[42.0]), Summary { mean: 42.0, std_dev: 0.0 });
        assert_eq!(Summary::of(&[]), Summary::default());
    }

    #[test]
    fn summarizes_each_metric() {
        let gwei = U256::from(1_000_000_000u64);
        let costs = [
            aggregate(421_000, U256::from(30) * gwei, None, 3000.0).unwrap(),
            aggregate(421_000, U256::from(50) * gwei, None, 3000.0).unwrap(),
        ];
        let gas = GasEstimate { gas_units: 421_000, source: GasSource::Heuristic, byte_size: 2000 };

        let report = SampledReport::from_costs("T.sol".into(), None, gas, &costs).unwrap();

        assert_eq!(report.samples, 2);
        assert_eq!(report.gas_units, Summary { mean: 421_000.0, std_dev: 0.0 });
        assert_eq!(report.asset_fiat_rate, Summary { mean: 3000.0, std_dev: 0.0 });
        assert!(close(report.gas_price_gwei.mean, 40.0));
        assert!(close(report.gas_price_gwei.std_dev, 10.0));
        assert!(close(report.total_cost_denominated.mean, 0.01684));
        assert!(close(report.total_cost_denominated.std_dev, 0.00421));
    }
}
