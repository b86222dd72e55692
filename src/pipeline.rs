use crate::compile;
use crate::cost;
use crate::error::PipelineError;
use crate::estimate::GasEstimator;
use crate::oracle::PriceOracle;
use crate::resolver::ContractsDir;
use crate::simulate::Simulator;
use crate::solc::Compiler;
use crate::stats::SampledReport;
use crate::types::{CostReport, DeploymentReport, GasEstimate, GasSource, PriceQuote};
use alloy_primitives::U256;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a pipeline run is. Any failure ends the run in the stage it
/// happened in; see [`PipelineError::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadingSource,
    Compiling,
    EstimatingGas,
    FetchingPrices,
    Aggregating,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadingSource => "reading source",
            Self::Compiling => "compiling",
            Self::EstimatingGas => "estimating gas",
            Self::FetchingPrices => "fetching prices",
            Self::Aggregating => "aggregating",
            Self::Reporting => "reporting",
        })
    }
}

/// Result of one contract in a batch run.
#[derive(Debug)]
pub struct BatchEntry<T = DeploymentReport> {
    pub contract: PathBuf,
    pub outcome: Result<T, PipelineError>,
}

/// Compile, estimate, price. One run per contract; nothing is shared
/// between runs except the collaborators themselves.
pub struct Pipeline<'a> {
    compiler: &'a dyn Compiler,
    contracts: &'a ContractsDir,
    simulator: Option<&'a dyn Simulator>,
    oracle: &'a dyn PriceOracle,
    estimator: GasEstimator,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        compiler: &'a dyn Compiler,
        contracts: &'a ContractsDir,
        simulator: Option<&'a dyn Simulator>,
        oracle: &'a dyn PriceOracle,
    ) -> Self {
        Self { compiler, contracts, simulator, oracle, estimator: GasEstimator::default() }
    }

    /// Estimate the deployment cost of `contract`, relative to the contracts root.
    pub async fn run(&self, contract: &Path) -> Result<DeploymentReport, PipelineError> {
        let (contract_name, gas) = self.prepare(contract).await?;
        let cost = self.price(&gas).await?;

        Ok(DeploymentReport { contract: contract.display().to_string(), contract_name, gas, cost })
    }

    /// Compile and estimate once, then fetch prices and aggregate `samples`
    /// times. Any failing sample fails the whole contract.
    pub async fn run_sampled(
        &self,
        contract: &Path,
        samples: usize,
    ) -> Result<SampledReport, PipelineError> {
        let (contract_name, gas) = self.prepare(contract).await?;

        let samples = samples.max(1);
        let mut costs = Vec::with_capacity(samples);
        for sample in 0..samples {
            debug!(sample, "pricing sample");
            costs.push(self.price(&gas).await?);
        }

        Ok(SampledReport::from_costs(
            contract.display().to_string(),
            contract_name,
            gas,
            &costs,
        )?)
    }

    /// Reading, compiling and gas estimation.
    async fn prepare(
        &self,
        contract: &Path,
    ) -> Result<(Option<String>, GasEstimate), PipelineError> {
        debug!(contract = %contract.display(), stage = %Stage::ReadingSource, "starting");
        let compiled = compile::compile(self.compiler, self.contracts, contract)?;

        if compiled.has_errors() {
            return Err(PipelineError::CompilationFailed { diagnostics: compiled.into_diagnostics() });
        }
        info!(
            contract = %contract.display(),
            name = compiled.contract_name().unwrap_or("<none>"),
            "compiled"
        );

        debug!(stage = %Stage::EstimatingGas);
        let gas = self.estimator.estimate(&compiled.payload(), self.simulator).await;

        Ok((compiled.contract_name().map(str::to_owned), gas))
    }

    /// Price fetching and aggregation for an estimate.
    async fn price(&self, gas: &GasEstimate) -> Result<CostReport, PipelineError> {
        debug!(stage = %Stage::FetchingPrices, source = %gas.source);
        let quote = self.fetch_prices(gas.source).await?;

        debug!(stage = %Stage::Aggregating);
        Ok(cost::aggregate(
            gas.gas_units,
            quote.gas_price_wei,
            quote.priority_fee_wei,
            quote.asset_fiat_rate,
        )?)
    }

    /// Prices for a gas figure from `source`.
    ///
    /// Simulated figures use the node's fee data when it has any; everything
    /// else uses the oracle's gas price without a priority fee. The fiat rate
    /// always comes from the oracle, fetched concurrently.
    async fn fetch_prices(&self, source: GasSource) -> Result<PriceQuote, PipelineError> {
        if let (GasSource::Simulated, Some(simulator)) = (source, self.simulator) {
            let (fees, rate) =
                tokio::join!(simulator.fee_data(), self.oracle.fetch_asset_fiat_rate());
            let asset_fiat_rate = rate?;

            match fees {
                Ok(Some(fees)) => {
                    return Ok(PriceQuote {
                        gas_price_wei: fees.gas_price,
                        priority_fee_wei: Some(fees.max_priority_fee_per_gas.unwrap_or(U256::ZERO)),
                        asset_fiat_rate,
                    });
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "node fee data unavailable, using oracle gas price"),
            }

            let gas_price_wei = self.oracle.fetch_gas_price().await?;
            return Ok(PriceQuote { gas_price_wei, priority_fee_wei: None, asset_fiat_rate });
        }

        let (gas_price_wei, asset_fiat_rate) = tokio::try_join!(
            self.oracle.fetch_gas_price(),
            self.oracle.fetch_asset_fiat_rate()
        )?;
        Ok(PriceQuote { gas_price_wei, priority_fee_wei: None, asset_fiat_rate })
    }

    /// Estimate every `.sol` file under `dir`, subdirectories included, in
    /// path order.
    ///
    /// Individual failures are recorded in their entry and do not stop the
    /// batch.
    pub async fn run_batch(&self, dir: &Path) -> io::Result<Vec<BatchEntry>> {
        self.each_contract(dir, move |contract| async move { self.run(&contract).await })
            .await
    }

    /// [`Pipeline::run_batch`] with [`Pipeline::run_sampled`] per contract.
    pub async fn run_batch_sampled(
        &self,
        dir: &Path,
        samples: usize,
    ) -> io::Result<Vec<BatchEntry<SampledReport>>> {
        self.each_contract(dir, move |contract| async move {
            self.run_sampled(&contract, samples).await
        })
        .await
    }

    async fn each_contract<T, F, Fut>(&self, dir: &Path, run: F) -> io::Result<Vec<BatchEntry<T>>>
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut contracts = Vec::new();
        self.collect_sources(dir, &mut contracts)?;
        contracts.sort();

        let mut entries = Vec::with_capacity(contracts.len());
        for contract in contracts {
            let outcome = run(contract.clone()).await;
            if let Err(err) = &outcome {
                warn!(contract = %contract.display(), %err, "estimate failed");
            }
            entries.push(BatchEntry { contract, outcome });
        }

        Ok(entries)
    }

    /// Push every `.sol` file below `relative` (relative to the contracts
    /// root). Symlinked directories are not followed.
    fn collect_sources(&self, relative: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(self.contracts.contract_path(relative))? {
            let entry = entry?;
            let path = relative.join(entry.file_name());

            if entry.file_type()?.is_dir() {
                self.collect_sources(&path, found)?;
            } else if entry.path().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("sol")
            {
                found.push(path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_read_as_progress() {
        assert_eq!(Stage::FetchingPrices.to_string(), "fetching prices");
        assert_eq!(Stage::ReadingSource.to_string(), "reading source");
    }
}
