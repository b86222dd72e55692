//! Rendering of deployment reports as text, JSON and CSV.

use crate::cost::format_wei;
use crate::error::CostError;
use crate::pipeline::BatchEntry;
use crate::stats::{SampledReport, Summary};
use crate::types::DeploymentReport;
use serde::Serialize;
use std::io;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
    Csv,
}

/// Labelled, human-readable report lines.
pub fn render_text(report: &DeploymentReport) -> Result<String, CostError> {
    let cost = &report.cost;
    let name = report.contract_name.as_deref().unwrap_or("-");

    let mut lines = vec![
        format!("Contract: {} ({name})", report.contract),
        format!("Contract Bytecode Size: {} bytes", report.gas.byte_size),
        format!("Estimated Gas Units: {} ({})", cost.gas_units, report.gas.source),
        format!("Gas Price: {} gwei", format_wei(cost.gas_price_wei, "gwei")?),
    ];
    if let Some(priority_fee) = cost.priority_fee_wei {
        lines.push(format!("Priority Fee: {} gwei", format_wei(priority_fee, "gwei")?));
    }
    lines.push(format!("ETH Price: ${:.2} USD", cost.asset_fiat_rate));
    lines.push(format!(
        "Estimated Deployment Cost: {} ETH (~${:.2} USD)",
        cost.total_cost_denominated, cost.total_cost_fiat
    ));

    Ok(lines.into_iter().map(|line| line + "\n").collect())
}

/// Like [`render_text`], with every priced figure as `mean ± std_dev`.
pub fn render_sampled_text(report: &SampledReport) -> String {
    let name = report.contract_name.as_deref().unwrap_or("-");
    let pm = |s: Summary, precision: usize| {
        format!("{:.p$} ± {:.p$}", s.mean, s.std_dev, p = precision)
    };

    [
        format!("Contract: {} ({name})", report.contract),
        format!("Contract Bytecode Size: {} bytes", report.gas.byte_size),
        format!("Samples: {}", report.samples),
        format!("Estimated Gas Units: {} ({})", pm(report.gas_units, 0), report.gas.source),
        format!("Gas Price: {} gwei", pm(report.gas_price_gwei, 3)),
        format!("ETH Price: ${} USD", pm(report.asset_fiat_rate, 2)),
        format!(
            "Estimated Deployment Cost: {} ETH (~${} USD)",
            pm(report.total_cost_denominated, 6),
            pm(report.total_cost_fiat, 2)
        ),
    ]
    .into_iter()
    .map(|line| line + "\n")
    .collect()
}

pub fn render_json<T: Serialize>(report: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// JSON view of a batch: every contract, successful or not.
#[derive(Debug, Serialize)]
struct BatchJson<'a, T> {
    contract: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn render_batch_json<T: Serialize>(entries: &[BatchEntry<T>]) -> serde_json::Result<String> {
    let rows: Vec<BatchJson<'_, T>> = entries
        .iter()
        .map(|entry| BatchJson {
            contract: entry.contract.display().to_string(),
            report: entry.outcome.as_ref().ok(),
            error: entry.outcome.as_ref().err().map(|err| err.to_string()),
        })
        .collect();
    serde_json::to_string_pretty(&rows)
}

/// One CSV line. Fields a failed contract does not have stay empty.
#[derive(Debug, Default, Serialize)]
struct CsvRow {
    contract: String,
    bytecode_size: Option<u64>,
    gas_units: Option<u64>,
    gas_source: Option<String>,
    gas_price_gwei: Option<String>,
    priority_fee_gwei: Option<String>,
    fiat_rate: Option<f64>,
    cost_eth: Option<String>,
    cost_fiat: Option<String>,
    status: &'static str,
    error: Option<String>,
}

impl CsvRow {
    fn success(contract: String, report: &DeploymentReport) -> Result<Self, CostError> {
        let cost = &report.cost;
        Ok(Self {
            contract,
            bytecode_size: Some(report.gas.byte_size),
            gas_units: Some(cost.gas_units),
            gas_source: Some(report.gas.source.to_string()),
            gas_price_gwei: Some(format_wei(cost.gas_price_wei, "gwei")?),
            priority_fee_gwei: cost
                .priority_fee_wei
                .map(|fee| format_wei(fee, "gwei"))
                .transpose()?,
            fiat_rate: Some(cost.asset_fiat_rate),
            cost_eth: Some(cost.total_cost_denominated.clone()),
            cost_fiat: Some(format!("{:.2}", cost.total_cost_fiat)),
            status: "success",
            error: None,
        })
    }

    fn failure(contract: String, error: String) -> Self {
        Self { contract, status: "error", error: Some(error), ..Default::default() }
    }
}

/// CSV line of a sampled run: mean and std-dev columns per metric.
#[derive(Debug, Default, Serialize)]
struct SampledCsvRow {
    contract: String,
    bytecode_size: Option<u64>,
    gas_source: Option<String>,
    samples: Option<usize>,
    mean_fiat_rate: Option<f64>,
    std_fiat_rate: Option<f64>,
    mean_gas_units: Option<f64>,
    std_gas_units: Option<f64>,
    mean_gas_price_gwei: Option<f64>,
    std_gas_price_gwei: Option<f64>,
    mean_cost_eth: Option<f64>,
    std_cost_eth: Option<f64>,
    mean_cost_fiat: Option<f64>,
    std_cost_fiat: Option<f64>,
    status: &'static str,
    error: Option<String>,
}

impl SampledCsvRow {
    fn success(contract: String, report: &SampledReport) -> Self {
        Self {
            contract,
            bytecode_size: Some(report.gas.byte_size),
            gas_source: Some(report.gas.source.to_string()),
            samples: Some(report.samples),
            mean_fiat_rate: Some(report.asset_fiat_rate.mean),
            std_fiat_rate: Some(report.asset_fiat_rate.std_dev),
            mean_gas_units: Some(report.gas_units.mean),
            std_gas_units: Some(report.gas_units.std_dev),
            mean_gas_price_gwei: Some(report.gas_price_gwei.mean),
            std_gas_price_gwei: Some(report.gas_price_gwei.std_dev),
            mean_cost_eth: Some(report.total_cost_denominated.mean),
            std_cost_eth: Some(report.total_cost_denominated.std_dev),
            mean_cost_fiat: Some(report.total_cost_fiat.mean),
            std_cost_fiat: Some(report.total_cost_fiat.std_dev),
            status: "success",
            error: None,
        }
    }

    fn failure(contract: String, error: String) -> Self {
        Self { contract, status: "error", error: Some(error), ..Default::default() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Write one header line and one row per entry.
pub fn write_csv<W: io::Write>(entries: &[BatchEntry], out: W) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);
    for entry in entries {
        let contract = entry.contract.display().to_string();
        let row = match &entry.outcome {
            Ok(report) => CsvRow::success(contract, report)?,
            Err(err) => CsvRow::failure(contract, err.to_string()),
        };
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_sampled_csv<W: io::Write>(
    entries: &[BatchEntry<SampledReport>],
    out: W,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);
    for entry in entries {
        let contract = entry.contract.display().to_string();
        let row = match &entry.outcome {
            Ok(report) => SampledCsvRow::success(contract, report),
            Err(err) => SampledCsvRow::failure(contract, err.to_string()),
        };
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
