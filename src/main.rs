use clap::Parser;
use deploycost::config::{Config, FiatSource, SimulatorKind};
use deploycost::error::PipelineError;
use deploycost::evm::LocalEvm;
use deploycost::logging;
use deploycost::oracle::OracleClient;
use deploycost::pipeline::{BatchEntry, Pipeline, Stage};
use deploycost::report::{self, Format};
use deploycost::resolver::ContractsDir;
use deploycost::simulate::{RpcNode, Simulator};
use deploycost::solc::Solc;
use eyre::{WrapErr, bail};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(
    name = "deploycost",
    about = "Compile a Solidity contract and estimate what deploying it costs in ETH and USD."
)]
struct Cli {
    /// Path to the .sol file, relative to the contracts root
    #[arg(required_unless_present = "dir")]
    contract: Option<PathBuf>,

    /// Estimate every .sol file in this directory instead
    #[arg(long, conflicts_with = "contract")]
    dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    contracts_root: Option<PathBuf>,

    /// solc binary
    #[arg(long)]
    solc: Option<PathBuf>,

    /// JSON-RPC node for simulation and fee data
    #[arg(long)]
    rpc_url: Option<String>,

    #[arg(long, value_enum)]
    simulator: Option<SimulatorKind>,

    #[arg(long, value_enum)]
    fiat_source: Option<FiatSource>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Price each contract this many times and report mean and std-dev
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    samples: u32,

    /// More log output on stderr (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.contracts_root {
            config.contracts_root = root.clone();
        }
        if let Some(solc) = &self.solc {
            config.solc = solc.clone();
        }
        if let Some(url) = &self.rpc_url {
            config.endpoints.rpc_url = Some(url.clone());
        }
        if let Some(simulator) = self.simulator {
            config.simulator = simulator;
        }
        if let Some(source) = self.fiat_source {
            config.fiat_source = source;
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    if config.api_key.is_none() {
        warn!("no oracle API key set (ETHERSCAN_API); requests may be rate limited or rejected");
    }

    let compiler = Solc::new(&config.solc);
    let contracts = ContractsDir::new(&config.contracts_root);
    let oracle = OracleClient::new(&config).wrap_err("failed to build oracle client")?;
    let simulator = build_simulator(&config)?;
    let pipeline = Pipeline::new(&compiler, &contracts, simulator.as_deref(), &oracle);

    let samples = cli.samples as usize;
    match (&cli.contract, &cli.dir) {
        (_, Some(dir)) if samples > 1 => {
            run_batch_sampled(&pipeline, dir, samples, cli.format).await
        }
        (_, Some(dir)) => run_batch(&pipeline, dir, cli.format).await,
        (Some(contract), None) if samples > 1 => {
            run_single_sampled(&pipeline, contract, samples, cli.format).await
        }
        (Some(contract), None) => run_single(&pipeline, contract, cli.format).await,
        (None, None) => bail!("no contract path given"),
    }
}

fn build_simulator(config: &Config) -> eyre::Result<Option<Box<dyn Simulator>>> {
    let simulator: Box<dyn Simulator> = match config.simulator {
        SimulatorKind::Rpc => {
            let Some(url) = &config.endpoints.rpc_url else {
                warn!("simulator is rpc but no rpc_url is configured; using the size heuristic");
                return Ok(None);
            };
            Box::new(
                RpcNode::new(url.clone(), config.request_timeout())
                    .wrap_err("failed to build RPC client")?,
            )
        }
        SimulatorKind::Local => Box::new(LocalEvm),
        SimulatorKind::Disabled => return Ok(None),
    };
    debug!(simulator = simulator.name(), "simulation backend ready");
    Ok(Some(simulator))
}

/// Print compiler diagnostics and name the failing stage.
fn failure(contract: &Path, err: PipelineError) -> eyre::Report {
    if let PipelineError::CompilationFailed { diagnostics } = &err {
        for diagnostic in diagnostics {
            eprintln!("{}", diagnostic.message);
        }
    }
    let stage = err.stage();
    eyre::Report::new(err)
        .wrap_err(format!("failed to estimate {} while {stage}", contract.display()))
}

async fn run_single(pipeline: &Pipeline<'_>, contract: &Path, format: Format) -> eyre::Result<()> {
    let report = pipeline.run(contract).await.map_err(|err| failure(contract, err))?;

    debug!(stage = %Stage::Reporting);
    match format {
        Format::Text => print!("{}", report::render_text(&report)?),
        Format::Json => println!("{}", report::render_json(&report)?),
        Format::Csv => {
            let entries = [BatchEntry { contract: contract.to_path_buf(), outcome: Ok(report) }];
            report::write_csv(&entries, io::stdout().lock())?;
        }
    }
    Ok(())
}

async fn run_single_sampled(
    pipeline: &Pipeline<'_>,
    contract: &Path,
    samples: usize,
    format: Format,
) -> eyre::Result<()> {
    let report = pipeline
        .run_sampled(contract, samples)
        .await
        .map_err(|err| failure(contract, err))?;

    debug!(stage = %Stage::Reporting, samples);
    match format {
        Format::Text => print!("{}", report::render_sampled_text(&report)),
        Format::Json => println!("{}", report::render_json(&report)?),
        Format::Csv => {
            let entries = [BatchEntry { contract: contract.to_path_buf(), outcome: Ok(report) }];
            report::write_sampled_csv(&entries, io::stdout().lock())?;
        }
    }
    Ok(())
}

fn ensure_some_succeeded<T>(dir: &Path, entries: &[BatchEntry<T>]) -> eyre::Result<()> {
    if entries.iter().all(|entry| entry.outcome.is_err()) {
        bail!("every contract in {} failed", dir.display());
    }
    Ok(())
}

async fn run_batch(pipeline: &Pipeline<'_>, dir: &Path, format: Format) -> eyre::Result<()> {
    let entries = pipeline
        .run_batch(dir)
        .await
        .wrap_err_with(|| format!("cannot list contracts in {}", dir.display()))?;

    if entries.is_empty() {
        warn!(dir = %dir.display(), "no .sol files found");
        return Ok(());
    }

    debug!(stage = %Stage::Reporting, contracts = entries.len());
    match format {
        Format::Text => {
            for entry in &entries {
                println!("\nEstimating deployment cost for: {}", entry.contract.display());
                match &entry.outcome {
                    Ok(report) => print!("{}", report::render_text(report)?),
                    Err(err) => println!("Error estimating cost: {err}"),
                }
            }
        }
        Format::Json => println!("{}", report::render_batch_json(&entries)?),
        Format::Csv => report::write_csv(&entries, io::stdout().lock())?,
    }

    ensure_some_succeeded(dir, &entries)
}

async fn run_batch_sampled(
    pipeline: &Pipeline<'_>,
    dir: &Path,
    samples: usize,
    format: Format,
) -> eyre::Result<()> {
    let entries = pipeline
        .run_batch_sampled(dir, samples)
        .await
        .wrap_err_with(|| format!("cannot list contracts in {}", dir.display()))?;

    if entries.is_empty() {
        warn!(dir = %dir.display(), "no .sol files found");
        return Ok(());
    }

    debug!(stage = %Stage::Reporting, contracts = entries.len(), samples);
    match format {
        Format::Text => {
            for entry in &entries {
                println!("\nEstimating deployment cost for: {}", entry.contract.display());
                match &entry.outcome {
                    Ok(report) => print!("{}", report::render_sampled_text(report)),
                    Err(err) => println!("Error estimating cost: {err}"),
                }
            }
        }
        Format::Json => println!("{}", report::render_batch_json(&entries)?),
        Format::Csv => report::write_sampled_csv(&entries, io::stdout().lock())?,
    }

    ensure_some_succeeded(dir, &entries)
}
