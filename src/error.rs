use crate::pipeline::Stage;
use crate::types::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to resolve an import through the contracts directory.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("File not found: {name}")]
    NotFound { name: String },
    #[error("Error reading file {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// The compiler toolchain itself could not produce an output.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("contract path {path} does not name a file")]
    NoFileName { path: PathBuf },
    #[error("cannot read contract source {path}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to run `{binary}`, is solc installed?")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("solc exited with {status}: {stderr}")]
    Toolchain { status: std::process::ExitStatus, stderr: String },
    #[error("malformed compiler JSON")]
    Json(#[from] serde_json::Error),
}

/// The simulation capability could not produce a gas figure.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("node request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("node rejected {method}: {message} (code {code})")]
    Rejected { method: &'static str, code: i64, message: String },
    #[error("unexpected node response to {method}: {reason}")]
    Malformed { method: &'static str, reason: String },
    #[error("bytecode is not valid hex")]
    InvalidBytecode(#[from] hex::FromHexError),
    #[error("deployment reverted: 0x{0}")]
    Reverted(String),
    #[error("deployment halted: {0}")]
    Halted(String),
    #[error("EVM error: {0}")]
    Evm(String),
}

/// An oracle endpoint did not yield a usable value.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle {endpoint} unavailable")]
    Unavailable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("oracle {endpoint} returned an error: {message}")]
    Rejected { endpoint: String, message: String },
    #[error("oracle {endpoint} returned a malformed response: {reason}")]
    Malformed { endpoint: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CostError {
    #[error("cost computation overflowed 256 bits")]
    Overflow,
    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },
}

/// Terminal failure of one pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("compilation failed with {} error(s)", count_errors(.diagnostics))]
    CompilationFailed { diagnostics: Vec<Diagnostic> },
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Cost(#[from] CostError),
}

impl PipelineError {
    /// The stage a run was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Compile(CompileError::NoFileName { .. } | CompileError::ReadSource { .. }) => {
                Stage::ReadingSource
            }
            Self::Compile(_) | Self::CompilationFailed { .. } => Stage::Compiling,
            Self::Oracle(_) => Stage::FetchingPrices,
            Self::Cost(_) => Stage::Aggregating,
        }
    }
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == crate::types::Severity::Error)
        .count()
}
