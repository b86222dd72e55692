use eyre::Result;
use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber so stdout only carries the report.
///
/// `RUST_LOG` wins over `verbosity`; otherwise 0 shows warnings, 1 info,
/// 2 and above debug output from this crate.
pub fn init(verbosity: u8) -> Result<()> {
    let default = match verbosity {
        0 => "warn",
        1 => "warn,deploycost=info",
        _ => "info,deploycost=debug",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| eyre::eyre!("failed to install logger: {e}"))
}
