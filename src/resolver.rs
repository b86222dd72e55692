use crate::error::ResolveError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Supplies source text for import specifiers the compiler asks about.
pub trait ImportResolver: Send + Sync {
    fn resolve(&self, specifier: &str) -> Result<String, ResolveError>;
}

/// Resolves every import to a file directly inside one contracts directory.
///
/// Only the basename of a specifier is used, so `"../lib/Ownable.sol"` and
/// `"@oz/access/Ownable.sol"` both read `<root>/Ownable.sol`.
#[derive(Debug, Clone)]
pub struct ContractsDir {
    root: PathBuf,
}

impl ContractsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of a contract given relative to the root.
    pub fn contract_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

impl ImportResolver for ContractsDir {
    fn resolve(&self, specifier: &str) -> Result<String, ResolveError> {
        let name = basename(specifier);
        let path = self.root.join(name);

        if !path.is_file() {
            warn!(%name, root = %self.root.display(), "import not found in contracts directory");
            return Err(ResolveError::NotFound { name: name.to_string() });
        }

        fs::read_to_string(&path).map_err(|source| {
            warn!(%name, %source, "failed to read import");
            ResolveError::Read { name: name.to_string(), source }
        })
    }
}

/// Last path component of an import specifier.
fn basename(specifier: &str) -> &str {
    specifier.rsplit(['/', '\\']).next().unwrap_or(specifier)
}
