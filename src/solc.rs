//! The `solc --standard-json` boundary.
//!
//! The compiler is a black box: a standard-JSON request plus an import
//! resolver goes in, a standard-JSON response comes out. The solc CLI has no
//! import callback, so imports are resolved up front by scanning sources for
//! `import` directives and adding every resolved file to the request.

use crate::error::CompileError;
use crate::resolver::ImportResolver;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Diagnostic `type` used for imports the resolver could not supply.
pub const IMPORT_RESOLUTION: &str = "ImportResolution";

static COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").expect("valid comment regex")
});

static IMPORTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s+(?:[^"';]*?\bfrom\s+)?["']([^"']+)["']"#)
        .expect("valid import regex")
});

#[derive(Debug, Clone, Serialize)]
pub struct StandardJsonInput {
    pub language: String,
    pub sources: BTreeMap<String, SourceEntry>,
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceEntry {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub output_selection: Value,
}

impl StandardJsonInput {
    /// A one-file request selecting every output of every contract.
    pub fn single_file(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(file_name.into(), SourceEntry { content: content.into() });
        Self {
            language: "Solidity".to_string(),
            sources,
            settings: Settings { output_selection: json!({ "*": { "*": ["*"] } }) },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StandardJsonOutput {
    #[serde(default)]
    pub errors: Vec<SolcError>,
    /// file name -> contract name -> contract output, in toolchain order.
    #[serde(default)]
    pub contracts: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolcError {
    pub severity: String,
    pub message: String,
    #[serde(default)]
    pub formatted_message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl SolcError {
    pub fn text(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ContractOutput {
    #[serde(default)]
    pub evm: Option<EvmOutput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvmOutput {
    #[serde(default)]
    pub bytecode: Option<BytecodeOutput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BytecodeOutput {
    #[serde(default)]
    pub object: String,
}

/// A Solidity compiler taking standard-JSON input.
pub trait Compiler: Send + Sync {
    fn compile(
        &self,
        input: &StandardJsonInput,
        resolver: &dyn ImportResolver,
    ) -> Result<StandardJsonOutput, CompileError>;
}

/// The `solc` binary on `PATH` or at an explicit location.
#[derive(Debug, Clone)]
pub struct Solc {
    binary: PathBuf,
}

impl Solc {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Compiler for Solc {
    fn compile(
        &self,
        input: &StandardJsonInput,
        resolver: &dyn ImportResolver,
    ) -> Result<StandardJsonOutput, CompileError> {
        let mut input = input.clone();
        let unresolved = gather_imports(&mut input.sources, resolver);
        let request = serde_json::to_vec(&input)?;

        let binary = self.binary.display().to_string();
        debug!(%binary, sources = input.sources.len(), "invoking solc");

        let spawn_err = |source: std::io::Error| CompileError::Spawn { binary: binary.clone(), source };
        let mut child = Command::new(&self.binary)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // solc reads all of stdin before writing, so this cannot deadlock.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        if !output.status.success() && output.stdout.is_empty() {
            return Err(CompileError::Toolchain {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut parsed: StandardJsonOutput = serde_json::from_slice(&output.stdout)?;
        parsed.errors.splice(0..0, unresolved);
        Ok(parsed)
    }
}

/// Add every transitively imported file to `sources`.
///
/// Returns one warning-severity diagnostic per import the resolver could not
/// supply. The compiler then reports the missing source itself.
pub fn gather_imports(
    sources: &mut BTreeMap<String, SourceEntry>,
    resolver: &dyn ImportResolver,
) -> Vec<SolcError> {
    let mut pending: Vec<String> = sources.keys().cloned().collect();
    let mut failed = BTreeSet::new();
    let mut diagnostics = Vec::new();

    while let Some(unit) = pending.pop() {
        let Some(entry) = sources.get(&unit) else { continue };
        let specifiers = import_specifiers(&entry.content);

        for specifier in specifiers {
            let key = import_key(&unit, &specifier);
            if sources.contains_key(&key) || failed.contains(&key) {
                continue;
            }
            match resolver.resolve(&specifier) {
                Ok(content) => {
                    debug!(%unit, %key, "resolved import");
                    sources.insert(key.clone(), SourceEntry { content });
                    pending.push(key);
                }
                Err(err) => {
                    warn!(%unit, %specifier, %err, "unresolved import");
                    let message = err.to_string();
                    diagnostics.push(SolcError {
                        severity: "warning".to_string(),
                        formatted_message: Some(format!("{unit}: {message}")),
                        message,
                        kind: Some(IMPORT_RESOLUTION.to_string()),
                    });
                    failed.insert(key);
                }
            }
        }
    }

    diagnostics
}

/// Import paths named by `import` directives, comments ignored.
pub fn import_specifiers(source: &str) -> Vec<String> {
    let stripped = COMMENTS.replace_all(source, "");
    IMPORTS
        .captures_iter(&stripped)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// The source unit name solc assigns to `specifier` imported from `importer`.
///
/// Relative imports resolve against the importer's directory; anything else
/// is used verbatim.
pub fn import_key(importer: &str, specifier: &str) -> String {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return specifier.to_string();
    }

    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            segment => parts.push(segment),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use std::collections::HashMap;

    struct MapResolver(HashMap<&'static str, &'static str>);

    impl ImportResolver for MapResolver {
        fn resolve(&self, specifier: &str) -> Result<String, ResolveError> {
            let name = specifier.rsplit('/').next().unwrap_or(specifier);
            self.0
                .get(name)
                .map(|s| s.to_string())
                .ok_or_else(|| ResolveError::NotFound { name: name.to_string() })
        }
    }

    #[test]
    fn finds_all_import_forms() {
        let source = r#"
            pragma solidity ^0.8.0;
            import "./A.sol";
            import {B} from "lib/B.sol";
            import * as C from '../C.sol';
            import "D.sol" as D;
            // import "Commented.sol";
            /* import "Block.sol"; */
            contract Main {}
        "#;
        assert_eq!(import_specifiers(source), ["./A.sol", "lib/B.sol", "../C.sol", "D.sol"]);
    }

    #[test]
    fn relative_keys_follow_importer() {
        assert_eq!(import_key("Main.sol", "./Lib.sol"), "Lib.sol");
        assert_eq!(import_key("a/b/Main.sol", "../Lib.sol"), "a/Lib.sol");
        assert_eq!(import_key("a/Main.sol", "./x/./Lib.sol"), "a/x/Lib.sol");
        assert_eq!(import_key("a/Main.sol", "@oz/Lib.sol"), "@oz/Lib.sol");
    }

    #[test]
    fn gathers_transitive_imports() {
        let resolver = MapResolver(HashMap::from([
            ("Token.sol", "import \"./Ownable.sol\"; contract Token is Ownable {}"),
            ("Ownable.sol", "contract Ownable {}"),
        ]));
        let mut input =
            StandardJsonInput::single_file("Main.sol", "import \"./Token.sol\"; contract Main {}");

        let diagnostics = gather_imports(&mut input.sources, &resolver);

        assert!(diagnostics.is_empty());
        let keys: Vec<_> = input.sources.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Main.sol", "Ownable.sol", "Token.sol"]);
    }

    #[test]
    fn unresolved_import_becomes_warning() {
        let resolver = MapResolver(HashMap::new());
        let mut input = StandardJsonInput::single_file(
            "Main.sol",
            "import \"./Missing.sol\"; import \"./Missing.sol\"; contract Main {}",
        );

        let diagnostics = gather_imports(&mut input.sources, &resolver);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, "warning");
        assert_eq!(diagnostics[0].kind.as_deref(), Some(IMPORT_RESOLUTION));
        assert_eq!(diagnostics[0].message, "File not found: Missing.sol");
        assert_eq!(input.sources.len(), 1);
    }

    #[test]
    fn request_shape() {
        let input = StandardJsonInput::single_file("Main.sol", "contract Main {}");
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(
            value,
            json!({
                "language": "Solidity",
                "sources": { "Main.sol": { "content": "contract Main {}" } },
                "settings": { "outputSelection": { "*": { "*": ["*"] } } }
            })
        );
    }

    #[test]
    fn contract_order_is_preserved() {
        let raw = r#"{
            "contracts": { "Main.sol": { "Zeta": {}, "Alpha": {} } }
        }"#;
        let output: StandardJsonOutput = serde_json::from_str(raw).unwrap();
        let names: Vec<_> = output.contracts["Main.sol"].keys().map(String::as_str).collect();
        assert_eq!(names, ["Zeta", "Alpha"]);
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let solc = Solc::new("/nonexistent/solc-binary");
        let input = StandardJsonInput::single_file("Main.sol", "contract Main {}");
        let err = solc.compile(&input, &MapResolver(HashMap::new())).unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    /// Write an executable shell script standing in for solc.
    #[cfg(unix)]
    fn fake_solc(dir: &std::path::Path, body: &str) -> Solc {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("solc");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Solc::new(path)
    }

    #[cfg(unix)]
    #[test]
    fn sends_gathered_sources_and_merges_import_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let request = dir.path().join("request.json");
        let args = dir.path().join("args");
        let solc = fake_solc(
            dir.path(),
            &format!(
                r#"echo "$@" > '{args}'
cat > '{request}'
cat <<'JSON'
{{"errors":[{{"severity":"warning","type":"Warning","message":"Unused variable."}}],
 "contracts":{{"Main.sol":{{"Main":{{"evm":{{"bytecode":{{"object":"6001"}}}}}}}}}}}}
JSON"#,
                args = args.display(),
                request = request.display()
            ),
        );
        let resolver = MapResolver(HashMap::from([("Lib.sol", "library Lib {}")]));
        let input = StandardJsonInput::single_file(
            "Main.sol",
            "import \"./Lib.sol\"; import \"./Gone.sol\"; contract Main {}",
        );

        let output = solc.compile(&input, &resolver).unwrap();

        assert_eq!(std::fs::read_to_string(&args).unwrap().trim(), "--standard-json");
        let sent: Value = serde_json::from_str(&std::fs::read_to_string(&request).unwrap()).unwrap();
        let sources: Vec<_> = sent["sources"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(sources, ["Lib.sol", "Main.sol"]);
        assert_eq!(sent["sources"]["Lib.sol"]["content"], "library Lib {}");
        assert_eq!(sent["settings"]["outputSelection"], json!({ "*": { "*": ["*"] } }));

        assert_eq!(output.errors.len(), 2);
        assert_eq!(output.errors[0].kind.as_deref(), Some(IMPORT_RESOLUTION));
        assert_eq!(output.errors[0].message, "File not found: Gone.sol");
        assert_eq!(output.errors[1].message, "Unused variable.");
        assert!(output.contracts["Main.sol"].contains_key("Main"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_toolchain_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let solc = fake_solc(dir.path(), "cat > /dev/null\necho 'solc: invalid option' >&2\nexit 1");
        let input = StandardJsonInput::single_file("Main.sol", "contract Main {}");

        let err = solc.compile(&input, &MapResolver(HashMap::new())).unwrap_err();
        match err {
            CompileError::Toolchain { status, stderr } => {
                assert_eq!(status.code(), Some(1));
                assert_eq!(stderr, "solc: invalid option");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
