use crate::error::CompileError;
use crate::resolver::ContractsDir;
use crate::solc::{Compiler, ContractOutput, StandardJsonInput, StandardJsonOutput};
use crate::types::{CompilationResult, Diagnostic, Severity};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static CODE_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Contract code size is (\d+) bytes").expect("valid code size regex")
});

/// Compile a contract from the contracts directory into a [`CompilationResult`].
///
/// Strategy:
/// 1. Read `<root>/<contract_path>` and key it by its basename
/// 2. Hand the one-file request to the compiler, with the contracts directory
///    as import resolver
/// 3. Normalize diagnostics and pick the first contract of that file
///
/// Error diagnostics do not make this fail; callers decide via
/// [`CompilationResult::has_errors`].
pub fn compile(
    compiler: &dyn Compiler,
    contracts: &ContractsDir,
    contract_path: &Path,
) -> Result<CompilationResult, CompileError> {
    let path = contracts.contract_path(contract_path);
    let Some(file_name) = path.file_name().and_then(|s| s.to_str()).map(str::to_owned) else {
        return Err(CompileError::NoFileName { path });
    };
    let source = fs::read_to_string(&path)
        .map_err(|source| CompileError::ReadSource { path: path.clone(), source })?;

    let input = StandardJsonInput::single_file(file_name.clone(), source);
    let output = compiler.compile(&input, contracts)?;

    Ok(normalize(&file_name, output))
}

/// Turn raw compiler output into a [`CompilationResult`] for `file_name`.
pub fn normalize(file_name: &str, output: StandardJsonOutput) -> CompilationResult {
    let diagnostics: Vec<Diagnostic> = output
        .errors
        .iter()
        .map(|err| {
            let severity = Severity::from_solc(&err.severity);
            let extracted_byte_size = match severity {
                Severity::Warning => extract_code_size(err.text()),
                _ => None,
            };
            Diagnostic { severity, message: err.text().to_string(), extracted_byte_size }
        })
        .collect();

    for diagnostic in &diagnostics {
        match diagnostic.severity {
            Severity::Error => warn!(message = %diagnostic.message, "compiler error"),
            _ => debug!(message = %diagnostic.message, "compiler diagnostic"),
        }
    }

    // Contract names are not known in advance: take the first one the
    // compiler lists for this file. Multi-contract files only report it.
    let selected = output
        .contracts
        .get(file_name)
        .and_then(|contracts| contracts.iter().next());

    let Some((name, raw)) = selected else {
        warn!(%file_name, "no contract information in compiler output");
        return CompilationResult::new(diagnostics, None, None);
    };

    let bytecode = serde_json::from_value::<ContractOutput>(raw.clone())
        .ok()
        .and_then(|contract| contract.evm)
        .and_then(|evm| evm.bytecode)
        .map(|bytecode| bytecode.object);

    let result = CompilationResult::new(diagnostics, bytecode, Some(name.clone()));
    if result.bytecode_hex().is_none() && !result.has_errors() {
        match result.size_hint() {
            Some(size) => debug!(contract = %name, size, "no bytecode, using reported size"),
            None => warn!(contract = %name, "no deployable bytecode"),
        }
    }
    result
}

fn extract_code_size(message: &str) -> Option<u64> {
    CODE_SIZE.captures(message).and_then(|caps| caps[1].parse().ok())
}

/// Decode creation bytecode, zeroing unlinked library placeholders first.
pub fn decode_bytecode(hex_str: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(replace_library_placeholders(hex_str.trim_start_matches("0x")))
}

/// Replace unlinked library placeholders (`__$<hash>$__`) with zeros.
///
/// Each placeholder occupies exactly 40 hex characters (one address slot),
/// so the byte length of the bytecode is unchanged.
fn replace_library_placeholders(hex_str: &str) -> String {
    let mut result = String::with_capacity(hex_str.len());
    let bytes = hex_str.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if i + 1 < bytes.len() && bytes[i] == b'_' && bytes[i + 1] == b'_' {
            if let Some(end) = hex_str[i..].find("$__") {
                let placeholder_end = i + end + 3;
                result.extend(std::iter::repeat_n('0', placeholder_end - i));
                i = placeholder_end;
                continue;
            }
        }
        result.push(bytes[i] as char);
        i += 1;
    }

    result
}
