use alloy_primitives::U256;
use serde::Serialize;

/// Severity of a compiler diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Map a solc severity string. Unknown severities are treated as errors.
    pub fn from_solc(severity: &str) -> Self {
        match severity {
            "warning" => Self::Warning,
            "info" => Self::Info,
            _ => Self::Error,
        }
    }
}

/// One normalized compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Byte size parsed from a "Contract code size is N bytes" warning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_byte_size: Option<u64>,
}

/// Normalized output of one compilation.
///
/// Bytecode is never exposed when any diagnostic is an error.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    diagnostics: Vec<Diagnostic>,
    bytecode_hex: Option<String>,
    contract_name: Option<String>,
}

impl CompilationResult {
    pub fn new(
        diagnostics: Vec<Diagnostic>,
        bytecode_hex: Option<String>,
        contract_name: Option<String>,
    ) -> Self {
        let bytecode_hex = bytecode_hex
            .map(|hex| hex.trim_start_matches("0x").to_string())
            .filter(|hex| !hex.is_empty());
        Self { diagnostics, bytecode_hex, contract_name }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn contract_name(&self) -> Option<&str> {
        self.contract_name.as_deref()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Bytecode as hex without the `0x` prefix.
    pub fn bytecode_hex(&self) -> Option<&str> {
        if self.has_errors() {
            return None;
        }
        self.bytecode_hex.as_deref()
    }

    /// The last size hint reported by a warning, if any.
    pub fn size_hint(&self) -> Option<u64> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .filter_map(|d| d.extracted_byte_size)
            .next_back()
    }

    /// What the gas estimator gets to work with.
    pub fn payload(&self) -> DeploymentPayload {
        match (self.bytecode_hex(), self.size_hint()) {
            (Some(hex), _) => DeploymentPayload::Bytecode(hex.to_string()),
            (None, Some(size)) => DeploymentPayload::SizeHint(size),
            (None, None) => DeploymentPayload::NoDeployableBytecode,
        }
    }
}

/// Input to gas estimation, derived from a clean compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentPayload {
    /// Creation bytecode as hex, no `0x` prefix.
    Bytecode(String),
    /// Only a diagnostic-derived byte size is known.
    SizeHint(u64),
    /// Interfaces, abstract contracts, or a file without contracts.
    NoDeployableBytecode,
}

impl DeploymentPayload {
    /// Byte length of the payload. Two hex characters per byte.
    pub fn byte_len(&self) -> u64 {
        match self {
            Self::Bytecode(hex) => hex.len() as u64 / 2,
            Self::SizeHint(size) => *size,
            Self::NoDeployableBytecode => 0,
        }
    }
}

/// Which estimation tier produced a gas figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GasSource {
    Simulated,
    Heuristic,
}

impl std::fmt::Display for GasSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => f.write_str("simulated"),
            Self::Heuristic => f.write_str("heuristic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GasEstimate {
    pub gas_units: u64,
    pub source: GasSource,
    /// Byte count the estimate was based on.
    pub byte_size: u64,
}

/// Prices feeding the cost aggregation. All gas prices are in wei.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    #[serde(serialize_with = "decimal::serialize")]
    pub gas_price_wei: U256,
    #[serde(serialize_with = "decimal::serialize_opt")]
    pub priority_fee_wei: Option<U256>,
    pub asset_fiat_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub gas_units: u64,
    #[serde(serialize_with = "decimal::serialize")]
    pub gas_price_wei: U256,
    #[serde(serialize_with = "decimal::serialize_opt")]
    pub priority_fee_wei: Option<U256>,
    #[serde(serialize_with = "decimal::serialize")]
    pub effective_gas_price_wei: U256,
    #[serde(serialize_with = "decimal::serialize")]
    pub total_cost_wei: U256,
    /// Total cost in ether, exact.
    pub total_cost_denominated: String,
    pub asset_fiat_rate: f64,
    /// Rounded to two decimal places.
    pub total_cost_fiat: f64,
}

/// Everything printed for one contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentReport {
    pub contract: String,
    pub contract_name: Option<String>,
    pub gas: GasEstimate,
    pub cost: CostReport,
}

/// Big integers serialize as decimal strings, not hex.
mod decimal {
    use alloy_primitives::U256;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn serialize_opt<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.collect_str(value),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(size: Option<u64>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: "warn".into(),
            extracted_byte_size: size,
        }
    }

    #[test]
    fn errors_hide_bytecode() {
        let result = CompilationResult::new(
            vec![Diagnostic {
                severity: Severity::Error,
                message: "boom".into(),
                extracted_byte_size: None,
            }],
            Some("6080".into()),
            Some("C".into()),
        );
        assert!(result.has_errors());
        assert_eq!(result.bytecode_hex(), None);
    }

    #[test]
    fn payload_prefers_bytecode_then_hint() {
        let with_code =
            CompilationResult::new(vec![warning(Some(30_000))], Some("0x6080".into()), None);
        assert_eq!(with_code.payload(), DeploymentPayload::Bytecode("6080".into()));

        let hinted = CompilationResult::new(
            vec![warning(Some(10)), warning(None), warning(Some(30_000))],
            Some(String::new()),
            None,
        );
        assert_eq!(hinted.payload(), DeploymentPayload::SizeHint(30_000));

        let empty = CompilationResult::new(vec![warning(None)], None, None);
        assert_eq!(empty.payload(), DeploymentPayload::NoDeployableBytecode);
        assert_eq!(empty.payload().byte_len(), 0);
    }

    #[test]
    fn byte_len_halves_hex() {
        let payload = DeploymentPayload::Bytecode("ab".repeat(2000));
        assert_eq!(payload.byte_len(), 2000);
    }
}
