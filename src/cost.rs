//! Cost aggregation with exact integer arithmetic.
//!
//! Every gas price stays a [`U256`] number of wei until the final fiat
//! figure, which is the only floating-point value and is rounded to cents.

use crate::error::CostError;
use crate::types::CostReport;
use alloy_primitives::U256;
use alloy_primitives::utils::{ParseUnits, format_units, parse_units};

/// Convert a decimal gwei amount (`"30"`, `"12.5"`) to wei, exactly.
pub fn gwei_to_wei(amount: &str) -> Result<U256, CostError> {
    let invalid = |reason: String| CostError::InvalidAmount { amount: amount.to_string(), reason };

    match parse_units(amount.trim(), "gwei") {
        Ok(ParseUnits::U256(wei)) => Ok(wei),
        Ok(ParseUnits::I256(_)) => Err(invalid("negative amount".to_string())),
        Err(err) => Err(invalid(err.to_string())),
    }
}

/// Format wei in `unit` ("gwei", "ether"), trimming trailing zeros but
/// keeping at least one fractional digit.
pub fn format_wei(wei: U256, unit: &str) -> Result<String, CostError> {
    let formatted = format_units(wei, unit).map_err(|err| CostError::InvalidAmount {
        amount: wei.to_string(),
        reason: err.to_string(),
    })?;

    Ok(match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{formatted}.0"),
    })
}

/// `wei` in `unit` as a float, for display and statistics only.
pub fn to_decimal(wei: U256, unit: &str) -> Result<f64, CostError> {
    parse_decimal(&format_wei(wei, unit)?)
}

fn parse_decimal(amount: &str) -> Result<f64, CostError> {
    amount.parse().map_err(|_| CostError::InvalidAmount {
        amount: amount.to_string(),
        reason: "not a decimal".to_string(),
    })
}

/// Round to two decimal places for display.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Combine gas units, gas price, optional priority fee and fiat rate.
pub fn aggregate(
    gas_units: u64,
    gas_price_wei: U256,
    priority_fee_wei: Option<U256>,
    asset_fiat_rate: f64,
) -> Result<CostReport, CostError> {
    let effective_gas_price_wei = gas_price_wei
        .checked_add(priority_fee_wei.unwrap_or(U256::ZERO))
        .ok_or(CostError::Overflow)?;
    let total_cost_wei = effective_gas_price_wei
        .checked_mul(U256::from(gas_units))
        .ok_or(CostError::Overflow)?;

    let total_cost_denominated = format_wei(total_cost_wei, "ether")?;
    let denominated = parse_decimal(&total_cost_denominated)?;

    Ok(CostReport {
        gas_units,
        gas_price_wei,
        priority_fee_wei,
        effective_gas_price_wei,
        total_cost_wei,
        total_cost_denominated,
        asset_fiat_rate,
        total_cost_fiat: round_cents(denominated * asset_fiat_rate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gwei(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000_000u64)
    }

    #[test]
    fn heuristic_scenario() {
        let report = aggregate(421_000, gwei(30), None, 3000.0).unwrap();
        assert_eq!(report.effective_gas_price_wei, gwei(30));
        assert_eq!(report.total_cost_wei, U256::from(12_630_000_000_000_000u64));
        assert_eq!(report.total_cost_denominated, "0.01263");
        assert_eq!(report.total_cost_fiat, 37.89);
    }

    #[test]
    fn priority_fee_adds_to_gas_price() {
        let report = aggregate(100_000, gwei(20), Some(gwei(2)), 1.0).unwrap();
        assert_eq!(report.effective_gas_price_wei, gwei(22));
        assert_eq!(report.total_cost_wei, gwei(22) * U256::from(100_000));
        assert_eq!(report.total_cost_denominated, "0.0022");
    }

    #[test]
    fn large_inputs_stay_exact() {
        let price = U256::from(u64::MAX / 2);
        let tip = U256::from(u64::MAX / 2);
        let report = aggregate(u64::MAX, price, Some(tip), 0.0).unwrap();

        let expected = (u64::MAX as u128 - 1) * u64::MAX as u128;
        assert_eq!(report.total_cost_wei, U256::from(expected));
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(matches!(aggregate(2, U256::MAX, None, 1.0), Err(CostError::Overflow)));
        assert!(matches!(
            aggregate(1, U256::MAX, Some(U256::from(1)), 1.0),
            Err(CostError::Overflow)
        ));
    }

    #[test]
    fn aggregation_is_repeatable() {
        let first = aggregate(421_000, gwei(30), Some(gwei(1)), 2500.5).unwrap();
        let second = aggregate(421_000, gwei(30), Some(gwei(1)), 2500.5).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parses_decimal_gwei() {
        assert_eq!(gwei_to_wei("30").unwrap(), U256::from(30_000_000_000u64));
        assert_eq!(gwei_to_wei("12.5").unwrap(), U256::from(12_500_000_000u64));
        assert_eq!(gwei_to_wei(" 0.489671734 ").unwrap(), U256::from(489_671_734u64));
        assert!(gwei_to_wei("abc").is_err());
        assert!(gwei_to_wei("-1").is_err());
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_wei(U256::from(10).pow(U256::from(18)), "ether").unwrap(), "1.0");
        assert_eq!(format_wei(U256::ZERO, "ether").unwrap(), "0.0");
        assert_eq!(format_wei(U256::from(1), "ether").unwrap(), "0.000000000000000001");
        assert_eq!(format_wei(U256::from(30_000_000_000u64), "gwei").unwrap(), "30.0");
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_cents(37.8949), 37.89);
        assert_eq!(round_cents(0.005), 0.01);
    }
}
