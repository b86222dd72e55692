//! Estimate what deploying a Solidity contract costs, in wei, ether and fiat.
//!
//! The flow is compile → estimate gas → fetch prices → aggregate. Gas comes
//! from a live simulation when one is available and succeeds, and from a
//! fixed-plus-per-byte heuristic otherwise.

pub mod compile;
pub mod config;
pub mod cost;
pub mod error;
pub mod estimate;
pub mod evm;
pub mod logging;
pub mod oracle;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod simulate;
pub mod solc;
pub mod stats;
pub mod types;
