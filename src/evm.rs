use crate::error::SimulationError;
use crate::simulate::Simulator;
use async_trait::async_trait;
use revm::context::TxEnv;
use revm::context_interface::result::{ExecutionResult, Output};
use revm::database::CacheDB;
use revm::database_interface::EmptyDB;
use revm::primitives::{Address, Bytes, TxKind, U256};
use revm::state::AccountInfo;
use revm::{ExecuteEvm, MainBuilder, MainContext};
use tracing::debug;

/// Stays within the per-transaction gas cap of recent forks.
const GAS_LIMIT: u64 = 16_777_216;

/// Deployer of every simulated creation.
fn caller() -> Address {
    Address::with_last_byte(0x01)
}

/// Deploys init code into an empty in-memory chain with revm.
///
/// Gas used includes the intrinsic transaction and CREATE costs, so the
/// figure is comparable to a node's `eth_estimateGas`. There is no fee
/// market here; prices always come from the oracle.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalEvm;

#[async_trait]
impl Simulator for LocalEvm {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn estimate_deployment_gas(&self, data: &[u8]) -> Result<u64, SimulationError> {
        deploy(data)
    }
}

/// Empty state holding only the deployer and its balance.
fn funded_state() -> CacheDB<EmptyDB> {
    let mut state = CacheDB::new(EmptyDB::new());
    let balance = U256::from(10u64).pow(U256::from(22u64));
    state.insert_account_info(caller(), AccountInfo { balance, ..Default::default() });
    state
}

fn deploy(init_code: &[u8]) -> Result<u64, SimulationError> {
    let ctx = revm::Context::mainnet().with_db(funded_state());
    let mut evm = ctx.build_mainnet();

    let tx = TxEnv {
        caller: caller(),
        gas_limit: GAS_LIMIT,
        gas_price: 0,
        kind: TxKind::Create,
        value: U256::ZERO,
        data: Bytes::copy_from_slice(init_code),
        nonce: 0,
        ..Default::default()
    };

    // Non-committing: the database is thrown away after each estimate.
    let result = evm
        .transact(tx)
        .map_err(|e| SimulationError::Evm(format!("{e:?}")))?;

    match result.result {
        ExecutionResult::Success { gas_used, output, .. } => match output {
            Output::Create(_, Some(addr)) => {
                debug!(%addr, gas_used, "local deployment succeeded");
                Ok(gas_used)
            }
            Output::Create(_, None) => Err(SimulationError::Evm(
                "CREATE succeeded but no address returned".to_string(),
            )),
            Output::Call(_) => Err(SimulationError::Evm(
                "expected CREATE output, got CALL output".to_string(),
            )),
        },
        ExecutionResult::Revert { output, .. } => {
            Err(SimulationError::Reverted(hex::encode(&output)))
        }
        ExecutionResult::Halt { reason, .. } => Err(SimulationError::Halted(format!("{reason:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_runtime_deploys() {
        // STOP: creates an account with empty code.
        let gas = LocalEvm.estimate_deployment_gas(&[0x00]).await.unwrap();
        assert!(gas >= 53_000, "gas {gas} below intrinsic CREATE cost");
    }

    #[tokio::test]
    async fn invalid_opcode_halts() {
        let err = LocalEvm.estimate_deployment_gas(&[0xfe]).await.unwrap_err();
        assert!(matches!(err, SimulationError::Halted(_)));
    }

    #[tokio::test]
    async fn revert_is_reported() {
        // PUSH1 0 PUSH1 0 REVERT
        let err = LocalEvm
            .estimate_deployment_gas(&[0x60, 0x00, 0x60, 0x00, 0xfd])
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::Reverted(ref data) if data.is_empty()));
    }
}
