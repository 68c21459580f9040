//! JSON-RPC implementation of `ChainClient`

use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{BlockId, TransactionRequest};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::signer::{TxParams, Wallet};
use super::{CallOutcome, ChainClient, ClaimCall, RpcStats, TxStatus};
use crate::contracts::{IBault, IMulticall3, IERC20, MULTICALL3};
use crate::gas_oracle::GasOracle;

/// Interval between receipt polls
const RECEIPT_POLL_MS: u64 = 500;

pub struct RpcChain {
    rpc_url: String,
    wallet: Wallet,
    gas_oracle: GasOracle,
    gas_limit: u64,
    multicall_requests: AtomicU64,
    normal_requests: AtomicU64,
}

impl RpcChain {
    pub fn new(rpc_url: String, wallet: Wallet, gas_oracle: GasOracle, gas_limit: u64) -> Self {
        Self {
            rpc_url,
            wallet,
            gas_oracle,
            gas_limit,
            multicall_requests: AtomicU64::new(0),
            normal_requests: AtomicU64::new(0),
        }
    }

    fn count_normal(&self) {
        self.normal_requests.fetch_add(1, Ordering::Relaxed);
    }

    async fn read(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        self.count_normal();
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        let tx = TransactionRequest::default().to(to).input(data.into());
        Ok(provider.call(tx).await?.to_vec())
    }

    fn claim_request(&self, call: &ClaimCall) -> TransactionRequest {
        TransactionRequest::default()
            .from(self.wallet.address())
            .to(call.to)
            .value(call.value)
            .input(call.data.clone().into())
    }
}

#[async_trait]
impl ChainClient for RpcChain {
    fn sender(&self) -> Address {
        self.wallet.address()
    }

    async fn block_number(&self) -> Result<u64> {
        self.count_normal();
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        Ok(provider.get_block_number().await?)
    }

    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call3>,
        block: Option<u64>,
    ) -> Result<Vec<CallOutcome>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        self.multicall_requests.fetch_add(1, Ordering::Relaxed);

        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();
        let tx = TransactionRequest::default()
            .to(MULTICALL3)
            .input(calldata.into());

        let result = match block {
            Some(n) => provider.call(tx).block(BlockId::number(n)).await,
            None => provider.call(tx).await,
        }
        .map_err(|e| eyre!("Multicall3 failed: {}", e))?;

        let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&result)
            .map_err(|e| eyre!("Failed to decode multicall result: {}", e))?;

        Ok(decoded
            .into_iter()
            .map(|r| if r.success { CallOutcome::ok(r.returnData) } else { CallOutcome::failed() })
            .collect())
    }

    async fn earned(&self, vault: Address) -> Result<U256> {
        let raw = self.read(vault, IBault::earnedCall {}.abi_encode()).await?;
        Ok(IBault::earnedCall::abi_decode_returns(&raw)?)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let raw = self
            .read(token, IERC20::balanceOfCall { owner }.abi_encode())
            .await?;
        Ok(IERC20::balanceOfCall::abi_decode_returns(&raw)?)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.count_normal();
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        Ok(provider.get_balance(owner).await?)
    }

    async fn simulate(&self, call: &ClaimCall) -> Result<()> {
        self.count_normal();
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        provider.call(self.claim_request(call)).await?;
        Ok(())
    }

    async fn submit(&self, call: &ClaimCall) -> Result<B256> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        self.count_normal();
        let nonce = provider
            .get_transaction_count(self.wallet.address())
            .pending()
            .await?;
        let fees = self.gas_oracle.fees().await;

        let raw = self
            .wallet
            .sign_call(
                call.to,
                call.data.clone(),
                call.value,
                TxParams {
                    nonce,
                    gas_limit: self.gas_limit,
                    max_fee_per_gas: fees.max_fee_per_gas,
                    max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                },
            )
            .await?;

        self.count_normal();
        let pending = provider.send_raw_transaction(&raw).await?;
        let hash = *pending.tx_hash();

        debug!(
            "Submitted {:?} (nonce {}, maxFee {:.3} gwei, base fee {} wei via {})",
            hash,
            nonce,
            fees.max_fee_gwei(),
            fees.base_fee_wei,
            fees.source
        );
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: B256, timeout: Duration) -> Result<TxStatus> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);
        let started = Instant::now();

        loop {
            self.count_normal();
            if let Some(receipt) = provider.get_transaction_receipt(hash).await? {
                return Ok(if receipt.status() {
                    TxStatus::Success
                } else {
                    TxStatus::Reverted
                });
            }

            if started.elapsed() >= timeout {
                return Err(eyre!("Timed out after {:?} waiting for receipt of {:?}", timeout, hash));
            }

            trace!("No receipt yet for {:?}", hash);
            tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_MS)).await;
        }
    }

    fn take_rpc_stats(&self) -> RpcStats {
        RpcStats {
            multicall: self.multicall_requests.swap(0, Ordering::Relaxed),
            normal: self.normal_requests.swap(0, Ordering::Relaxed),
        }
    }
}
