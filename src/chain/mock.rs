//! Scriptable in-memory `ChainClient` for tests

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::{CallOutcome, ChainClient, ClaimCall, RpcStats, TxStatus};
use crate::contracts::IMulticall3;

pub struct MockChain {
    pub sender: Address,
    pub block: u64,

    /// Responses keyed by (target, calldata); unknown calls fail
    pub responses: Mutex<HashMap<(Address, Bytes), CallOutcome>>,
    pub aggregate_error: Mutex<Option<String>>,

    pub earned: Mutex<HashMap<Address, U256>>,

    /// Successive `token_balance` answers; zero once drained
    pub token_balances: Mutex<VecDeque<U256>>,
    pub native_balance: Mutex<Option<U256>>,

    pub simulate_results: Mutex<VecDeque<Result<(), String>>>,
    pub submit_results: Mutex<VecDeque<Result<B256, String>>>,
    pub receipt_results: Mutex<VecDeque<Result<TxStatus, String>>>,

    pub simulated: Mutex<Vec<ClaimCall>>,
    pub submitted: Mutex<Vec<ClaimCall>>,
    pub aggregate_calls: Mutex<Vec<(usize, Option<u64>)>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            sender: Address::repeat_byte(0x5e),
            block: 1_000,
            responses: Mutex::new(HashMap::new()),
            aggregate_error: Mutex::new(None),
            earned: Mutex::new(HashMap::new()),
            token_balances: Mutex::new(VecDeque::new()),
            native_balance: Mutex::new(Some(U256::from(10u128.pow(18)))),
            simulate_results: Mutex::new(VecDeque::new()),
            submit_results: Mutex::new(VecDeque::new()),
            receipt_results: Mutex::new(VecDeque::new()),
            simulated: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            aggregate_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, target: Address, call_data: Vec<u8>, outcome: CallOutcome) {
        self.responses
            .lock()
            .unwrap()
            .insert((target, Bytes::from(call_data)), outcome);
    }

    pub fn set_earned(&self, vault: Address, amount: U256) {
        self.earned.lock().unwrap().insert(vault, amount);
    }

    pub fn push_balances(&self, balances: &[u64]) {
        self.token_balances
            .lock()
            .unwrap()
            .extend(balances.iter().map(|b| U256::from(*b)));
    }

    pub fn push_simulation(&self, result: Result<(), &str>) {
        self.simulate_results
            .lock()
            .unwrap()
            .push_back(result.map_err(str::to_string));
    }

    pub fn push_submit(&self, result: Result<B256, &str>) {
        self.submit_results
            .lock()
            .unwrap()
            .push_back(result.map_err(str::to_string));
    }

    pub fn push_receipt(&self, result: Result<TxStatus, &str>) {
        self.receipt_results
            .lock()
            .unwrap()
            .push_back(result.map_err(str::to_string));
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.block)
    }

    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call3>,
        block: Option<u64>,
    ) -> Result<Vec<CallOutcome>> {
        self.aggregate_calls.lock().unwrap().push((calls.len(), block));
        if let Some(err) = self.aggregate_error.lock().unwrap().clone() {
            return Err(eyre!(err));
        }

        let responses = self.responses.lock().unwrap();
        Ok(calls
            .into_iter()
            .map(|c| {
                responses
                    .get(&(c.target, c.callData))
                    .cloned()
                    .unwrap_or_else(CallOutcome::failed)
            })
            .collect())
    }

    async fn earned(&self, vault: Address) -> Result<U256> {
        self.earned
            .lock()
            .unwrap()
            .get(&vault)
            .copied()
            .ok_or_else(|| eyre!("earned() reverted"))
    }

    async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256> {
        Ok(self.token_balances.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256> {
        self.native_balance
            .lock()
            .unwrap()
            .ok_or_else(|| eyre!("balance read failed"))
    }

    async fn simulate(&self, call: &ClaimCall) -> Result<()> {
        self.simulated.lock().unwrap().push(call.clone());
        match self.simulate_results.lock().unwrap().pop_front() {
            Some(Err(e)) => Err(eyre!(e)),
            _ => Ok(()),
        }
    }

    async fn submit(&self, call: &ClaimCall) -> Result<B256> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(call.clone());
        match self.submit_results.lock().unwrap().pop_front() {
            Some(Ok(hash)) => Ok(hash),
            Some(Err(e)) => Err(eyre!(e)),
            None => Ok(B256::with_last_byte(submitted.len() as u8)),
        }
    }

    async fn wait_for_receipt(&self, _hash: B256, _timeout: Duration) -> Result<TxStatus> {
        match self.receipt_results.lock().unwrap().pop_front() {
            Some(Ok(status)) => Ok(status),
            Some(Err(e)) => Err(eyre!(e)),
            None => Ok(TxStatus::Success),
        }
    }

    fn take_rpc_stats(&self) -> RpcStats {
        let multicall = std::mem::take(&mut *self.aggregate_calls.lock().unwrap()).len() as u64;
        RpcStats { multicall, normal: 0 }
    }
}
