//! On-chain Data Batcher - Multicall3 reads with per-call failure isolation
//!
//! Two batches per cycle, both pinned to the same block:
//! - vault state: bounty / earned / onlyAllowedBgtWrapper (3 calls per bault)
//! - wrapper previews: previewClaimBgtWrapper per wrapper + earned
//!
//! Every call is `allowFailure`, so one broken bault never blocks the others.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::{CallOutcome, ChainClient};
use crate::contracts::{tolerant_call, IBault, IMulticall3};
use crate::sources::VaultListing;
use crate::vault::{Vault, VaultError, WrapperRestriction};

/// Calls per bault in the state batch
const STATE_CALLS_PER_VAULT: usize = 3;

/// Wrappers to preview for one bault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewInput {
    pub vault: Address,
    pub wrappers: Vec<Address>,
}

/// Preview results for one bault, aligned with `PreviewInput::wrappers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewBatch {
    pub mint_amounts: Vec<U256>,
    pub earned: U256,
    pub has_any_failure: bool,
}

pub struct OnchainDataBatcher {
    chain: Arc<dyn ChainClient>,
}

impl OnchainDataBatcher {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Read bounty, earned and wrapper restriction for every listing at `block`.
    ///
    /// Baults with any failed call come back with `VaultError::FetchFailed`.
    pub async fn fetch_all(&self, listings: &[VaultListing], block: u64) -> Result<Vec<Vault>> {
        if listings.is_empty() {
            return Ok(Vec::new());
        }

        let mut calls: Vec<IMulticall3::Call3> = Vec::with_capacity(listings.len() * STATE_CALLS_PER_VAULT);
        for listing in listings {
            calls.push(tolerant_call(listing.vault, IBault::bountyCall {}.abi_encode()));
            calls.push(tolerant_call(listing.vault, IBault::earnedCall {}.abi_encode()));
            calls.push(tolerant_call(listing.vault, IBault::onlyAllowedBgtWrapperCall {}.abi_encode()));
        }

        let expected = calls.len();
        let results = self.chain.aggregate(calls, Some(block)).await?;
        if results.len() != expected {
            return Err(eyre!("Multicall returned {} results for {} calls", results.len(), expected));
        }

        let mut vaults = Vec::with_capacity(listings.len());
        let mut failed = 0usize;

        for (listing, chunk) in listings.iter().zip(results.chunks(STATE_CALLS_PER_VAULT)) {
            let vault = Vault::from_listing(listing, block);

            let bounty = decode::<IBault::bountyCall>(&chunk[0]);
            let earned = decode::<IBault::earnedCall>(&chunk[1]);
            let restriction = decode::<IBault::onlyAllowedBgtWrapperCall>(&chunk[2]);

            match (bounty, earned, restriction) {
                (Some(bounty), Some(earned), Some(restriction)) => vaults.push(Vault {
                    bounty,
                    earned,
                    restriction: WrapperRestriction::from_onchain(restriction),
                    ..vault
                }),
                _ => {
                    failed += 1;
                    warn!("State read failed for bault {} ({:?})", listing.symbol, listing.vault);
                    vaults.push(vault.with_error(VaultError::FetchFailed));
                }
            }
        }

        debug!(
            "📦 Fetched state for {} baults at block {} ({} failed)",
            listings.len(),
            block,
            failed
        );

        Ok(vaults)
    }

    /// Preview every wrapper mint for many baults in one round trip.
    ///
    /// A failed preview records zero for that wrapper and flags the bault;
    /// a failed `earned` also flags it. Other baults are unaffected.
    pub async fn fetch_wrapper_previews(
        &self,
        inputs: &[PreviewInput],
        block: u64,
    ) -> Result<HashMap<Address, PreviewBatch>> {
        if inputs.is_empty() {
            return Ok(HashMap::new());
        }

        let mut calls: Vec<IMulticall3::Call3> = Vec::new();
        for input in inputs {
            for wrapper in &input.wrappers {
                calls.push(tolerant_call(
                    input.vault,
                    IBault::previewClaimBgtWrapperCall { bgtWrapper: *wrapper }.abi_encode(),
                ));
            }
            calls.push(tolerant_call(input.vault, IBault::earnedCall {}.abi_encode()));
        }

        let expected = calls.len();
        let results = self.chain.aggregate(calls, Some(block)).await?;
        if results.len() != expected {
            return Err(eyre!("Multicall returned {} results for {} calls", results.len(), expected));
        }

        let mut output = HashMap::with_capacity(inputs.len());
        let mut cursor = results.iter();

        for input in inputs {
            let mut has_any_failure = false;
            let mut mint_amounts = Vec::with_capacity(input.wrappers.len());

            for wrapper in &input.wrappers {
                let amount = cursor
                    .next()
                    .and_then(decode::<IBault::previewClaimBgtWrapperCall>);
                if amount.is_none() {
                    has_any_failure = true;
                    warn!("Wrapper preview failed for bault {:?}, wrapper {:?}", input.vault, wrapper);
                }
                mint_amounts.push(amount.unwrap_or_default());
            }

            let earned = cursor.next().and_then(decode::<IBault::earnedCall>);
            if earned.is_none() {
                has_any_failure = true;
                warn!("Earned call failed for bault {:?}", input.vault);
            }

            output.insert(
                input.vault,
                PreviewBatch {
                    mint_amounts,
                    earned: earned.unwrap_or_default(),
                    has_any_failure,
                },
            );
        }

        Ok(output)
    }
}

fn decode<C: SolCall>(outcome: &CallOutcome) -> Option<C::Return> {
    if !outcome.success {
        return None;
    }
    C::abi_decode_returns(&outcome.return_data).ok()
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::tokens::{DEFAULT_WRAPPER_ORDER, IBGT, LBGT, YBGT};
    use alloy_sol_types::SolValue;

    fn listing(byte: u8) -> VaultListing {
        VaultListing {
            vault: Address::repeat_byte(byte),
            staking_token: Address::repeat_byte(byte + 0x10),
            symbol: format!("LP-{}", byte),
            staking_token_price: Some(1.0),
        }
    }

    fn stub_state(chain: &MockChain, vault: Address, bounty: u64, earned: u64, restriction: Address) {
        chain.respond(vault, IBault::bountyCall {}.abi_encode(), CallOutcome::ok(U256::from(bounty).abi_encode()));
        chain.respond(vault, IBault::earnedCall {}.abi_encode(), CallOutcome::ok(U256::from(earned).abi_encode()));
        chain.respond(
            vault,
            IBault::onlyAllowedBgtWrapperCall {}.abi_encode(),
            CallOutcome::ok(restriction.abi_encode()),
        );
    }

    #[tokio::test]
    async fn test_one_failing_vault_does_not_affect_others() {
        let chain = Arc::new(MockChain::new());
        let (a, b, c) = (listing(1), listing(2), listing(3));
        stub_state(&chain, a.vault, 100, 500, Address::ZERO);
        stub_state(&chain, c.vault, 7, 9, LBGT);
        // B only answers bounty; earned and restriction fail
        chain.respond(b.vault, IBault::bountyCall {}.abi_encode(), CallOutcome::ok(U256::from(1u64).abi_encode()));

        let batcher = OnchainDataBatcher::new(chain.clone());
        let vaults = batcher.fetch_all(&[a.clone(), b, c], 1_234).await.unwrap();

        assert_eq!(vaults.len(), 3);
        assert_eq!(vaults[0].bounty, U256::from(100u64));
        assert_eq!(vaults[0].earned, U256::from(500u64));
        assert_eq!(vaults[0].restriction, WrapperRestriction::Any);
        assert!(vaults[0].is_usable());

        assert_eq!(vaults[1].error, Some(VaultError::FetchFailed));

        assert_eq!(vaults[2].restriction, WrapperRestriction::Only(LBGT));
        assert!(vaults[2].is_usable());

        // One round trip, pinned to the requested block
        assert_eq!(chain.aggregate_calls.lock().unwrap().as_slice(), &[(9, Some(1_234))]);
    }

    #[tokio::test]
    async fn test_multicall_error_propagates() {
        let chain = Arc::new(MockChain::new());
        *chain.aggregate_error.lock().unwrap() = Some("connection reset".into());

        let batcher = OnchainDataBatcher::new(chain);
        assert!(batcher.fetch_all(&[listing(1)], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_previews_flag_partial_failures() {
        let chain = Arc::new(MockChain::new());
        let (a, b) = (Address::repeat_byte(1), Address::repeat_byte(2));

        for (i, wrapper) in DEFAULT_WRAPPER_ORDER.iter().enumerate() {
            chain.respond(
                a,
                IBault::previewClaimBgtWrapperCall { bgtWrapper: *wrapper }.abi_encode(),
                CallOutcome::ok(U256::from(10 + i as u64).abi_encode()),
            );
        }
        chain.respond(a, IBault::earnedCall {}.abi_encode(), CallOutcome::ok(U256::from(50u64).abi_encode()));

        // B: lBGT preview fails, earned succeeds
        chain.respond(
            b,
            IBault::previewClaimBgtWrapperCall { bgtWrapper: YBGT }.abi_encode(),
            CallOutcome::ok(U256::from(3u64).abi_encode()),
        );
        chain.respond(b, IBault::earnedCall {}.abi_encode(), CallOutcome::ok(U256::from(4u64).abi_encode()));

        let batcher = OnchainDataBatcher::new(chain.clone());
        let previews = batcher
            .fetch_wrapper_previews(
                &[
                    PreviewInput { vault: a, wrappers: DEFAULT_WRAPPER_ORDER.to_vec() },
                    PreviewInput { vault: b, wrappers: vec![YBGT, LBGT] },
                ],
                99,
            )
            .await
            .unwrap();

        let pa = &previews[&a];
        assert!(!pa.has_any_failure);
        assert_eq!(pa.mint_amounts[2], U256::from(12u64));
        assert_eq!(pa.earned, U256::from(50u64));

        let pb = &previews[&b];
        assert!(pb.has_any_failure);
        assert_eq!(pb.mint_amounts, vec![U256::from(3u64), U256::ZERO]);
        assert_eq!(pb.earned, U256::from(4u64));

        assert_eq!(chain.aggregate_calls.lock().unwrap().as_slice(), &[(8, Some(99))]);
    }

    #[tokio::test]
    async fn test_failed_earned_flags_vault() {
        let chain = Arc::new(MockChain::new());
        let a = Address::repeat_byte(1);
        chain.respond(
            a,
            IBault::previewClaimBgtWrapperCall { bgtWrapper: IBGT }.abi_encode(),
            CallOutcome::ok(U256::from(3u64).abi_encode()),
        );

        let batcher = OnchainDataBatcher::new(chain);
        let previews = batcher
            .fetch_wrapper_previews(&[PreviewInput { vault: a, wrappers: vec![IBGT] }], 1)
            .await
            .unwrap();

        assert!(previews[&a].has_any_failure);
        assert_eq!(previews[&a].mint_amounts, vec![U256::from(3u64)]);
    }
}
