//! Contract bindings used by the compounder
//!
//! - Bault: reward/bounty reads and wrapper previews
//! - BountyHelper: atomic claim + swap + payout entry point
//! - ERC-20 balance reads for surplus accounting
//! - Multicall3 for batched reads with per-call failure isolation

use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

// ============================================
// CONTRACT ADDRESSES (Berachain)
// ============================================

/// Multicall3 (same deployment address on every chain)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// BountyHelper: pays the bounty and performs claim + swap atomically
pub const DEFAULT_BOUNTY_HELPER: Address = address!("4a19d3107F81aAa55202264f2c246aA75734eDb6");

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// Kodiak bault (auto-compounding vault)
    #[derive(Debug)]
    interface IBault {
        function bounty() external view returns (uint256);
        function earned() external view returns (uint256);
        function onlyAllowedBgtWrapper() external view returns (address);
        function previewClaimBgtWrapper(address bgtWrapper) external view returns (uint256);
    }

    /// Helper that claims BGT through a wrapper, swaps it into the staking
    /// token, pays the bounty and forwards the surplus to the beneficiary
    #[derive(Debug)]
    interface IBountyHelper {
        function claimBgtWrapper(
            address bault,
            address bgtWrapper,
            address swapTarget,
            bytes calldata swapData,
            uint256 minAmountOut,
            address beneficiary
        ) external returns (uint256);
    }

    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }

    #[derive(Debug)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

/// Build a Multicall3 entry that tolerates failure
pub fn tolerant_call(target: Address, call_data: Vec<u8>) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        target,
        allowFailure: true,
        callData: call_data.into(),
    }
}

/// Encode `claimBgtWrapper` calldata for the BountyHelper
pub fn encode_claim(
    bault: Address,
    wrapper: Address,
    swap_target: Address,
    swap_data: Bytes,
    min_amount_out: U256,
    beneficiary: Address,
) -> Bytes {
    IBountyHelper::claimBgtWrapperCall {
        bault,
        bgtWrapper: wrapper,
        swapTarget: swap_target,
        swapData: swap_data,
        minAmountOut: min_amount_out,
        beneficiary,
    }
    .abi_encode()
    .into()
}

// ============================================
// TESTS
// ============================================
