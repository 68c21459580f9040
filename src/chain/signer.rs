//! Transaction signing
//!
//! ⚠️  Never log the private key. Only the derived address is ever printed.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use eyre::{eyre, Result};
use tracing::debug;

/// EIP-1559 fee and gas parameters for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Signing key bound to a chain
pub struct Wallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl Wallet {
    pub fn new(private_key: &str, chain_id: u64) -> Result<Self> {
        let key = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| eyre!("Invalid PRIVATE_KEY: {}", e))?;
        if key.len() != 32 {
            return Err(eyre!("Invalid PRIVATE_KEY: expected 32 bytes, got {}", key.len()));
        }
        let signer = PrivateKeySigner::from_slice(&key)
            .map_err(|e| eyre!("Invalid PRIVATE_KEY: {}", e))?;

        Ok(Self { signer, chain_id })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign an EIP-1559 call and return the raw 2718-encoded bytes
    pub async fn sign_call(
        &self,
        to: Address,
        input: Bytes,
        value: U256,
        params: TxParams,
    ) -> Result<Bytes> {
        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: params.nonce,
            gas_limit: params.gas_limit,
            max_fee_per_gas: params.max_fee_per_gas,
            max_priority_fee_per_gas: params.max_priority_fee_per_gas,
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input,
        };

        let signature = self
            .signer
            .sign_hash(&tx.signature_hash())
            .await
            .map_err(|e| eyre!("Failed to sign transaction: {}", e))?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));

        debug!(
            "Signed EIP-1559 transaction: to={:?}, nonce={}, gas_limit={}, max_fee={}",
            to, params.nonce, params.gas_limit, params.max_fee_per_gas
        );

        Ok(envelope.encoded_2718().into())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_eips::eip2718::Decodable2718;
    use std::str::FromStr;

    // Well-known local development key
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_address() {
        let wallet = Wallet::new(TEST_KEY, 80094).unwrap();
        assert_eq!(
            wallet.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        assert!(Wallet::new("0xnot-a-key", 80094).is_err());
    }

    #[tokio::test]
    async fn test_signed_call_decodes() {
        let wallet = Wallet::new(TEST_KEY, 80094).unwrap();
        let params = TxParams {
            nonce: 7,
            gas_limit: 10_000_000,
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 100_000_000,
        };

        let raw = wallet
            .sign_call(Address::repeat_byte(0x4a), Bytes::from(vec![1, 2, 3]), U256::ZERO, params)
            .await
            .unwrap();

        let decoded = TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap();
        let TxEnvelope::Eip1559(signed) = decoded else {
            panic!("expected an EIP-1559 envelope");
        };
        assert_eq!(signed.tx().nonce, 7);
        assert_eq!(signed.tx().chain_id, 80094);
        assert_eq!(signed.tx().to, TxKind::Call(Address::repeat_byte(0x4a)));
        assert_eq!(signed.tx().input, Bytes::from(vec![1, 2, 3]));
    }
}
