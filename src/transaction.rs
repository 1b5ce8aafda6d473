//! Transaction Building and Signing
//!
//! Local construction and signing of ledger transactions. All signing
//! happens in-process; private keys never leave the agent that owns
//! them.
//!
//! Fees use an all-in flat price model: a bid carries its price as both
//! the fee cap and the priority fee, so the offer is exactly what the
//! block producer collects.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::keys::Address;

/// Base units per coin
pub const UNITS_PER_COIN: u128 = 1_000_000_000_000_000_000;

/// Base units per giga-unit (the CLI's price granularity)
pub const UNITS_PER_GIGA: u128 = 1_000_000_000;

/// Domain separator for transaction signing hashes
const TX_SIGNING_DOMAIN: &[u8] = b"bidswarm-tx-v1";

/// Errors from encoding, decoding, or verifying transactions
#[derive(Debug, Error)]
pub enum WireError {
    /// Transaction (de)serialization failed
    #[error("transaction encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    /// The hex form of a transaction could not be decoded
    #[error("invalid transaction hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Embedded public key or signature bytes are malformed
    #[error("malformed signature material")]
    MalformedSignature,

    /// The signature does not match the body
    #[error("signature verification failed")]
    BadSignature,
}

/// An unsigned transaction body.
///
/// `to = None` is a contract creation; `data` carries the contract call
/// or creation bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub chain_id: u64,
    pub sequence: u64,
    pub fee_cap: u128,
    pub priority_fee: u128,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: u128,
    pub data: Vec<u8>,
}

impl TxBody {
    /// Compute the signing hash (message to be signed)
    pub fn signing_hash(&self) -> Result<[u8; 32], WireError> {
        let mut hasher = Sha256::new();
        hasher.update(TX_SIGNING_DOMAIN);
        hasher.update(bincode::serialize(self)?);
        Ok(hasher.finalize().into())
    }

    /// Sign the body, consuming it into a submittable transaction
    pub fn sign(self, key: &SigningKey) -> Result<SignedTx, WireError> {
        let hash = self.signing_hash()?;
        let signature = key.sign(&hash);
        Ok(SignedTx {
            body: self,
            pubkey: key.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
        })
    }
}

/// A signed transaction, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTx {
    pub body: TxBody,
    pub pubkey: [u8; 32],
    pub signature: Vec<u8>,
}

impl SignedTx {
    /// Serialize to hex for submission
    pub fn to_hex(&self) -> Result<String, WireError> {
        Ok(hex::encode(bincode::serialize(self)?))
    }

    /// Decode a transaction from its submission hex
    pub fn from_hex(s: &str) -> Result<Self, WireError> {
        Ok(bincode::deserialize(&hex::decode(s)?)?)
    }

    /// Compute the transaction hash
    pub fn hash(&self) -> Result<String, WireError> {
        let mut hasher = Sha256::new();
        hasher.update(bincode::serialize(self)?);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Check the embedded signature against the body
    pub fn verify(&self) -> Result<(), WireError> {
        let pubkey =
            VerifyingKey::from_bytes(&self.pubkey).map_err(|_| WireError::MalformedSignature)?;
        let bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| WireError::MalformedSignature)?;
        let signature = Signature::from_bytes(&bytes);
        let hash = self.body.signing_hash()?;
        pubkey
            .verify(&hash, &signature)
            .map_err(|_| WireError::BadSignature)
    }
}

/// Format a base-unit amount as coins
pub fn format_coins(units: u128) -> String {
    let coins = units as f64 / UNITS_PER_COIN as f64;
    format!("{:.6}", coins)
}

/// Format a base-unit price in giga-units
pub fn format_giga(units: u128) -> String {
    let giga = units as f64 / UNITS_PER_GIGA as f64;
    format!("{:.3}", giga)
}

/// Parse a coin amount string to base units
pub fn parse_coins(amount: &str) -> anyhow::Result<u128> {
    let value: f64 = amount
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid amount format: {amount:?}"))?;

    if value < 0.0 {
        return Err(anyhow::anyhow!("amount cannot be negative"));
    }

    Ok((value * UNITS_PER_COIN as f64) as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn sample_body() -> TxBody {
        TxBody {
            chain_id: 1,
            sequence: 42,
            fee_cap: 5_000_000_000,
            priority_fee: 5_000_000_000,
            gas_limit: 100_000,
            to: Some(Address([9u8; 32])),
            value: 0,
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let tx = sample_body().sign(&test_key()).unwrap();
        tx.verify().unwrap();
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let mut tx = sample_body().sign(&test_key()).unwrap();
        tx.body.sequence += 1;
        assert!(matches!(tx.verify(), Err(WireError::BadSignature)));
    }

    #[test]
    fn test_signing_hash_depends_on_body() {
        let a = sample_body();
        let mut b = sample_body();
        b.fee_cap += 1;
        assert_ne!(a.signing_hash().unwrap(), b.signing_hash().unwrap());
    }

    #[test]
    fn test_hex_roundtrip() {
        let tx = sample_body().sign(&test_key()).unwrap();
        let decoded = SignedTx::from_hex(&tx.to_hex().unwrap()).unwrap();
        assert_eq!(decoded.body, tx.body);
        decoded.verify().unwrap();
    }

    #[test]
    fn test_format_coins() {
        assert_eq!(format_coins(UNITS_PER_COIN), "1.000000");
        assert_eq!(format_coins(UNITS_PER_COIN / 2), "0.500000");
    }

    #[test]
    fn test_parse_coins() {
        assert_eq!(parse_coins("1.0").unwrap(), UNITS_PER_COIN);
        assert_eq!(parse_coins("0.5").unwrap(), UNITS_PER_COIN / 2);
        assert!(parse_coins("-1").is_err());
        assert!(parse_coins("abc").is_err());
    }

    #[test]
    fn test_format_giga() {
        assert_eq!(format_giga(5_000_000_000), "5.000");
        assert_eq!(format_giga(6_500_000_000), "6.500");
    }
}
