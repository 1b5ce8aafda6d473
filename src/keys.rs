//! Identity Derivation
//!
//! Derives the master identity and an ordered fleet of agent identities
//! from a single seed phrase, using SLIP-0010 hardened-path derivation.
//!
//! A seed phrase that parses as a BIP39 English mnemonic uses the
//! standard BIP39 seed (empty passphrase). Any other non-empty phrase is
//! stretched to a 64-byte root with HKDF-SHA512 under a crate-specific
//! domain separator, so short developer seeds remain usable on test
//! networks. Either way the derivation is a pure function of the phrase:
//! the same phrase and count always yield the same keys in the same
//! order.

use std::fmt;
use std::str::FromStr;

use bip39::{Language, Mnemonic, Seed};
use ed25519_dalek::SigningKey;
use hkdf::Hkdf;
use sha2::Sha512;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::transaction::{SignedTx, TxBody, WireError};

/// Hardened derivation flag for BIP32 path components
const HARDENED: u32 = 0x8000_0000;

/// BIP44 usage constant
const USAGE_BIP44: u32 = 44;

/// Coin type for bidswarm identities
const COINTYPE_BIDSWARM: u32 = 7341;

/// Domain separator for stretching non-mnemonic seed phrases
const SEED_DOMAIN: &[u8] = b"bidswarm-seed-v1";

/// Agent indices start at 1; index 0 is the master identity. Every index
/// must fit the hardened component space.
const MAX_AGENTS: u32 = (HARDENED - 1) - 1;

/// Derivation path for a given identity index
pub const fn wallet_path(index: u32) -> [u32; 3] {
    [
        HARDENED | USAGE_BIP44,
        HARDENED | COINTYPE_BIDSWARM,
        HARDENED | (index & 0x7FFF_FFFF),
    ]
}

/// Errors from seed parsing and identity derivation
#[derive(Debug, Error)]
pub enum KeyError {
    /// The seed phrase is empty or whitespace
    #[error("seed phrase is empty")]
    InvalidSeed,

    /// More identities were requested than the hardened index space holds
    #[error("cannot derive {requested} agent identities: at most {max} are derivable")]
    IndexSpaceExhausted { requested: u32, max: u32 },
}

/// A 32-byte account address (the ed25519 verifying key), hex-displayed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Address(pub [u8; 32]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Error parsing an address from its hex form
#[derive(Debug, Error)]
#[error("invalid address: expected 64 hex characters")]
pub struct AddressParseError;

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|_| AddressParseError)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| AddressParseError)?;
        Ok(Address(bytes))
    }
}

/// One bidder identity: a keypair plus its derivation index.
///
/// Immutable once derived; held for the process lifetime and never
/// persisted.
#[derive(Clone)]
pub struct Identity {
    index: u32,
    signing_key: SigningKey,
    address: Address,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Derive the identity at `index` from a 64-byte root seed
    fn derive(root: &[u8; 64], index: u32) -> Self {
        let key = slip10_ed25519::derive_ed25519_private_key(root, &wallet_path(index));
        let signing_key = SigningKey::from_bytes(&key);
        let address = Address(signing_key.verifying_key().to_bytes());
        Self {
            index,
            signing_key,
            address,
        }
    }

    /// Derivation index (0 = master)
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The identity's account address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign a transaction body with this identity's key
    pub fn sign_tx(&self, body: TxBody) -> Result<SignedTx, WireError> {
        body.sign(&self.signing_key)
    }
}

/// Derive the master identity plus `count` agent identities from a seed
/// phrase.
///
/// The master sits at derivation index 0 and the agents at 1..=count, so
/// the agent sequence is stable regardless of how many agents a given
/// invocation asks for.
pub fn derive_fleet(seed_phrase: &str, count: u32) -> Result<(Identity, Vec<Identity>), KeyError> {
    if count > MAX_AGENTS {
        return Err(KeyError::IndexSpaceExhausted {
            requested: count,
            max: MAX_AGENTS,
        });
    }

    let root = root_seed(seed_phrase)?;
    let master = Identity::derive(&root, 0);
    let agents = (1..=count).map(|i| Identity::derive(&root, i)).collect();
    Ok((master, agents))
}

/// Expand a seed phrase into the 64-byte derivation root
fn root_seed(phrase: &str) -> Result<Zeroizing<[u8; 64]>, KeyError> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Err(KeyError::InvalidSeed);
    }

    let mut root = Zeroizing::new([0u8; 64]);
    match Mnemonic::from_phrase(phrase, Language::English) {
        Ok(mnemonic) => {
            // We explicitly do not support BIP39 passphrases; the phrase
            // alone fully determines the fleet.
            let seed = Seed::new(&mnemonic, "");
            root.copy_from_slice(seed.as_bytes());
        }
        Err(_) => {
            let kdf = Hkdf::<Sha512>::new(Some(SEED_DOMAIN), phrase.as_bytes());
            kdf.expand(b"fleet-root", &mut *root)
                .expect("invalid okm length when stretching seed phrase");
        }
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    // Standard BIP39 test vector (12 words)
    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_derivation_deterministic() {
        let (master_a, agents_a) = derive_fleet("test-seed", 3).unwrap();
        let (master_b, agents_b) = derive_fleet("test-seed", 3).unwrap();

        assert_eq!(master_a.address(), master_b.address());
        let addrs_a: Vec<_> = agents_a.iter().map(|a| *a.address()).collect();
        let addrs_b: Vec<_> = agents_b.iter().map(|a| *a.address()).collect();
        assert_eq!(addrs_a, addrs_b);
        assert_eq!(agents_a.len(), 3);
    }

    #[test]
    fn test_master_and_agents_distinct() {
        let (master, agents) = derive_fleet("test-seed", 3).unwrap();

        let mut seen = HashSet::new();
        seen.insert(*master.address());
        for agent in &agents {
            assert!(seen.insert(*agent.address()), "duplicate derived address");
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_indices_are_ordered() {
        let (master, agents) = derive_fleet("test-seed", 5).unwrap();

        assert_eq!(master.index(), 0);
        let indices: Vec<_> = agents.iter().map(|a| a.index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_seed_rejected() {
        assert!(matches!(derive_fleet("", 1), Err(KeyError::InvalidSeed)));
        assert!(matches!(derive_fleet("   ", 1), Err(KeyError::InvalidSeed)));
    }

    #[test]
    fn test_index_space_exhausted() {
        let result = derive_fleet("test-seed", u32::MAX);
        assert!(matches!(
            result,
            Err(KeyError::IndexSpaceExhausted { .. })
        ));
    }

    #[test]
    fn test_bip39_phrase_accepted() {
        let (master_a, _) = derive_fleet(TEST_MNEMONIC, 1).unwrap();
        let (master_b, _) = derive_fleet(TEST_MNEMONIC, 1).unwrap();
        assert_eq!(master_a.address(), master_b.address());
    }

    #[test]
    fn test_mnemonic_and_raw_seed_diverge() {
        // A mnemonic goes through the BIP39 seed; a non-mnemonic phrase
        // goes through HKDF. Different phrases must never collide.
        let (mnemonic_master, _) = derive_fleet(TEST_MNEMONIC, 0).unwrap();
        let (raw_master, _) = derive_fleet("test-seed", 0).unwrap();
        assert_ne!(mnemonic_master.address(), raw_master.address());
    }

    #[test]
    fn test_wallet_path_hardened() {
        let path = wallet_path(7);
        assert!(path.iter().all(|c| c & HARDENED != 0));
        assert_eq!(path[0], HARDENED | 44);
        assert_eq!(path[2], HARDENED | 7);
    }

    #[test]
    fn test_address_roundtrip() {
        let (master, _) = derive_fleet("test-seed", 0).unwrap();
        let shown = master.address().to_string();
        assert_eq!(shown.len(), 64);

        let parsed: Address = shown.parse().unwrap();
        assert_eq!(&parsed, master.address());
    }

    #[test]
    fn test_address_parse_rejects_garbage() {
        assert!("not-hex".parse::<Address>().is_err());
        assert!("abcd".parse::<Address>().is_err());
    }
}
