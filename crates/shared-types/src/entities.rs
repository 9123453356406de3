//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `PubKey`, `HexBytes`
//! - **Chain**: `BlockHeader`, `VoteInfo`, `ValidatorUpdate`
//! - **Execution**: `Event`, `EventAttribute`, `ModuleEvent`, `LifecyclePhase`
//! - **Accounts**: `BaseAccount`, `AuthParams`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// A 32-byte hash.
pub type Hash = [u8; 32];

/// Length of an account address in bytes.
pub const ADDRESS_LEN: usize = 20;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 20-byte account address.
///
/// Serialized as a lowercase hex string so genesis documents stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Derive an address from arbitrary bytes: the first 20 bytes of SHA-256.
    #[must_use]
    pub fn hash_of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        Self(out)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid address hex '{s}': {e}"))?;
        let arr: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| format!("address '{s}' is not {ADDRESS_LEN} bytes"))?;
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PubKey(pub [u8; 32]);

impl PubKey {
    /// The account address controlled by this key.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::hash_of(&self.0)
    }
}

impl Serialize for PubKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("public key must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Opaque bytes serialized as hex (signatures, raw payloads).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HexBytes(pub Vec<u8>);

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map(HexBytes).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// Header of the block being processed, as delivered by the consensus driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Chain identifier; must match the one fixed at init-chain.
    pub chain_id: String,
    /// Block height (the first block after genesis is height 1).
    pub height: u64,
    /// Block time in Unix seconds, taken from consensus (never the wall clock).
    pub time: u64,
    /// Consensus address of the proposer.
    pub proposer: Address,
    /// Hash of the previous block.
    pub last_block_hash: Hash,
}

/// One validator's participation in the previous block's commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    /// Consensus address of the validator.
    pub validator: Address,
    /// Voting power at the time of the vote.
    pub power: i64,
    /// Whether the validator signed the previous block.
    pub signed_last_block: bool,
}

/// A change to the consensus validator set. Power zero removes the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PubKey,
    pub power: i64,
}

// =============================================================================
// CLUSTER C: EXECUTION
// =============================================================================

/// A key/value attribute attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

/// A typed event emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `transfer` or `mint`.
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    /// Create an event with no attributes.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push(EventAttribute {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    /// Look up the first attribute with the given key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// An event tagged with the module whose lifecycle callback emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEvent {
    pub module: String,
    pub event: Event,
}

/// The three ordered lifecycle phases driven by the module manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecyclePhase {
    /// Chain initialization from the genesis document.
    Genesis,
    /// Start of every block, before any transaction.
    BeginBlock,
    /// End of every block, after all transactions.
    EndBlock,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genesis => write!(f, "init-genesis"),
            Self::BeginBlock => write!(f, "begin-block"),
            Self::EndBlock => write!(f, "end-block"),
        }
    }
}

// =============================================================================
// CLUSTER D: ACCOUNTS
// =============================================================================

/// An externally owned or module account as stored by the auth module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: Address,
    /// Set by the first signed transaction if not provided at genesis.
    pub pub_key: Option<PubKey>,
    pub account_number: u64,
    pub sequence: u64,
}

impl BaseAccount {
    pub fn new(address: Address, account_number: u64) -> Self {
        Self {
            address,
            pub_key: None,
            account_number,
            sequence: 0,
        }
    }
}

/// Chain-wide authentication parameters consulted by the ante pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub max_memo_characters: u64,
    pub tx_sig_limit: u64,
    pub tx_size_cost_per_byte: u64,
    pub sig_verify_cost_ed25519: u64,
}

impl Default for AuthParams {
    fn default() -> Self {
        Self {
            max_memo_characters: 256,
            tx_sig_limit: 7,
            tx_size_cost_per_byte: 10,
            sig_verify_cost_ed25519: 590,
        }
    }
}
