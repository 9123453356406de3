use serde::{Deserialize, Serialize};
use shared_types::{Address, Coin, PubKey};

pub const MSG_CREATE_VALIDATOR: &str = "/staking.MsgCreateValidator";
pub const MSG_DELEGATE: &str = "/staking.MsgDelegate";

/// Tokens per unit of consensus power.
pub const POWER_REDUCTION: u128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondStatus {
    Unbonded,
    Bonded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub operator: Address,
    pub consensus_pubkey: PubKey,
    pub tokens: u128,
    pub delegator_shares: u128,
    pub status: BondStatus,
    #[serde(default)]
    pub jailed: bool,
}

impl Validator {
    #[must_use]
    pub fn consensus_address(&self) -> Address {
        self.consensus_pubkey.address()
    }

    #[must_use]
    pub fn is_bonded(&self) -> bool {
        self.status == BondStatus::Bonded
    }

    /// Power the validator would have if bonded.
    #[must_use]
    pub fn potential_power(&self) -> i64 {
        i64::try_from(self.tokens / POWER_REDUCTION).unwrap_or(i64::MAX)
    }

    /// Shares minted for `amount` new tokens at the current exchange rate.
    #[must_use]
    pub fn shares_for(&self, amount: u128) -> Option<u128> {
        if self.tokens == 0 || self.delegator_shares == 0 {
            Some(amount)
        } else {
            amount
                .checked_mul(self.delegator_shares)
                .map(|n| n / self.tokens)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: Address,
    pub shares: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    pub bond_denom: String,
    pub max_validators: u32,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            bond_denom: "stake".into(),
            max_validators: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingGenesis {
    #[serde(default)]
    pub params: StakingParams,
    #[serde(default)]
    pub validators: Vec<Validator>,
    #[serde(default)]
    pub delegations: Vec<Delegation>,
    /// Set on export; creation hooks are skipped when re-importing.
    #[serde(default)]
    pub exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateValidator {
    pub operator: Address,
    pub pub_key: PubKey,
    pub amount: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegate {
    pub delegator: Address,
    pub validator: Address,
    pub amount: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub bonded_tokens: u128,
    pub not_bonded_tokens: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DelegationQuery {
    pub delegator: Address,
    pub validator: Address,
}
