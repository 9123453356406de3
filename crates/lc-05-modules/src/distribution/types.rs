use serde::{Deserialize, Serialize};
use shared_types::{Address, Coins};

pub const MSG_WITHDRAW_REWARDS: &str = "/distribution.MsgWithdrawValidatorRewards";
pub const MSG_FUND_COMMUNITY_POOL: &str = "/distribution.MsgFundCommunityPool";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrParams {
    pub community_tax_bps: u64,
}

impl Default for DistrParams {
    fn default() -> Self {
        Self {
            community_tax_bps: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRewards {
    pub validator: Address,
    pub rewards: Coins,
}

/// A slash recorded against a validator, kept for reward accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashEvent {
    pub validator: Address,
    pub height: u64,
    pub fraction_bps: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrGenesis {
    #[serde(default)]
    pub params: DistrParams,
    #[serde(default)]
    pub community_pool: Coins,
    #[serde(default)]
    pub outstanding_rewards: Vec<ValidatorRewards>,
    #[serde(default)]
    pub slash_events: Vec<SlashEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdrawValidatorRewards {
    pub validator: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgFundCommunityPool {
    pub depositor: Address,
    pub amount: Coins,
}
