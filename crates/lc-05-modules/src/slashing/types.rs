use serde::{Deserialize, Serialize};
use shared_types::Address;

pub const MSG_UNJAIL: &str = "/slashing.MsgUnjail";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingParams {
    pub signed_blocks_window: u64,
    pub min_signed_per_window_bps: u64,
    /// Seconds.
    pub downtime_jail_duration: u64,
    pub slash_fraction_downtime_bps: u64,
}

impl Default for SlashingParams {
    fn default() -> Self {
        Self {
            signed_blocks_window: 100,
            min_signed_per_window_bps: 5_000,
            downtime_jail_duration: 600,
            slash_fraction_downtime_bps: 100,
        }
    }
}

impl SlashingParams {
    /// Misses tolerated within one window.
    #[must_use]
    pub fn max_missed(&self) -> u64 {
        let min_signed = crate::mul_bps(
            u128::from(self.signed_blocks_window),
            self.min_signed_per_window_bps,
        );
        self.signed_blocks_window
            .saturating_sub(u64::try_from(min_signed).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInfo {
    /// Consensus address.
    pub address: Address,
    pub start_height: u64,
    pub index_offset: u64,
    pub missed_blocks_counter: u64,
    /// Unix seconds.
    pub jailed_until: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedBlocks {
    pub address: Address,
    /// Window indexes currently marked missed.
    pub indexes: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingGenesis {
    #[serde(default)]
    pub params: SlashingParams,
    #[serde(default)]
    pub signing_infos: Vec<SigningInfo>,
    #[serde(default)]
    pub missed_blocks: Vec<MissedBlocks>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUnjail {
    /// Operator address of the jailed validator.
    pub validator: Address,
}
