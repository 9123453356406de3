//! # Gas Metering
//!
//! Every store access is charged against the context's meter. Persistent
//! partitions use `KvGasConfig::kv()`, transient and memory partitions the
//! cheaper `KvGasConfig::transient()` table.

use shared_types::StoreError;

use super::store_key::StoreKind;

/// Per-operation store costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvGasConfig {
    pub has_cost: u64,
    pub delete_cost: u64,
    pub read_cost_flat: u64,
    pub read_cost_per_byte: u64,
    pub write_cost_flat: u64,
    pub write_cost_per_byte: u64,
    pub iter_next_cost_flat: u64,
}

impl KvGasConfig {
    #[must_use]
    pub const fn kv() -> Self {
        Self {
            has_cost: 1000,
            delete_cost: 1000,
            read_cost_flat: 1000,
            read_cost_per_byte: 3,
            write_cost_flat: 2000,
            write_cost_per_byte: 30,
            iter_next_cost_flat: 30,
        }
    }

    #[must_use]
    pub const fn transient() -> Self {
        Self {
            has_cost: 100,
            delete_cost: 100,
            read_cost_flat: 100,
            read_cost_per_byte: 0,
            write_cost_flat: 200,
            write_cost_per_byte: 3,
            iter_next_cost_flat: 3,
        }
    }

    #[must_use]
    pub const fn for_kind(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Persistent => Self::kv(),
            StoreKind::Transient | StoreKind::Memory => Self::transient(),
        }
    }
}

/// Tracks gas consumed against an optional limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasMeter {
    limit: Option<u64>,
    consumed: u64,
}

impl GasMeter {
    /// A meter that never runs out. Used outside transactions.
    #[must_use]
    pub fn infinite() -> Self {
        Self {
            limit: None,
            consumed: 0,
        }
    }

    #[must_use]
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
        }
    }

    /// Charge `amount`. Consumption is recorded even when the limit is crossed,
    /// so `consumed()` reports what the failing step would have cost.
    pub fn consume(&mut self, amount: u64, descriptor: &str) -> Result<(), StoreError> {
        self.consumed = self.consumed.saturating_add(amount);
        match self.limit {
            Some(limit) if self.consumed > limit => Err(StoreError::OutOfGas {
                descriptor: descriptor.to_string(),
                limit,
                used: self.consumed,
            }),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|l| l.saturating_sub(self.consumed))
    }

    #[must_use]
    pub fn is_out_of_gas(&self) -> bool {
        self.limit.is_some_and(|l| self.consumed > l)
    }
}

impl Default for GasMeter {
    fn default() -> Self {
        Self::infinite()
    }
}
