//! Coin amounts.
//!
//! `Coins` is always kept sorted by denomination with no duplicate and no zero
//! entries, so two equal balances have exactly one representation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single denomination and amount.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("coin '{s}' has no denomination"))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(format!("coin '{s}' has no amount"));
        }
        if !denom.chars().all(|c| c.is_ascii_alphanumeric() || c == '/') {
            return Err(format!("invalid denomination '{denom}'"));
        }
        let amount = amount
            .parse::<u128>()
            .map_err(|e| format!("invalid amount in '{s}': {e}"))?;
        Ok(Coin::new(denom, amount))
    }
}

/// A normalized multi-denomination amount.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// The empty amount.
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Normalize an arbitrary list: merge duplicates, drop zero amounts, sort.
    pub fn from_unsorted(coins: impl IntoIterator<Item = Coin>) -> Self {
        let mut merged: BTreeMap<String, u128> = BTreeMap::new();
        for coin in coins {
            let entry = merged.entry(coin.denom).or_default();
            *entry = entry.saturating_add(coin.amount);
        }
        Self(
            merged
                .into_iter()
                .filter(|(_, amount)| *amount > 0)
                .map(|(denom, amount)| Coin { denom, amount })
                .collect(),
        )
    }

    /// Single-denomination convenience constructor.
    pub fn single(denom: impl Into<String>, amount: u128) -> Self {
        Self::from_unsorted([Coin::new(denom, amount)])
    }

    /// Parse a comma separated list such as `10stake,3atom`.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.trim().is_empty() {
            return Ok(Self::empty());
        }
        let coins = s
            .split(',')
            .map(str::parse::<Coin>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_unsorted(coins))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map_or(0, |c| c.amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    #[must_use]
    pub fn denoms(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.denom.as_str()).collect()
    }

    /// Sum of two amounts, `None` on overflow.
    #[must_use]
    pub fn checked_add(&self, other: &Coins) -> Option<Coins> {
        let mut merged: BTreeMap<String, u128> = BTreeMap::new();
        for coin in self.0.iter().chain(other.0.iter()) {
            let entry = merged.entry(coin.denom.clone()).or_default();
            *entry = entry.checked_add(coin.amount)?;
        }
        Some(Self::from_unsorted(
            merged.into_iter().map(|(d, a)| Coin::new(d, a)),
        ))
    }

    /// Difference of two amounts, `None` if any denomination would go negative.
    #[must_use]
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut merged: BTreeMap<String, u128> =
            self.0.iter().map(|c| (c.denom.clone(), c.amount)).collect();
        for coin in &other.0 {
            let entry = merged.get_mut(&coin.denom)?;
            *entry = entry.checked_sub(coin.amount)?;
        }
        Some(Self::from_unsorted(
            merged.into_iter().map(|(d, a)| Coin::new(d, a)),
        ))
    }

    /// True if every denomination in `other` is covered by `self`.
    #[must_use]
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.0.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl Serialize for Coins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Coin>::deserialize(deserializer)?;
        Ok(Self::from_unsorted(raw))
    }
}

mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
