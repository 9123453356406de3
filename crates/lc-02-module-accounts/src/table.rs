//! # Permission Table
//!
//! ## Derivation
//!
//! ```text
//! raw: name → {Permission}        allow_list: {name}
//!        │                               │
//!        ├──→ reserved = { module_address(name) | name ∈ raw }
//!        └──→ blocked  = { module_address(name) | name ∈ raw, name ∉ allow_list }
//! ```
//!
//! An empty permission set is a valid zero-privilege account (fee collector,
//! distribution pool).

use std::collections::{BTreeMap, BTreeSet};

use shared_types::{Address, ConfigError};
use tracing::{debug, instrument};

use crate::permission::Permission;

/// Deterministic address of the module account called `name`.
#[must_use]
pub fn module_address(name: &str) -> Address {
    Address::hash_of(name.as_bytes())
}

/// Raw permission map as written in configuration.
pub type RawPermissions = BTreeMap<String, BTreeSet<Permission>>;

/// Parse `name → ["minter", ...]` string tags into a `RawPermissions` map.
/// A name may appear once.
pub fn parse_permissions<'a, I, T>(raw: I) -> Result<RawPermissions, ConfigError>
where
    I: IntoIterator<Item = (&'a str, T)>,
    T: IntoIterator<Item = &'a str>,
{
    let mut out = RawPermissions::new();
    for (name, tags) in raw {
        let perms = tags
            .into_iter()
            .map(str::parse::<Permission>)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if out.insert(name.to_string(), perms).is_some() {
            return Err(ConfigError::DuplicateModuleAccount(name.to_string()));
        }
    }
    Ok(out)
}

/// The derived, immutable permission table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    permissions: RawPermissions,
    addresses: BTreeMap<String, Address>,
    reserved: BTreeSet<Address>,
    blocked: BTreeSet<Address>,
}

impl PermissionTable {
    /// Derive the reserved and blocked sets.
    ///
    /// Every allow-listed name must be a module account; anything else is a
    /// configuration error. Two names deriving the same address is also a
    /// configuration error.
    #[instrument(skip_all, fields(accounts = raw.len()))]
    pub fn derive(raw: RawPermissions, allow_list: &BTreeSet<String>) -> Result<Self, ConfigError> {
        if let Some(unknown) = allow_list.iter().find(|n| !raw.contains_key(*n)) {
            return Err(ConfigError::UnknownAllowListedAccount(unknown.clone()));
        }

        let mut addresses = BTreeMap::new();
        let mut reserved = BTreeSet::new();
        let mut blocked = BTreeSet::new();
        for name in raw.keys() {
            let addr = module_address(name);
            if !reserved.insert(addr) {
                return Err(ConfigError::Invalid(format!(
                    "module account '{name}' collides with another module account address"
                )));
            }
            if !allow_list.contains(name) {
                blocked.insert(addr);
            }
            addresses.insert(name.clone(), addr);
        }

        debug!(
            "[Accounts] Derived {} reserved, {} blocked module account(s)",
            reserved.len(),
            blocked.len()
        );
        Ok(Self {
            permissions: raw,
            addresses,
            reserved,
            blocked,
        })
    }

    #[must_use]
    pub fn reserved(&self) -> &BTreeSet<Address> {
        &self.reserved
    }

    #[must_use]
    pub fn blocked(&self) -> &BTreeSet<Address> {
        &self.blocked
    }

    #[must_use]
    pub fn is_blocked(&self, addr: &Address) -> bool {
        self.blocked.contains(addr)
    }

    #[must_use]
    pub fn is_module_account(&self, name: &str) -> bool {
        self.permissions.contains_key(name)
    }

    #[must_use]
    pub fn has_permission(&self, name: &str, perm: Permission) -> bool {
        self.permissions
            .get(name)
            .is_some_and(|perms| perms.contains(&perm))
    }

    #[must_use]
    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.addresses.get(name).copied()
    }

    /// Module account name owning `addr`, if any.
    #[must_use]
    pub fn name_of(&self, addr: &Address) -> Option<&str> {
        self.addresses
            .iter()
            .find(|(_, a)| *a == addr)
            .map(|(n, _)| n.as_str())
    }

    /// Every module account with its address, in name order.
    #[must_use]
    pub fn module_addresses(&self) -> &BTreeMap<String, Address> {
        &self.addresses
    }

    /// Addresses that may not receive externally initiated transfers.
    #[must_use]
    pub fn blocked_addresses(&self) -> BTreeMap<Address, bool> {
        self.reserved
            .iter()
            .map(|a| (*a, self.blocked.contains(a)))
            .collect()
    }

    /// A copy of the raw permission map.
    #[must_use]
    pub fn permissions(&self) -> RawPermissions {
        self.permissions.clone()
    }
}
