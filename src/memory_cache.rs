use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::cache::{RoleCache, RoleSnapshot};
use crate::error::{Error, Result};
use crate::role::{Role, RoleSet};
use crate::types::AccountId;

type Slot = Arc<RwLock<RoleSet>>;

/// In-memory role cache.
///
/// Every account owns an independent slot. Operations on different accounts
/// never wait on each other; operations on one account serialize on its slot.
/// Shard guards of the map are always released before a slot lock is taken.
#[derive(Debug, Default)]
pub struct MemoryRoleCache {
    slots: DashMap<AccountId, Slot>,
}

impl MemoryRoleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached accounts.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns whether the account has an entry.
    pub fn contains(&self, account: &AccountId) -> bool {
        self.slots.contains_key(account)
    }

    fn slot(&self, account: &AccountId) -> Option<Slot> {
        self.slots.get(account).map(|entry| Arc::clone(entry.value()))
    }
}

impl From<RoleSnapshot> for MemoryRoleCache {
    fn from(snapshot: RoleSnapshot) -> Self {
        let mut cache = Self::new();
        cache.load(snapshot);
        cache
    }
}

impl RoleCache for MemoryRoleCache {
    fn load(&mut self, snapshot: RoleSnapshot) {
        let slots = DashMap::with_capacity(snapshot.len());
        for (account, roles) in snapshot {
            slots.insert(account, Arc::new(RwLock::new(roles)));
        }
        self.slots = slots;
    }

    fn get_roles(&self, account: &AccountId) -> Result<RoleSet> {
        let slot = self
            .slot(account)
            .ok_or_else(|| Error::unknown_account(account))?;
        let roles = slot.read().clone();
        Ok(roles)
    }

    fn append_role(&self, account: &AccountId, role: Role) {
        let slot = Arc::clone(
            self.slots
                .entry(account.clone())
                .or_insert_with(Slot::default)
                .value(),
        );
        if slot.write().insert(role.clone()) {
            tracing::debug!(%account, %role, "role appended to cache");
        }
    }

    fn replace_roles(&self, account: &AccountId, roles: RoleSet) -> Result<()> {
        let Some(slot) = self.slot(account) else {
            tracing::warn!(%account, "role replacement for uncached account");
            return Err(Error::unknown_account(account));
        };
        *slot.write() = roles;
        tracing::debug!(%account, "cached roles replaced");
        Ok(())
    }

    fn replace_identity(&self, old: &AccountId, new: AccountId) -> Result<()> {
        if old == &new {
            return self.slot(old).map(drop).ok_or_else(|| Error::unknown_account(old));
        }

        let Some(slot) = self.slot(old) else {
            tracing::warn!(%old, %new, "rename of uncached account");
            return Err(Error::unknown_account(old));
        };

        // Holding the slot lock keeps same-key mutations out while both keys
        // point at it.
        let _guard = slot.write();
        let still_current = self
            .slots
            .get(old)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), &slot));
        if !still_current {
            return Err(Error::unknown_account(old));
        }

        if let Some(replaced) = self.slots.insert(new.clone(), Arc::clone(&slot)) {
            if !Arc::ptr_eq(&replaced, &slot) {
                tracing::warn!(%old, %new, "rename overwrote an existing cache entry");
            }
        }
        self.slots.remove(old);
        tracing::debug!(%old, %new, "cache entry re-keyed");
        Ok(())
    }
}
