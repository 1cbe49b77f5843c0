use std::collections::HashMap;

use crate::error::Result;
use crate::role::{Role, RoleSet};
use crate::store::RoleStore;
use crate::types::AccountId;

/// Full cache content, keyed by account.
pub type RoleSnapshot = HashMap<AccountId, RoleSet>;

/// Process-local mirror of persisted role assignments.
///
/// Mutations are applied after the backing [`RoleStore`] has been updated, so
/// the cache converges to the store once in-flight mutations finish.
pub trait RoleCache: Send + Sync {
    /// Replaces the whole content.
    ///
    /// Takes `&mut self`: nothing else can read or write the cache while it
    /// loads.
    fn load(&mut self, snapshot: RoleSnapshot);

    /// Returns the role set of an account.
    fn get_roles(&self, account: &AccountId) -> Result<RoleSet>;

    /// Adds a role, creating the entry when the account is not cached yet.
    /// Adding a held role is a no-op.
    fn append_role(&self, account: &AccountId, role: Role);

    /// Replaces the role set of a cached account.
    ///
    /// Fails with [`crate::Error::UnknownAccount`] and creates nothing when
    /// the account is not cached.
    fn replace_roles(&self, account: &AccountId, roles: RoleSet) -> Result<()>;

    /// Moves the entry of `old` to `new`.
    ///
    /// Afterwards `old` is unknown. Concurrent readers never observe both keys
    /// missing, nor both keys present with different role sets.
    fn replace_identity(&self, old: &AccountId, new: AccountId) -> Result<()>;
}

/// Loads every persisted role assignment into `cache`.
///
/// Returns the number of accounts loaded.
pub async fn bootstrap<R, C>(store: &R, cache: &mut C) -> Result<usize>
where
    R: RoleStore + ?Sized,
    C: RoleCache + ?Sized,
{
    let assignments = store.role_assignments().await?;
    let pairs = assignments.len();

    let mut snapshot = RoleSnapshot::new();
    for (account, role) in assignments {
        snapshot.entry(account).or_default().insert(role);
    }

    let accounts = snapshot.len();
    cache.load(snapshot);
    tracing::info!(accounts, pairs, "role cache loaded");
    Ok(accounts)
}
