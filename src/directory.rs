//! Account service keeping the role cache in step with the store.
//!
//! Every mutation is persisted first. The cache is updated only after the
//! store accepted the change. Mutations touching roles or identity hold a
//! per-account lock from the store read until the cache write, so the cache
//! ends up with whatever the store holds once they finish.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use futures::lock::{Mutex, OwnedMutexGuard};
use rust_decimal::Decimal;

use crate::cache::RoleCache;
use crate::error::{Error, Result};
use crate::model::Account;
use crate::role::{Role, RoleSet};
use crate::store::Store;
use crate::types::{AccountId, Page};

type AccountLock = Arc<Mutex<()>>;

/// Account registration, renaming and role management.
pub struct Directory<S, C> {
    store: S,
    cache: Arc<C>,
    locks: DashMap<AccountId, AccountLock>,
}

impl<S: fmt::Debug, C: fmt::Debug> fmt::Debug for Directory<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<S, C> Directory<S, C>
where
    S: Store,
    C: RoleCache,
{
    pub fn new(store: S, cache: Arc<C>) -> Self {
        Self {
            store,
            cache,
            locks: DashMap::new(),
        }
    }

    /// Registers an account holding `user`, plus `admin` when requested.
    pub async fn register(&self, account: Account, admin: bool) -> Result<Account> {
        let id = account.id.clone();
        let _guard = self.lock(&id).await;

        if !self
            .store
            .insert_account(account.clone())
            .await
            .map_err(Error::from)?
        {
            return Err(Error::AccountExists { account: id });
        }

        for role in RoleSet::for_account(admin) {
            self.store
                .append_role(&id, role)
                .await
                .map_err(Error::from)?;
        }
        let persisted = self.store.account_roles(&id).await.map_err(Error::from)?;
        for role in persisted {
            self.cache.append_role(&id, role);
        }

        tracing::debug!(account = %id, admin, "account registered");
        Ok(account)
    }

    /// Changes an account handle and re-keys its cached roles.
    pub async fn rename(&self, old: &AccountId, new: AccountId) -> Result<()> {
        let _guards = self.lock_pair(old, &new).await;

        if !self
            .store
            .rename_account(old, &new)
            .await
            .map_err(Error::from)?
        {
            return Err(Error::AccountNotFound {
                account: old.clone(),
            });
        }
        self.cache.replace_identity(old, new.clone())?;
        tracing::debug!(%old, %new, "account renamed");
        Ok(())
    }

    /// Grants or revokes the administrator role. Returns the new role set.
    pub async fn set_admin(&self, account: &AccountId, admin: bool) -> Result<RoleSet> {
        let _guard = self.lock(account).await;
        self.require_account(account).await?;

        let mut roles = self
            .store
            .account_roles(account)
            .await
            .map_err(Error::from)?;
        roles.insert(Role::user());
        if admin {
            roles.insert(Role::admin());
        } else {
            roles.remove(&Role::admin());
        }

        self.store
            .replace_roles(account, roles.clone())
            .await
            .map_err(Error::from)?;
        self.cache.replace_roles(account, roles.clone())?;
        tracing::debug!(%account, admin, "administrator role updated");
        Ok(roles)
    }

    /// Replaces the credential hash. Hashing happens before this call.
    pub async fn update_credential(
        &self,
        account: &AccountId,
        credential_hash: impl Into<String>,
    ) -> Result<()> {
        self.require_account(account).await?;
        if !self
            .store
            .update_credential(account, credential_hash.into())
            .await
            .map_err(Error::from)?
        {
            return Err(Error::AccountNotFound {
                account: account.clone(),
            });
        }
        tracing::debug!(%account, "credential updated");
        Ok(())
    }

    /// Overwrites the balance, as an administrator correction.
    pub async fn set_balance(&self, account: &AccountId, balance: Decimal) -> Result<()> {
        self.require_account(account).await?;
        if !self
            .store
            .set_balance(account, balance)
            .await
            .map_err(Error::from)?
        {
            return Err(Error::AccountNotFound {
                account: account.clone(),
            });
        }
        tracing::info!(%account, %balance, "balance overwritten");
        Ok(())
    }

    /// Soft-deletes an account. Its role assignments stay in place.
    pub async fn remove(&self, account: &AccountId) -> Result<()> {
        if !self
            .store
            .remove_account(account)
            .await
            .map_err(Error::from)?
        {
            return Err(Error::AccountNotFound {
                account: account.clone(),
            });
        }
        tracing::debug!(%account, "account removed");
        Ok(())
    }

    /// Returns the cached roles of an account.
    pub fn roles(&self, account: &AccountId) -> Result<RoleSet> {
        self.cache.get_roles(account)
    }

    /// Returns an active account.
    pub async fn account(&self, account: &AccountId) -> Result<Account> {
        self.require_account(account).await
    }

    /// Lists active accounts ordered by id.
    pub async fn accounts(&self, page: Page) -> Result<Vec<Account>> {
        self.store.accounts(page).await.map_err(Error::from)
    }

    async fn require_account(&self, account: &AccountId) -> Result<Account> {
        self.store
            .account(account)
            .await
            .map_err(Error::from)?
            .filter(|found| !found.removed)
            .ok_or_else(|| Error::AccountNotFound {
                account: account.clone(),
            })
    }

    fn lock_for(&self, account: &AccountId) -> AccountLock {
        Arc::clone(self.locks.entry(account.clone()).or_default().value())
    }

    async fn lock(&self, account: &AccountId) -> OwnedMutexGuard<()> {
        self.lock_for(account).lock_owned().await
    }

    /// Locks two accounts in id order.
    async fn lock_pair(&self, a: &AccountId, b: &AccountId) -> Vec<OwnedMutexGuard<()>> {
        let mut ids = vec![a, b];
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }
}
