use std::sync::Arc;

use crate::cache::RoleCache;
use crate::error::{Error, Result};
use crate::role::Role;
use crate::types::AccountId;

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Role is held.
    Allow,
    /// Role is not held.
    Deny,
}

/// Role checks answered from the role cache.
///
/// An account missing from the cache surfaces as
/// [`Error::UnknownAccount`] rather than a denial.
#[derive(Debug)]
pub struct Gate<C> {
    cache: Arc<C>,
}

impl<C> Clone for Gate<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C: RoleCache> Gate<C> {
    /// Creates a gate over a shared cache.
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    /// Returns the shared role cache.
    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Checks whether `account` holds `role`.
    pub fn check(&self, account: &AccountId, role: &Role) -> Result<Decision> {
        let roles = self.cache.get_roles(account)?;
        Ok(if roles.contains(role) {
            Decision::Allow
        } else {
            Decision::Deny
        })
    }

    /// Like [`Gate::check`], but a denial becomes [`Error::AccessDenied`].
    pub fn require(&self, account: &AccountId, role: &Role) -> Result<()> {
        match self.check(account, role)? {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                tracing::debug!(%account, %role, "access denied");
                Err(Error::AccessDenied {
                    account: account.clone(),
                })
            }
        }
    }

    /// Whether `account` holds the administrator role.
    pub fn is_admin(&self, account: &AccountId) -> Result<bool> {
        Ok(self.cache.get_roles(account)?.is_admin())
    }

    /// Allows `caller` to act on `subject` when they are the same account or
    /// `caller` is an administrator.
    pub fn require_self_or_admin(&self, caller: &AccountId, subject: &AccountId) -> Result<()> {
        if caller == subject || self.is_admin(caller)? {
            return Ok(());
        }
        Err(Error::AccessDenied {
            account: caller.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RoleSnapshot;
    use crate::memory_cache::MemoryRoleCache;
    use crate::role::RoleSet;

    fn account(value: &str) -> AccountId {
        AccountId::try_from(value).unwrap()
    }

    fn gate() -> Gate<MemoryRoleCache> {
        let mut snapshot = RoleSnapshot::new();
        snapshot.insert(account("alice"), RoleSet::for_account(false));
        snapshot.insert(account("root"), RoleSet::for_account(true));
        Gate::new(Arc::new(MemoryRoleCache::from(snapshot)))
    }

    #[test]
    fn check_should_allow_held_role() {
        let gate = gate();
        assert_eq!(gate.check(&account("root"), &Role::admin()).unwrap(), Decision::Allow);
        assert_eq!(gate.check(&account("alice"), &Role::user()).unwrap(), Decision::Allow);
    }

    #[test]
    fn check_should_deny_missing_role() {
        let gate = gate();
        assert_eq!(gate.check(&account("alice"), &Role::admin()).unwrap(), Decision::Deny);
        assert!(matches!(
            gate.require(&account("alice"), &Role::admin()),
            Err(Error::AccessDenied { .. })
        ));
    }

    #[test]
    fn check_should_report_uncached_account() {
        let gate = gate();
        assert!(matches!(
            gate.check(&account("ghost"), &Role::user()),
            Err(Error::UnknownAccount { .. })
        ));
    }

    #[test]
    fn self_or_admin_should_cover_both_cases() {
        let gate = gate();
        let alice = account("alice");
        let root = account("root");

        assert!(gate.require_self_or_admin(&alice, &alice).is_ok());
        assert!(gate.require_self_or_admin(&root, &alice).is_ok());
        assert!(matches!(
            gate.require_self_or_admin(&alice, &root),
            Err(Error::AccessDenied { .. })
        ));
    }
}
