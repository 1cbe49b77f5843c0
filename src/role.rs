use crate::error::{Error, Result};
use crate::types::MAX_NAME_LEN;
use std::borrow::Borrow;
use std::fmt;

/// Name of the role every account holds.
pub const USER_ROLE: &str = "user";
/// Name of the administrator role.
pub const ADMIN_ROLE: &str = "admin";

/// Role name wrapper.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Role(String);

impl Role {
    /// Parses and validates a role name.
    ///
    /// This trims whitespace and normalizes to lowercase.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let normalized = value.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(Error::InvalidRole("role must not be empty".to_string()));
        }
        if normalized.len() > MAX_NAME_LEN {
            return Err(Error::InvalidRole(format!(
                "role length must be <= {MAX_NAME_LEN}"
            )));
        }
        if !normalized
            .chars()
            .all(|ch| matches!(ch, 'a'..='z' | '0'..='9' | '_' | '-' | ':'))
        {
            return Err(Error::InvalidRole(
                "role contains invalid characters".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    /// Creates a role from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// The base role held by every account.
    pub fn user() -> Self {
        Self(USER_ROLE.to_string())
    }

    /// The administrator role.
    pub fn admin() -> Self {
        Self(ADMIN_ROLE.to_string())
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Role {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// Insertion-ordered set of roles without duplicates.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Roles for a freshly registered account.
    pub fn for_account(admin: bool) -> Self {
        let mut roles = Self::from(Role::user());
        if admin {
            roles.insert(Role::admin());
        }
        roles
    }

    /// Adds a role. Returns `false` when it was already present.
    pub fn insert(&mut self, role: Role) -> bool {
        if self.contains(&role) {
            return false;
        }
        self.0.push(role);
        true
    }

    /// Removes a role. Returns `false` when it was absent.
    pub fn remove(&mut self, role: &Role) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != role);
        before != self.0.len()
    }

    /// Returns whether the role is present.
    pub fn contains(&self, role: &Role) -> bool {
        self.0.iter().any(|existing| existing == role)
    }

    /// Returns whether the set holds the administrator role.
    pub fn is_admin(&self) -> bool {
        self.0.iter().any(|role| role.as_str() == ADMIN_ROLE)
    }

    /// Iterates roles in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Role> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Role> for RoleSet {
    fn from(role: Role) -> Self {
        Self(vec![role])
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut roles = Self::new();
        for role in iter {
            roles.insert(role);
        }
        roles
    }
}

impl Extend<Role> for RoleSet {
    fn extend<I: IntoIterator<Item = Role>>(&mut self, iter: I) {
        for role in iter {
            self.insert(role);
        }
    }
}

impl IntoIterator for RoleSet {
    type Item = Role;
    type IntoIter = std::vec::IntoIter<Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a Role;
    type IntoIter = std::slice::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_should_trim_and_lowercase() {
        let role = Role::try_from(" Admin ").unwrap();
        assert_eq!(role, Role::admin());
    }

    #[test]
    fn try_from_should_reject_invalid_characters() {
        assert!(matches!(Role::try_from("super user"), Err(Error::InvalidRole(_))));
        assert!(matches!(Role::try_from(""), Err(Error::InvalidRole(_))));
    }

    #[test]
    fn role_set_should_keep_order_and_drop_duplicates() {
        let roles: RoleSet = ["user", "admin", "user"]
            .into_iter()
            .map(|name| Role::try_from(name).unwrap())
            .collect();

        let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
        assert_eq!(names, vec!["user", "admin"]);
        assert!(roles.is_admin());
    }

    #[test]
    fn for_account_should_always_include_user() {
        assert_eq!(RoleSet::for_account(false), RoleSet::from(Role::user()));
        let admin = RoleSet::for_account(true);
        assert!(admin.contains(&Role::user()));
        assert!(admin.is_admin());
    }
}
