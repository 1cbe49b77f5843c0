use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

pub(crate) const MAX_NAME_LEN: usize = 128;

pub(crate) fn validate_simple_name(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_NAME_LEN}"
        )));
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_allowed_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-' | '.')
}

/// Account identifier.
///
/// This is the account handle (for example a username). It is opaque to the
/// engine, but it can change over the lifetime of an account, which is why the
/// role cache supports re-keying.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AccountId(String);

impl AccountId {
    /// Creates a validated identifier.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        validate_simple_name(value.as_ref(), "account id").map(Self)
    }

    /// Creates an identifier from a trusted string without validation.
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AccountId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for AccountId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

macro_rules! define_key_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw key.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw key.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_key_type!(
    /// Transport identifier.
    TransportId
);
define_key_type!(
    /// Rental identifier.
    RentalId
);

/// Pagination window for list queries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Page {
    /// Number of records to skip.
    pub start: u32,
    /// Maximum number of records to return.
    pub count: u32,
}

impl Page {
    /// Creates a page starting at `start` holding at most `count` records.
    pub const fn new(start: u32, count: u32) -> Self {
        Self { start, count }
    }

    /// The first `count` records.
    pub const fn first(count: u32) -> Self {
        Self { start: 0, count }
    }

    /// Returns a copy whose `count` does not exceed `max`.
    pub fn clamp(self, max: u32) -> Self {
        Self {
            start: self.start,
            count: self.count.min(max),
        }
    }

    /// Applies the window to an iterator.
    pub fn slice<I: IntoIterator>(self, items: I) -> impl Iterator<Item = I::Item> {
        items
            .into_iter()
            .skip(self.start as usize)
            .take(self.count as usize)
    }
}
