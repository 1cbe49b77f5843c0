//! Records exchanged with the storage collaborators.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::fare::{RateType, compute_fare};
use crate::types::{AccountId, RentalId, TransportId};

/// Persisted account record. Roles live in a separate relation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    /// Unique handle, also the key of the role cache.
    pub id: AccountId,
    /// Opaque credential hash. Hashing happens outside this crate.
    pub credential_hash: String,
    /// May drop below zero once a rental is settled.
    pub balance: Decimal,
    /// Soft-delete flag.
    pub removed: bool,
}

impl Account {
    /// Creates an active account.
    pub fn new(id: AccountId, credential_hash: impl Into<String>, balance: Decimal) -> Self {
        Self {
            id,
            credential_hash: credential_hash.into(),
            balance,
            removed: false,
        }
    }
}

/// Transport type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum TransportKind {
    Car,
    Bike,
    Scooter,
}

impl TransportKind {
    /// Canonical upper-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Car => "CAR",
            Self::Bike => "BIKE",
            Self::Scooter => "SCOOTER",
        }
    }

    /// Parses a list filter where `ALL` (any case) means no filter.
    pub fn parse_filter(value: &str) -> Result<Option<Self>> {
        if value.trim().eq_ignore_ascii_case("ALL") {
            return Ok(None);
        }
        value.parse().map(Some)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        [Self::Car, Self::Bike, Self::Scooter]
            .into_iter()
            .find(|kind| trimmed.eq_ignore_ascii_case(kind.as_str()))
            .ok_or_else(|| Error::InvalidTransportKind(value.to_string()))
    }
}

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Persisted transport record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transport {
    pub id: TransportId,
    /// Account that registered the transport. It can never rent it.
    pub owner: AccountId,
    pub kind: TransportKind,
    /// Whether the owner currently offers it for rent.
    pub rentable: bool,
    /// Last known position. Moved to the drop-off point when a rental ends
    /// there.
    pub location: Location,
    /// Price per minute, if offered by the minute.
    pub minute_rate: Option<Decimal>,
    /// Price per day, if offered by the day.
    pub day_rate: Option<Decimal>,
    /// Soft-delete flag.
    pub removed: bool,
}

impl Transport {
    /// Returns the configured rate for `rate_type`.
    ///
    /// A negative rate counts as not configured.
    pub fn rate_for(&self, rate_type: RateType) -> Option<Decimal> {
        let rate = match rate_type {
            RateType::Minutes => self.minute_rate,
            RateType::Days => self.day_rate,
        }?;
        (!rate.is_sign_negative()).then_some(rate)
    }

    /// Whether `account` registered this transport.
    pub fn is_owned_by(&self, account: &AccountId) -> bool {
        &self.owner == account
    }
}

/// Observable rental state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentalState {
    /// Running; no end timestamp, no fare.
    Active,
    /// Settled; end timestamp and fare are fixed.
    Ended,
    /// Ended and soft-deleted by an administrator.
    Removed,
}

/// Insert request for a new rental. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRental {
    pub renter: AccountId,
    pub transport: TransportId,
    pub started_at: DateTime<Utc>,
    /// Rate copied from the transport when the rental starts.
    pub rate_unit: Decimal,
    pub rate_type: RateType,
}

/// Persisted rental record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rental {
    pub id: RentalId,
    /// Account paying for the rental.
    pub renter: AccountId,
    pub transport: TransportId,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, when the rental ends.
    pub ended_at: Option<DateTime<Utc>>,
    /// Rate captured at start. Later rate changes on the transport do not
    /// affect it.
    pub rate_unit: Decimal,
    pub rate_type: RateType,
    /// Final price, present only once ended.
    pub fare: Option<Decimal>,
    /// Soft-delete flag. Only ended rentals can be removed.
    pub removed: bool,
}

impl Rental {
    /// Materializes an insert request as an active rental.
    pub fn activate(id: RentalId, new: NewRental) -> Self {
        Self {
            id,
            renter: new.renter,
            transport: new.transport,
            started_at: new.started_at,
            ended_at: None,
            rate_unit: new.rate_unit,
            rate_type: new.rate_type,
            fare: None,
            removed: false,
        }
    }

    /// Derives the lifecycle state from the end and removal fields.
    pub fn state(&self) -> RentalState {
        match (self.ended_at, self.removed) {
            (None, _) => RentalState::Active,
            (Some(_), false) => RentalState::Ended,
            (Some(_), true) => RentalState::Removed,
        }
    }

    /// Whether the rental has not ended yet.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Whether `account` is the renter.
    pub fn is_rented_by(&self, account: &AccountId) -> bool {
        &self.renter == account
    }

    /// The fare the formula assigns to this record: `None` while active.
    pub fn expected_fare(&self) -> Result<Option<Decimal>> {
        self.ended_at
            .map(|ended_at| {
                compute_fare(
                    self.id,
                    self.rate_type,
                    self.rate_unit,
                    self.started_at,
                    ended_at,
                )
            })
            .transpose()
    }
}
