use crate::fare::RateType;
use crate::types::{AccountId, RentalId, TransportId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed identifier or enumeration input.
    Input,
    /// A business precondition did not hold. Report to the caller, never retry.
    Precondition,
    /// An upstream caller skipped a required existence check.
    Consistency,
    /// A storage collaborator failed.
    Collaborator,
}

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid role name.
    #[error("invalid role: {0}")]
    InvalidRole(String),
    /// Unknown rate type name.
    #[error("{0} is not a rate type")]
    InvalidRateType(String),
    /// Unknown transport type name.
    #[error("{0} is not a transport type")]
    InvalidTransportKind(String),
    /// Transport does not exist.
    #[error("transport {transport} not found")]
    TransportNotFound { transport: TransportId },
    /// Transport has been soft-deleted.
    #[error("transport {transport} has been removed")]
    TransportRemoved { transport: TransportId },
    /// Transport is not offered for rent.
    #[error("transport {transport} is not available for rent")]
    NotRentable { transport: TransportId },
    /// Transport already has an active rental.
    #[error("transport {transport} is already rented")]
    AlreadyRented { transport: TransportId },
    /// Owners cannot rent their own transport.
    #[error("account {account} owns transport {transport} and cannot rent it")]
    OwnerCannotRent {
        account: AccountId,
        transport: TransportId,
    },
    /// Transport has no rate for the requested rental type.
    #[error("transport {transport} has no {rate_type} rate configured")]
    RateNotConfigured {
        transport: TransportId,
        rate_type: RateType,
    },
    /// Account balance is below zero.
    #[error("account {account} has a negative balance of {balance}")]
    NegativeBalance { account: AccountId, balance: Decimal },
    /// Account does not exist or has been removed.
    #[error("account {account} not found")]
    AccountNotFound { account: AccountId },
    /// Account identifier is already taken.
    #[error("account {account} already exists")]
    AccountExists { account: AccountId },
    /// Caller lacks the rights for the operation.
    #[error("account {account} is not allowed to perform this operation")]
    AccessDenied { account: AccountId },
    /// Rental does not exist.
    #[error("rental {rental} not found")]
    RentalNotFound { rental: RentalId },
    /// Rental has already been ended.
    #[error("rental {rental} has already ended")]
    AlreadyEnded { rental: RentalId },
    /// Operation requires an ended rental.
    #[error("rental {rental} is still active")]
    RentalStillActive { rental: RentalId },
    /// Fare does not fit the decimal range.
    #[error("fare overflow for rental {rental}")]
    FareOverflow { rental: RentalId },
    /// The rental ended but its fare could not be debited. The rental stays
    /// ended, so the debit has to be replayed from this error.
    #[error("rental {rental} ended with fare {fare} but debiting {renter} failed: {source}")]
    DebitFailed {
        rental: RentalId,
        renter: AccountId,
        fare: Decimal,
        #[source]
        source: StoreError,
    },
    /// Role cache mutation targeted an account with no cached entry.
    #[error("account {account} not found in role cache")]
    UnknownAccount { account: AccountId },
}

impl Error {
    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(_) | Self::DebitFailed { .. } => ErrorKind::Collaborator,
            Self::InvalidId(_)
            | Self::InvalidRole(_)
            | Self::InvalidRateType(_)
            | Self::InvalidTransportKind(_) => ErrorKind::Input,
            Self::UnknownAccount { .. } => ErrorKind::Consistency,
            Self::TransportNotFound { .. }
            | Self::TransportRemoved { .. }
            | Self::NotRentable { .. }
            | Self::AlreadyRented { .. }
            | Self::OwnerCannotRent { .. }
            | Self::RateNotConfigured { .. }
            | Self::NegativeBalance { .. }
            | Self::AccountNotFound { .. }
            | Self::AccountExists { .. }
            | Self::AccessDenied { .. }
            | Self::RentalNotFound { .. }
            | Self::AlreadyEnded { .. }
            | Self::RentalStillActive { .. }
            | Self::FareOverflow { .. } => ErrorKind::Precondition,
        }
    }

    pub(crate) fn unknown_account(account: &AccountId) -> Self {
        Self::UnknownAccount {
            account: account.clone(),
        }
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
