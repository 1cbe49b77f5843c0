use crate::error::StoreError;
use crate::model::{Account, Location, NewRental, Rental, Transport, TransportKind};
use crate::role::{Role, RoleSet};
use crate::types::{AccountId, Page, RentalId, TransportId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Result of [`RentalStore::create_rental`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The rental was inserted.
    Created(Rental),
    /// Another active rental already holds the transport. Nothing was inserted.
    TransportBusy,
}

/// Result of [`RentalStore::end_rental`].
#[derive(Debug, Clone, PartialEq)]
pub enum EndOutcome {
    /// This call moved the rental from active to ended.
    Ended(Rental),
    /// The rental was already ended; the stored record is returned untouched.
    AlreadyEnded(Rental),
    /// No rental with that id.
    NotFound,
}

/// Store interface for accounts.
#[async_trait]
pub trait AccountStore {
    /// Returns an account by id, including soft-deleted ones.
    async fn account(&self, id: &AccountId) -> std::result::Result<Option<Account>, StoreError>;

    /// Returns accounts that are not soft-deleted, ordered by id.
    async fn accounts(&self, page: Page) -> std::result::Result<Vec<Account>, StoreError>;

    /// Inserts an account. Returns `false` when the id is taken.
    async fn insert_account(&self, account: Account) -> std::result::Result<bool, StoreError>;

    /// Atomically adds `delta` to the balance and returns the new balance,
    /// or `None` when the account does not exist.
    async fn adjust_balance(
        &self,
        id: &AccountId,
        delta: Decimal,
    ) -> std::result::Result<Option<Decimal>, StoreError>;

    /// Overwrites the balance. Returns `false` when the account does not exist.
    async fn set_balance(
        &self,
        id: &AccountId,
        balance: Decimal,
    ) -> std::result::Result<bool, StoreError>;

    /// Replaces the credential hash. Returns `false` when the account does not exist.
    async fn update_credential(
        &self,
        id: &AccountId,
        credential_hash: String,
    ) -> std::result::Result<bool, StoreError>;

    /// Changes the account handle. Returns `false` when `old` does not exist.
    async fn rename_account(
        &self,
        old: &AccountId,
        new: &AccountId,
    ) -> std::result::Result<bool, StoreError>;

    /// Soft-deletes an account. Returns `false` when it does not exist.
    async fn remove_account(&self, id: &AccountId) -> std::result::Result<bool, StoreError>;
}

/// Store interface for role assignments.
#[async_trait]
pub trait RoleStore {
    /// Assigns a role. Assigning a held role is a no-op.
    async fn append_role(&self, id: &AccountId, role: Role)
    -> std::result::Result<(), StoreError>;

    /// Returns roles assigned to an account.
    async fn account_roles(&self, id: &AccountId) -> std::result::Result<RoleSet, StoreError>;

    /// Replaces every role assigned to an account.
    async fn replace_roles(
        &self,
        id: &AccountId,
        roles: RoleSet,
    ) -> std::result::Result<(), StoreError>;

    /// Returns every `(account, role)` assignment, used to bootstrap the role cache.
    async fn role_assignments(&self) -> std::result::Result<Vec<(AccountId, Role)>, StoreError>;
}

/// Store interface for transports.
#[async_trait]
pub trait TransportStore {
    /// Returns a transport by id, including soft-deleted ones.
    async fn transport(
        &self,
        id: TransportId,
    ) -> std::result::Result<Option<Transport>, StoreError>;

    /// Returns transports that are not soft-deleted, optionally of one kind.
    async fn transports(
        &self,
        page: Page,
        kind: Option<TransportKind>,
    ) -> std::result::Result<Vec<Transport>, StoreError>;

    /// Moves a transport. Returns `false` when it does not exist.
    async fn relocate(
        &self,
        id: TransportId,
        location: Location,
    ) -> std::result::Result<bool, StoreError>;
}

/// Store interface for rentals.
#[async_trait]
pub trait RentalStore {
    /// Inserts an active rental unless the transport already has one.
    ///
    /// The existence check and the insert must be atomic with respect to each
    /// other: of several concurrent calls for one transport, exactly one may
    /// return [`CreateOutcome::Created`].
    async fn create_rental(&self, rental: NewRental)
    -> std::result::Result<CreateOutcome, StoreError>;

    /// Returns a rental by id, including soft-deleted ones.
    async fn rental(&self, id: RentalId) -> std::result::Result<Option<Rental>, StoreError>;

    /// Sets the end timestamp and fare if the rental is still active.
    ///
    /// This is a compare-and-set: an ended rental is never overwritten.
    async fn end_rental(
        &self,
        id: RentalId,
        ended_at: DateTime<Utc>,
        fare: Decimal,
    ) -> std::result::Result<EndOutcome, StoreError>;

    /// Returns whether the transport has an active rental.
    async fn has_active_rental(
        &self,
        transport: TransportId,
    ) -> std::result::Result<bool, StoreError>;

    /// Returns rentals of an account, ordered by id.
    async fn account_rentals(
        &self,
        account: &AccountId,
        page: Page,
    ) -> std::result::Result<Vec<Rental>, StoreError>;

    /// Returns rentals of a transport, ordered by id.
    async fn transport_rentals(
        &self,
        transport: TransportId,
        page: Page,
    ) -> std::result::Result<Vec<Rental>, StoreError>;

    /// Soft-deletes a rental. Returns `false` when it does not exist.
    async fn remove_rental(&self, id: RentalId) -> std::result::Result<bool, StoreError>;
}

/// Composite store trait.
pub trait Store: AccountStore + RoleStore + TransportStore + RentalStore + Send + Sync {}

impl<T> Store for T where T: AccountStore + RoleStore + TransportStore + RentalStore + Send + Sync {}
