use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::model::{Account, Location, NewRental, Rental, Transport, TransportKind};
use crate::role::{Role, RoleSet};
use crate::store::{
    AccountStore, CreateOutcome, EndOutcome, RentalStore, RoleStore, TransportStore,
};
use crate::types::{AccountId, Page, RentalId, TransportId};

/// In-memory store implementation for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: RwLock<BTreeMap<AccountId, Account>>,
    roles: RwLock<HashMap<AccountId, RoleSet>>,
    transports: RwLock<BTreeMap<TransportId, Transport>>,
    rentals: RwLock<RentalTable>,
}

#[derive(Debug, Default)]
struct RentalTable {
    last_id: u64,
    rows: BTreeMap<RentalId, Rental>,
    active: HashMap<TransportId, RentalId>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account together with its roles.
    pub fn add_account(&self, account: Account, roles: RoleSet) {
        self.inner
            .roles
            .write()
            .insert(account.id.clone(), roles);
        self.inner
            .accounts
            .write()
            .insert(account.id.clone(), account);
    }

    /// Inserts or replaces a transport.
    pub fn add_transport(&self, transport: Transport) {
        self.inner.transports.write().insert(transport.id, transport);
    }

    /// Flips the rentable flag of a transport.
    pub fn set_transport_rentable(&self, id: TransportId, rentable: bool) {
        if let Some(transport) = self.inner.transports.write().get_mut(&id) {
            transport.rentable = rentable;
        }
    }

    /// Soft-deletes a transport.
    pub fn remove_transport(&self, id: TransportId) {
        if let Some(transport) = self.inner.transports.write().get_mut(&id) {
            transport.removed = true;
        }
    }

    /// Overwrites the stored fare of a rental, bypassing the engine.
    pub fn overwrite_fare(&self, id: RentalId, fare: Option<Decimal>) {
        if let Some(rental) = self.inner.rentals.write().rows.get_mut(&id) {
            rental.fare = fare;
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn account(&self, id: &AccountId) -> std::result::Result<Option<Account>, StoreError> {
        Ok(self.inner.accounts.read().get(id).cloned())
    }

    async fn accounts(&self, page: Page) -> std::result::Result<Vec<Account>, StoreError> {
        let guard = self.inner.accounts.read();
        Ok(page
            .slice(guard.values().filter(|account| !account.removed))
            .cloned()
            .collect())
    }

    async fn insert_account(&self, account: Account) -> std::result::Result<bool, StoreError> {
        let mut guard = self.inner.accounts.write();
        if guard.contains_key(&account.id) {
            return Ok(false);
        }
        guard.insert(account.id.clone(), account);
        Ok(true)
    }

    async fn adjust_balance(
        &self,
        id: &AccountId,
        delta: Decimal,
    ) -> std::result::Result<Option<Decimal>, StoreError> {
        let mut guard = self.inner.accounts.write();
        let Some(account) = guard.get_mut(id) else {
            return Ok(None);
        };
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| format!("balance overflow for account {id}"))?;
        Ok(Some(account.balance))
    }

    async fn set_balance(
        &self,
        id: &AccountId,
        balance: Decimal,
    ) -> std::result::Result<bool, StoreError> {
        let mut guard = self.inner.accounts.write();
        Ok(guard
            .get_mut(id)
            .map(|account| account.balance = balance)
            .is_some())
    }

    async fn update_credential(
        &self,
        id: &AccountId,
        credential_hash: String,
    ) -> std::result::Result<bool, StoreError> {
        let mut guard = self.inner.accounts.write();
        Ok(guard
            .get_mut(id)
            .map(|account| account.credential_hash = credential_hash)
            .is_some())
    }

    async fn rename_account(
        &self,
        old: &AccountId,
        new: &AccountId,
    ) -> std::result::Result<bool, StoreError> {
        if old == new {
            return Ok(self.inner.accounts.read().contains_key(old));
        }

        let mut accounts = self.inner.accounts.write();
        if accounts.contains_key(new) {
            return Err(format!("account {new} already exists").into());
        }
        let Some(mut account) = accounts.remove(old) else {
            return Ok(false);
        };
        account.id = new.clone();
        accounts.insert(new.clone(), account);

        let mut roles = self.inner.roles.write();
        if let Some(assigned) = roles.remove(old) {
            roles.insert(new.clone(), assigned);
        }

        let mut rentals = self.inner.rentals.write();
        for rental in rentals.rows.values_mut() {
            if &rental.renter == old {
                rental.renter = new.clone();
            }
        }
        drop(rentals);

        let mut transports = self.inner.transports.write();
        for transport in transports.values_mut() {
            if &transport.owner == old {
                transport.owner = new.clone();
            }
        }
        Ok(true)
    }

    async fn remove_account(&self, id: &AccountId) -> std::result::Result<bool, StoreError> {
        let mut guard = self.inner.accounts.write();
        Ok(guard
            .get_mut(id)
            .map(|account| account.removed = true)
            .is_some())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn append_role(
        &self,
        id: &AccountId,
        role: Role,
    ) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.roles.write();
        guard.entry(id.clone()).or_default().insert(role);
        Ok(())
    }

    async fn account_roles(&self, id: &AccountId) -> std::result::Result<RoleSet, StoreError> {
        let guard = self.inner.roles.read();
        Ok(guard.get(id).cloned().unwrap_or_default())
    }

    async fn replace_roles(
        &self,
        id: &AccountId,
        roles: RoleSet,
    ) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.roles.write();
        guard.insert(id.clone(), roles);
        Ok(())
    }

    async fn role_assignments(&self) -> std::result::Result<Vec<(AccountId, Role)>, StoreError> {
        let guard = self.inner.roles.read();
        Ok(guard
            .iter()
            .flat_map(|(account, roles)| {
                roles
                    .iter()
                    .map(move |role| (account.clone(), role.clone()))
            })
            .collect())
    }
}

#[async_trait]
impl TransportStore for MemoryStore {
    async fn transport(
        &self,
        id: TransportId,
    ) -> std::result::Result<Option<Transport>, StoreError> {
        Ok(self.inner.transports.read().get(&id).cloned())
    }

    async fn transports(
        &self,
        page: Page,
        kind: Option<TransportKind>,
    ) -> std::result::Result<Vec<Transport>, StoreError> {
        let guard = self.inner.transports.read();
        let matching = guard.values().filter(|transport| {
            !transport.removed && kind.is_none_or(|kind| transport.kind == kind)
        });
        Ok(page.slice(matching).cloned().collect())
    }

    async fn relocate(
        &self,
        id: TransportId,
        location: Location,
    ) -> std::result::Result<bool, StoreError> {
        let mut guard = self.inner.transports.write();
        Ok(guard
            .get_mut(&id)
            .map(|transport| transport.location = location)
            .is_some())
    }
}

#[async_trait]
impl RentalStore for MemoryStore {
    async fn create_rental(
        &self,
        rental: NewRental,
    ) -> std::result::Result<CreateOutcome, StoreError> {
        let mut guard = self.inner.rentals.write();
        if guard.active.contains_key(&rental.transport) {
            return Ok(CreateOutcome::TransportBusy);
        }

        guard.last_id += 1;
        let id = RentalId::new(guard.last_id);
        let created = Rental::activate(id, rental);
        guard.active.insert(created.transport, id);
        guard.rows.insert(id, created.clone());
        Ok(CreateOutcome::Created(created))
    }

    async fn rental(&self, id: RentalId) -> std::result::Result<Option<Rental>, StoreError> {
        Ok(self.inner.rentals.read().rows.get(&id).cloned())
    }

    async fn end_rental(
        &self,
        id: RentalId,
        ended_at: DateTime<Utc>,
        fare: Decimal,
    ) -> std::result::Result<EndOutcome, StoreError> {
        let mut guard = self.inner.rentals.write();
        let Some(rental) = guard.rows.get_mut(&id) else {
            return Ok(EndOutcome::NotFound);
        };
        if !rental.is_active() {
            return Ok(EndOutcome::AlreadyEnded(rental.clone()));
        }

        rental.ended_at = Some(ended_at);
        rental.fare = Some(fare);
        let ended = rental.clone();
        guard.active.remove(&ended.transport);
        Ok(EndOutcome::Ended(ended))
    }

    async fn has_active_rental(
        &self,
        transport: TransportId,
    ) -> std::result::Result<bool, StoreError> {
        Ok(self.inner.rentals.read().active.contains_key(&transport))
    }

    async fn account_rentals(
        &self,
        account: &AccountId,
        page: Page,
    ) -> std::result::Result<Vec<Rental>, StoreError> {
        let guard = self.inner.rentals.read();
        let matching = guard
            .rows
            .values()
            .filter(|rental| rental.is_rented_by(account));
        Ok(page.slice(matching).cloned().collect())
    }

    async fn transport_rentals(
        &self,
        transport: TransportId,
        page: Page,
    ) -> std::result::Result<Vec<Rental>, StoreError> {
        let guard = self.inner.rentals.read();
        let matching = guard
            .rows
            .values()
            .filter(|rental| rental.transport == transport);
        Ok(page.slice(matching).cloned().collect())
    }

    async fn remove_rental(&self, id: RentalId) -> std::result::Result<bool, StoreError> {
        let mut guard = self.inner.rentals.write();
        Ok(guard
            .rows
            .get_mut(&id)
            .map(|rental| rental.removed = true)
            .is_some())
    }
}
