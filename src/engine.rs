use std::fmt;
use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::fare::{RateType, compute_fare};
use crate::model::{Location, NewRental, Rental, RentalState};
use crate::store::{CreateOutcome, EndOutcome, Store};
use crate::types::{AccountId, Page, RentalId, TransportId};

const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Behavior of [`RentalEngine::end_rental`] on a rental that already ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndPolicy {
    /// Return the stored rental as [`Ending::AlreadySettled`].
    #[default]
    Idempotent,
    /// Fail with [`Error::AlreadyEnded`].
    Reject,
}

/// Result of ending a rental.
#[derive(Debug, Clone, PartialEq)]
pub enum Ending {
    /// This call moved the rental from active to ended.
    Settled(Rental),
    /// The rental had already ended. Its stored end and fare are unchanged.
    AlreadySettled(Rental),
}

impl Ending {
    /// Returns the rental in either outcome.
    pub fn rental(&self) -> &Rental {
        match self {
            Self::Settled(rental) | Self::AlreadySettled(rental) => rental,
        }
    }

    pub fn into_rental(self) -> Rental {
        match self {
            Self::Settled(rental) | Self::AlreadySettled(rental) => rental,
        }
    }

    /// Whether this call performed the transition.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}

/// Rental lifecycle engine over a pluggable store.
///
/// The engine validates preconditions, stamps timestamps from its clock and
/// computes fares. It never changes account balances; see
/// [`crate::Billing`] for settlement.
pub struct RentalEngine<S> {
    store: S,
    clock: SharedClock,
    end_policy: EndPolicy,
    max_page_size: u32,
}

impl<S: fmt::Debug> fmt::Debug for RentalEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RentalEngine")
            .field("store", &self.store)
            .field("end_policy", &self.end_policy)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RentalEngine`].
pub struct RentalEngineBuilder<S> {
    store: S,
    clock: SharedClock,
    end_policy: EndPolicy,
    max_page_size: u32,
}

impl<S> RentalEngineBuilder<S> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(DefaultClock),
            end_policy: EndPolicy::default(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Sets the clock used for start and end timestamps.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the behavior for ending an already ended rental.
    pub fn end_policy(mut self, policy: EndPolicy) -> Self {
        self.end_policy = policy;
        self
    }

    /// Sets the largest page any list query returns. Zero is raised to one.
    pub fn max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size.max(1);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> RentalEngine<S> {
        RentalEngine {
            store: self.store,
            clock: self.clock,
            end_policy: self.end_policy,
            max_page_size: self.max_page_size,
        }
    }
}

impl<S> RentalEngine<S> {
    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the configured policy for repeated ends.
    pub fn end_policy(&self) -> EndPolicy {
        self.end_policy
    }
}

impl<S> RentalEngine<S>
where
    S: Store,
{
    /// Starts a rental of `transport` for `renter`.
    ///
    /// Preconditions are checked in a fixed order and each failure has its
    /// own error. The rate unit is captured from the transport at this point.
    pub async fn create_rental(
        &self,
        renter: &AccountId,
        transport: TransportId,
        rate_type: RateType,
    ) -> Result<Rental> {
        let vehicle = self
            .store
            .transport(transport)
            .await
            .map_err(Error::from)?
            .ok_or(Error::TransportNotFound { transport })?;
        if vehicle.removed {
            return Err(Error::TransportRemoved { transport });
        }
        if !vehicle.rentable {
            return Err(Error::NotRentable { transport });
        }
        if vehicle.is_owned_by(renter) {
            return Err(Error::OwnerCannotRent {
                account: renter.clone(),
                transport,
            });
        }
        if self
            .store
            .has_active_rental(transport)
            .await
            .map_err(Error::from)?
        {
            return Err(Error::AlreadyRented { transport });
        }

        let account = self
            .store
            .account(renter)
            .await
            .map_err(Error::from)?
            .filter(|account| !account.removed)
            .ok_or_else(|| Error::AccountNotFound {
                account: renter.clone(),
            })?;
        if account.balance < Decimal::ZERO {
            return Err(Error::NegativeBalance {
                account: renter.clone(),
                balance: account.balance,
            });
        }

        let rate_unit = vehicle
            .rate_for(rate_type)
            .ok_or(Error::RateNotConfigured {
                transport,
                rate_type,
            })?;

        let request = NewRental {
            renter: renter.clone(),
            transport,
            started_at: self.clock.utc(),
            rate_unit,
            rate_type,
        };
        match self
            .store
            .create_rental(request)
            .await
            .map_err(Error::from)?
        {
            CreateOutcome::Created(rental) => {
                tracing::debug!(
                    rental = %rental.id,
                    renter = %rental.renter,
                    transport = %rental.transport,
                    rate_type = %rental.rate_type,
                    "rental started"
                );
                Ok(rental)
            }
            CreateOutcome::TransportBusy => Err(Error::AlreadyRented { transport }),
        }
    }

    /// Ends a rental and fixes its fare.
    ///
    /// The store applies the transition as a compare-and-set, so of several
    /// concurrent calls exactly one returns [`Ending::Settled`].
    pub async fn end_rental(&self, rental: RentalId) -> Result<Ending> {
        self.end(rental, None).await
    }

    /// Ends a rental and moves the transport to `drop_off`.
    ///
    /// The transport is moved only by the call that ended the rental. A
    /// failed move is logged and does not undo the end.
    pub async fn end_rental_at(&self, rental: RentalId, drop_off: Location) -> Result<Ending> {
        self.end(rental, Some(drop_off)).await
    }

    async fn end(&self, rental: RentalId, drop_off: Option<Location>) -> Result<Ending> {
        let current = self.fetch(rental).await?;
        if !current.is_active() {
            return self.already_ended(current);
        }

        let ended_at = self.clock.utc();
        let fare = compute_fare(
            rental,
            current.rate_type,
            current.rate_unit,
            current.started_at,
            ended_at,
        )?;

        match self
            .store
            .end_rental(rental, ended_at, fare)
            .await
            .map_err(Error::from)?
        {
            EndOutcome::Ended(ended) => {
                tracing::debug!(rental = %ended.id, %fare, "rental ended");
                if let Some(location) = drop_off {
                    self.relocate(&ended, location).await;
                }
                Ok(Ending::Settled(self.reconcile(ended)?))
            }
            EndOutcome::AlreadyEnded(ended) => self.already_ended(ended),
            EndOutcome::NotFound => Err(Error::RentalNotFound { rental }),
        }
    }

    async fn relocate(&self, rental: &Rental, location: Location) {
        match self.store.relocate(rental.transport, location).await {
            Ok(true) => tracing::debug!(
                transport = %rental.transport,
                latitude = location.latitude,
                longitude = location.longitude,
                "transport dropped off"
            ),
            Ok(false) => tracing::warn!(
                rental = %rental.id,
                transport = %rental.transport,
                "transport vanished before drop-off"
            ),
            Err(error) => tracing::error!(
                rental = %rental.id,
                transport = %rental.transport,
                %error,
                "failed to record drop-off location"
            ),
        }
    }

    /// Soft-deletes an ended rental. Removing a removed rental is a no-op.
    pub async fn remove_rental(&self, rental: RentalId) -> Result<Rental> {
        let mut current = self.fetch(rental).await?;
        match current.state() {
            RentalState::Active => return Err(Error::RentalStillActive { rental }),
            RentalState::Removed => return self.reconcile(current),
            RentalState::Ended => {}
        }

        if !self
            .store
            .remove_rental(rental)
            .await
            .map_err(Error::from)?
        {
            return Err(Error::RentalNotFound { rental });
        }
        current.removed = true;
        tracing::debug!(rental = %rental, "rental removed");
        self.reconcile(current)
    }

    /// Returns a rental with its fare checked against the formula.
    pub async fn rental(&self, rental: RentalId) -> Result<Rental> {
        let current = self.fetch(rental).await?;
        self.reconcile(current)
    }

    /// Returns whether `account` is the renter of `rental`.
    pub async fn is_renter(&self, account: &AccountId, rental: RentalId) -> Result<bool> {
        Ok(self.fetch(rental).await?.is_rented_by(account))
    }

    /// Returns whether `transport` currently has an active rental.
    pub async fn is_transport_rented(&self, transport: TransportId) -> Result<bool> {
        self.store
            .has_active_rental(transport)
            .await
            .map_err(Error::from)
    }

    /// Lists rentals of an account.
    pub async fn rentals_for_account(
        &self,
        account: &AccountId,
        page: Page,
    ) -> Result<Vec<Rental>> {
        let rentals = self
            .store
            .account_rentals(account, page.clamp(self.max_page_size))
            .await
            .map_err(Error::from)?;
        rentals
            .into_iter()
            .map(|rental| self.reconcile(rental))
            .collect()
    }

    /// Lists rentals of a transport.
    pub async fn rentals_for_transport(
        &self,
        transport: TransportId,
        page: Page,
    ) -> Result<Vec<Rental>> {
        let rentals = self
            .store
            .transport_rentals(transport, page.clamp(self.max_page_size))
            .await
            .map_err(Error::from)?;
        rentals
            .into_iter()
            .map(|rental| self.reconcile(rental))
            .collect()
    }

    async fn fetch(&self, rental: RentalId) -> Result<Rental> {
        self.store
            .rental(rental)
            .await
            .map_err(Error::from)?
            .ok_or(Error::RentalNotFound { rental })
    }

    fn already_ended(&self, rental: Rental) -> Result<Ending> {
        match self.end_policy {
            EndPolicy::Idempotent => Ok(Ending::AlreadySettled(self.reconcile(rental)?)),
            EndPolicy::Reject => Err(Error::AlreadyEnded { rental: rental.id }),
        }
    }

    /// Replaces the stored fare with the formula value, logging any mismatch.
    fn reconcile(&self, mut rental: Rental) -> Result<Rental> {
        let expected = rental.expected_fare()?;
        if rental.fare != expected {
            tracing::warn!(
                rental = %rental.id,
                stored = ?rental.fare,
                expected = ?expected,
                "stored fare disagrees with fare formula"
            );
            rental.fare = expected;
        }
        Ok(rental)
    }
}
