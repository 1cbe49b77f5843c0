use std::sync::Arc;

use rust_decimal::Decimal;

use crate::cache::RoleCache;
use crate::engine::{Ending, RentalEngine};
use crate::error::{Error, Result, StoreError};
use crate::gate::Gate;
use crate::model::{Location, Rental};
use crate::store::Store;
use crate::types::{AccountId, RentalId};

/// Fixed amount added by [`Billing::grant_bonus`].
pub const BONUS_CREDIT: Decimal = Decimal::from_parts(250_000, 0, 0, false, 0);

/// Result of [`Billing::settle`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub rental: Rental,
    /// Renter balance after the debit. `None` when this call did not end the
    /// rental and therefore charged nothing.
    pub balance: Option<Decimal>,
}

impl Settlement {
    /// Whether this call charged the renter.
    pub fn charged(&self) -> bool {
        self.balance.is_some()
    }
}

/// Ends rentals on behalf of callers and moves money.
pub struct Billing<S, C> {
    engine: Arc<RentalEngine<S>>,
    gate: Gate<C>,
}

impl<S, C> Billing<S, C>
where
    S: Store,
    C: RoleCache,
{
    pub fn new(engine: Arc<RentalEngine<S>>, gate: Gate<C>) -> Self {
        Self { engine, gate }
    }

    /// Ends a rental and debits its fare from the renter.
    ///
    /// The caller must be the renter or an administrator. The debit happens
    /// only on the call that ended the rental. When that debit fails the
    /// rental stays ended and [`Error::DebitFailed`] carries the unpaid fare.
    pub async fn settle(&self, caller: &AccountId, rental: RentalId) -> Result<Settlement> {
        self.settle_with(caller, rental, None).await
    }

    /// Like [`Billing::settle`], also moving the transport to `drop_off`.
    pub async fn settle_at(
        &self,
        caller: &AccountId,
        rental: RentalId,
        drop_off: Location,
    ) -> Result<Settlement> {
        self.settle_with(caller, rental, Some(drop_off)).await
    }

    async fn settle_with(
        &self,
        caller: &AccountId,
        rental: RentalId,
        drop_off: Option<Location>,
    ) -> Result<Settlement> {
        let current = self.engine.rental(rental).await?;
        self.gate.require_self_or_admin(caller, &current.renter)?;

        let ending = match drop_off {
            Some(location) => self.engine.end_rental_at(rental, location).await?,
            None => self.engine.end_rental(rental).await?,
        };
        match ending {
            Ending::Settled(rental) => {
                let fare = rental
                    .fare
                    .ok_or(Error::RentalStillActive { rental: rental.id })?;
                let balance = self.debit(&rental, fare).await?;
                tracing::info!(
                    rental = %rental.id,
                    renter = %rental.renter,
                    %fare,
                    %balance,
                    "rental settled"
                );
                Ok(Settlement {
                    rental,
                    balance: Some(balance),
                })
            }
            Ending::AlreadySettled(rental) => Ok(Settlement {
                rental,
                balance: None,
            }),
        }
    }

    async fn debit(&self, rental: &Rental, fare: Decimal) -> Result<Decimal> {
        let source: StoreError = match self
            .engine
            .store()
            .adjust_balance(&rental.renter, -fare)
            .await
        {
            Ok(Some(balance)) => return Ok(balance),
            Ok(None) => format!("account {} not found", rental.renter).into(),
            Err(error) => error,
        };
        tracing::error!(
            rental = %rental.id,
            renter = %rental.renter,
            %fare,
            error = %source,
            "rental ended but fare was not debited"
        );
        Err(Error::DebitFailed {
            rental: rental.id,
            renter: rental.renter.clone(),
            fare,
            source,
        })
    }

    /// Credits [`BONUS_CREDIT`] to `target`. Allowed for the account itself
    /// or an administrator. Returns the new balance.
    pub async fn grant_bonus(&self, caller: &AccountId, target: &AccountId) -> Result<Decimal> {
        self.gate.require_self_or_admin(caller, target)?;

        let store = self.engine.store();
        let exists = store
            .account(target)
            .await
            .map_err(Error::from)?
            .is_some_and(|account| !account.removed);
        if !exists {
            return Err(Error::AccountNotFound {
                account: target.clone(),
            });
        }

        let balance = store
            .adjust_balance(target, BONUS_CREDIT)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::AccountNotFound {
                account: target.clone(),
            })?;
        tracing::info!(%caller, %target, %balance, "bonus credited");
        Ok(balance)
    }
}
