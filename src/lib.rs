//! Transport rental lifecycle, fare engine and authorization role cache.
//!
//! Accounts rent transports by the minute or by the day. [`RentalEngine`]
//! enforces rental preconditions and computes fares, [`MemoryRoleCache`]
//! mirrors persisted role assignments for fast access checks, and
//! [`Directory`] and [`Billing`] keep accounts, roles and balances in step.
//! Storage is pluggable through the async traits in [`store`].
//!
//! # Examples
//!
//! Starting and settling a rental with the in-memory store (enable `memory-store`):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # {
//! use std::sync::Arc;
//! use rs_rental::{
//!     AccountId, Billing, Gate, MemoryRoleCache, MemoryStore, RateType, RentalEngineBuilder,
//!     TransportId, bootstrap,
//! };
//! # futures::executor::block_on(async {
//! let store = MemoryStore::new();
//! let mut cache = MemoryRoleCache::new();
//! bootstrap(&store, &mut cache).await?;
//!
//! let engine = Arc::new(RentalEngineBuilder::new(store).build());
//! let billing = Billing::new(engine.clone(), Gate::new(Arc::new(cache)));
//!
//! let renter = AccountId::try_from("alice")?;
//! let rental = engine
//!     .create_rental(&renter, TransportId::new(1), RateType::Minutes)
//!     .await?;
//! let settlement = billing.settle(&renter, rental.id).await?;
//! # let _ = settlement;
//! # Ok::<(), rs_rental::Error>(())
//! # })
//! # .unwrap();
//! # }
//! ```
#![forbid(unsafe_code)]

mod billing;
mod cache;
mod directory;
mod engine;
mod error;
mod fare;
mod gate;
mod memory_cache;
mod model;
mod role;
pub mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::billing::{BONUS_CREDIT, Billing, Settlement};
pub use crate::cache::{RoleCache, RoleSnapshot, bootstrap};
pub use crate::directory::Directory;
pub use crate::engine::{EndPolicy, Ending, RentalEngine, RentalEngineBuilder, SharedClock};
pub use crate::error::{Error, ErrorKind, Result, StoreError};
pub use crate::fare::{RateType, compute_fare, elapsed_millis};
pub use crate::gate::{Decision, Gate};
pub use crate::memory_cache::MemoryRoleCache;
pub use crate::model::{Account, Location, NewRental, Rental, RentalState, Transport, TransportKind};
pub use crate::role::{ADMIN_ROLE, Role, RoleSet, USER_ROLE};
pub use crate::store::{
    AccountStore, CreateOutcome, EndOutcome, RentalStore, RoleStore, Store, TransportStore,
};
pub use crate::types::{AccountId, Page, RentalId, TransportId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
