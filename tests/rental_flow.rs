#![cfg(feature = "memory-store")]

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use futures::executor::block_on;
use mockable::Clock;
use rs_rental::{
    Account, AccountId, AccountStore, Billing, Directory, Error, ErrorKind, Gate, Location,
    MemoryRoleCache, MemoryStore, Page, RateType, RentalEngine, RentalEngineBuilder, RentalState,
    Role, RoleCache, RoleSet, Transport, TransportId, TransportKind, bootstrap,
};
use rust_decimal::Decimal;

struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    fn advance(&self, by: TimeDelta) {
        *self.0.lock().expect("clock mutex") += by;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex")
    }
}

struct World {
    store: MemoryStore,
    clock: Arc<MutableClock>,
    cache: Arc<MemoryRoleCache>,
    engine: Arc<RentalEngine<MemoryStore>>,
    billing: Billing<MemoryStore, MemoryRoleCache>,
}

fn account(value: &str) -> AccountId {
    AccountId::try_from(value).unwrap()
}

fn transport(id: u64, owner: &str) -> Transport {
    Transport {
        id: TransportId::new(id),
        owner: account(owner),
        kind: TransportKind::Car,
        rentable: true,
        location: Location {
            latitude: 55.75,
            longitude: 37.61,
        },
        minute_rate: Some(Decimal::from(2)),
        day_rate: None,
        removed: false,
    }
}

fn world() -> World {
    let store = MemoryStore::new();
    for (id, admin, balance) in [
        ("owner", false, 0),
        ("renter", false, 100),
        ("other", false, 100),
        ("admin", true, 0),
    ] {
        store.add_account(
            Account::new(account(id), "hash", Decimal::from(balance)),
            RoleSet::for_account(admin),
        );
    }
    store.add_transport(transport(1, "owner"));

    let mut cache = MemoryRoleCache::new();
    block_on(bootstrap(&store, &mut cache)).unwrap();
    let cache = Arc::new(cache);

    let clock = MutableClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).single().unwrap());
    let engine = Arc::new(
        RentalEngineBuilder::new(store.clone())
            .clock(clock.clone())
            .build(),
    );
    let billing = Billing::new(Arc::clone(&engine), Gate::new(Arc::clone(&cache)));

    World {
        store,
        clock,
        cache,
        engine,
        billing,
    }
}

fn balance(world: &World, id: &str) -> Decimal {
    block_on(world.store.account(&account(id)))
        .unwrap()
        .unwrap()
        .balance
}

#[test]
fn ten_minute_rental_should_charge_twenty() {
    let world = world();
    let renter = account("renter");

    let rental = block_on(world.engine.create_rental(
        &renter,
        TransportId::new(1),
        RateType::Minutes,
    ))
    .unwrap();
    assert_eq!(rental.fare, None);
    assert_eq!(rental.ended_at, None);

    world.clock.advance(TimeDelta::minutes(10));
    let settlement = block_on(world.billing.settle(&renter, rental.id)).unwrap();

    assert_eq!(settlement.rental.fare, Some(Decimal::from(20)));
    assert_eq!(settlement.balance, Some(Decimal::from(80)));
    assert_eq!(balance(&world, "renter"), Decimal::from(80));
    assert_eq!(settlement.rental.state(), RentalState::Ended);
}

#[test]
fn second_settlement_should_not_charge_again() {
    let world = world();
    let renter = account("renter");
    let rental = block_on(world.engine.create_rental(
        &renter,
        TransportId::new(1),
        RateType::Minutes,
    ))
    .unwrap();
    world.clock.advance(TimeDelta::minutes(10));
    block_on(world.billing.settle(&renter, rental.id)).unwrap();

    world.clock.advance(TimeDelta::hours(2));
    let again = block_on(world.billing.settle(&renter, rental.id)).unwrap();

    assert!(!again.charged());
    assert_eq!(again.rental.fare, Some(Decimal::from(20)));
    assert_eq!(balance(&world, "renter"), Decimal::from(80));
}

#[test]
fn busy_transport_should_be_refused() {
    let world = world();
    block_on(world.engine.create_rental(
        &account("renter"),
        TransportId::new(1),
        RateType::Minutes,
    ))
    .unwrap();

    let result = block_on(world.engine.create_rental(
        &account("other"),
        TransportId::new(1),
        RateType::Minutes,
    ));

    assert!(matches!(result, Err(Error::AlreadyRented { .. })));
}

#[test]
fn owner_should_not_rent_own_transport() {
    let world = world();

    let result = block_on(world.engine.create_rental(
        &account("owner"),
        TransportId::new(1),
        RateType::Minutes,
    ));

    assert!(matches!(result, Err(Error::OwnerCannotRent { .. })));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Precondition);
}

#[test]
fn minute_rental_of_day_rate_transport_should_fail() {
    let world = world();
    let mut day_only = transport(2, "owner");
    day_only.minute_rate = None;
    day_only.day_rate = Some(Decimal::from(300));
    world.store.add_transport(day_only);

    let minutes = block_on(world.engine.create_rental(
        &account("renter"),
        TransportId::new(2),
        RateType::Minutes,
    ));
    let days = block_on(world.engine.create_rental(
        &account("renter"),
        TransportId::new(2),
        RateType::Days,
    ));

    assert!(matches!(
        minutes,
        Err(Error::RateNotConfigured { rate_type: RateType::Minutes, .. })
    ));
    assert_eq!(days.unwrap().rate_unit, Decimal::from(300));
}

#[test]
fn day_rental_should_bill_pro_rata_hours() {
    let world = world();
    let mut day_only = transport(3, "owner");
    day_only.day_rate = Some(Decimal::from(100));
    world.store.add_transport(day_only);

    let rental = block_on(world.engine.create_rental(
        &account("renter"),
        TransportId::new(3),
        RateType::Days,
    ))
    .unwrap();
    world.clock.advance(TimeDelta::hours(36));
    let ending = block_on(world.engine.end_rental(rental.id)).unwrap();

    assert_eq!(ending.rental().fare, Some(Decimal::from(150)));
}

#[test]
fn concurrent_creates_should_admit_exactly_one() {
    let world = world();
    let contenders = 8;
    for index in 0..contenders {
        world.store.add_account(
            Account::new(account(&format!("rider_{index}")), "hash", Decimal::from(50)),
            RoleSet::for_account(false),
        );
    }

    let barrier = Arc::new(Barrier::new(contenders));
    let handles: Vec<_> = (0..contenders)
        .map(|index| {
            let engine = Arc::clone(&world.engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let rider = account(&format!("rider_{index}"));
                barrier.wait();
                block_on(engine.create_rental(&rider, TransportId::new(1), RateType::Minutes))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    let created = results.iter().filter(|result| result.is_ok()).count();
    let refused = results
        .iter()
        .filter(|result| matches!(result, Err(Error::AlreadyRented { .. })))
        .count();

    assert_eq!(created, 1);
    assert_eq!(refused, contenders - 1);
    let rentals =
        block_on(world.engine.rentals_for_transport(TransportId::new(1), Page::first(50))).unwrap();
    assert_eq!(rentals.len(), 1);
}

#[test]
fn concurrent_settlements_should_charge_once() {
    let world = world();
    let renter = account("renter");
    let rental = block_on(world.engine.create_rental(
        &renter,
        TransportId::new(1),
        RateType::Minutes,
    ))
    .unwrap();
    world.clock.advance(TimeDelta::minutes(10));

    let billing = Arc::new(world.billing);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let billing = Arc::clone(&billing);
            let renter = renter.clone();
            thread::spawn(move || block_on(billing.settle(&renter, rental.id)).unwrap())
        })
        .collect();
    let charged = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|settlement| settlement.charged())
        .count();

    assert_eq!(charged, 1);
    let after = block_on(world.store.account(&renter)).unwrap().unwrap();
    assert_eq!(after.balance, Decimal::from(80));
}

#[test]
fn directory_changes_should_reach_role_cache() {
    let world = world();
    let directory = Directory::new(world.store.clone(), Arc::clone(&world.cache));
    let gate = Gate::new(Arc::clone(&world.cache));

    block_on(directory.register(
        Account::new(account("newcomer"), "hash", Decimal::ZERO),
        false,
    ))
    .unwrap();
    assert_eq!(
        world.cache.get_roles(&account("newcomer")).unwrap(),
        RoleSet::from(Role::user())
    );

    block_on(directory.set_admin(&account("newcomer"), true)).unwrap();
    assert!(gate.is_admin(&account("newcomer")).unwrap());

    block_on(directory.rename(&account("newcomer"), account("veteran"))).unwrap();
    assert!(gate.is_admin(&account("veteran")).unwrap());
    assert_eq!(
        world.cache.get_roles(&account("newcomer")).unwrap_err().kind(),
        ErrorKind::Consistency
    );
}

#[test]
fn bonus_should_lift_negative_balance() {
    let world = world();
    world.store.add_account(
        Account::new(account("debtor"), "hash", Decimal::from(-40)),
        RoleSet::for_account(false),
    );
    world.cache.append_role(&account("debtor"), Role::user());

    let refused = block_on(world.engine.create_rental(
        &account("debtor"),
        TransportId::new(1),
        RateType::Minutes,
    ));
    assert!(matches!(refused, Err(Error::NegativeBalance { .. })));

    let balance = block_on(
        world
            .billing
            .grant_bonus(&account("admin"), &account("debtor")),
    )
    .unwrap();
    assert_eq!(balance, Decimal::from(249_960));

    assert!(
        block_on(world.engine.create_rental(
            &account("debtor"),
            TransportId::new(1),
            RateType::Minutes,
        ))
        .is_ok()
    );
}
