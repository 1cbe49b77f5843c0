#![cfg(feature = "memory-store")]

use chrono::{TimeDelta, TimeZone, Utc};
use futures::executor::block_on;
use rs_rental::{
    Account, AccountId, Location, MemoryRoleCache, MemoryStore, RateType, RentalEngineBuilder,
    RentalId, Role, RoleCache, RoleSet, RoleSnapshot, Transport, TransportId, TransportKind,
    compute_fare,
};
use rust_decimal::Decimal;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

const REPEATS: usize = 5;
const ACCOUNTS: usize = 4_096;

fn benchmark_sync<F>(name: &str, iterations: usize, mut op: F)
where
    F: FnMut(),
{
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        for _ in 0..iterations {
            op();
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / iterations as f64;
    let ops_per_sec = iterations as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (iters={iterations}, repeats={REPEATS})"
    );
}

fn benchmark_parallel<F>(name: &str, threads: usize, iterations_per_thread: usize, op_factory: F)
where
    F: Fn(usize) -> Box<dyn FnMut() + Send> + Send + Sync + 'static,
{
    let op_factory = Arc::new(op_factory);
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        let mut joins = Vec::with_capacity(threads);
        for thread in 0..threads {
            let factory = Arc::clone(&op_factory);
            joins.push(std::thread::spawn(move || {
                let mut op = factory(thread);
                for _ in 0..iterations_per_thread {
                    op();
                }
            }));
        }
        for join in joins {
            join.join().expect("thread panicked");
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ops = threads * iterations_per_thread;
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / total_ops as f64;
    let ops_per_sec = total_ops as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (threads={threads}, total_ops={total_ops}, repeats={REPEATS})"
    );
}

fn account_id(index: usize) -> AccountId {
    AccountId::try_from(format!("account_{index}").as_str()).unwrap()
}

fn populated_cache() -> Arc<MemoryRoleCache> {
    let snapshot: RoleSnapshot = (0..ACCOUNTS)
        .map(|index| (account_id(index), RoleSet::for_account(index % 16 == 0)))
        .collect();
    Arc::new(MemoryRoleCache::from(snapshot))
}

fn rental_store(transports: u64) -> MemoryStore {
    let store = MemoryStore::new();
    store.add_account(
        Account::new(AccountId::try_from("owner").unwrap(), "hash", Decimal::ZERO),
        RoleSet::for_account(false),
    );
    store.add_account(
        Account::new(AccountId::try_from("renter").unwrap(), "hash", Decimal::from(1_000)),
        RoleSet::for_account(false),
    );
    for id in 0..transports {
        store.add_transport(Transport {
            id: TransportId::new(id),
            owner: AccountId::try_from("owner").unwrap(),
            kind: TransportKind::Bike,
            rentable: true,
            location: Location::default(),
            minute_rate: Some(Decimal::new(25, 1)),
            day_rate: Some(Decimal::from(90)),
            removed: false,
        });
    }
    store
}

#[test]
#[ignore = "manual performance test; run with --ignored --nocapture"]
fn perf_role_cache_and_rentals() {
    let iterations = 200_000;

    let cache = populated_cache();
    let hot = account_id(7);
    benchmark_sync("role_cache_get_hot_key", iterations, || {
        let roles = cache.get_roles(&hot).unwrap();
        black_box(roles);
    });

    benchmark_sync("role_cache_append_existing", iterations, || {
        cache.append_role(&hot, Role::user());
    });

    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();
    let end = start + TimeDelta::minutes(137);
    benchmark_sync("compute_fare_minutes", iterations, || {
        let fare = compute_fare(
            RentalId::new(1),
            RateType::Minutes,
            Decimal::new(25, 1),
            start,
            end,
        )
        .unwrap();
        black_box(fare);
    });

    let engine = RentalEngineBuilder::new(rental_store(1)).build();
    let renter = AccountId::try_from("renter").unwrap();
    benchmark_sync("rental_create_and_end", iterations / 10, || {
        let rental =
            block_on(engine.create_rental(&renter, TransportId::new(0), RateType::Minutes))
                .unwrap();
        let ending = block_on(engine.end_rental(rental.id)).unwrap();
        black_box(ending);
    });

    let threads = std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4);
    let iterations_per_thread = 50_000;

    let shared = Arc::clone(&cache);
    benchmark_parallel(
        "role_cache_get_spread_keys_parallel",
        threads,
        iterations_per_thread,
        move |thread| {
            let cache = Arc::clone(&shared);
            let mut index = thread;
            Box::new(move || {
                index = (index + 31) % ACCOUNTS;
                let roles = cache.get_roles(&account_id(index)).unwrap();
                black_box(roles);
            })
        },
    );

    let shared = Arc::clone(&cache);
    benchmark_parallel(
        "role_cache_get_same_key_parallel",
        threads,
        iterations_per_thread,
        move |_| {
            let cache = Arc::clone(&shared);
            let key = account_id(0);
            Box::new(move || {
                let roles = cache.get_roles(&key).unwrap();
                black_box(roles);
            })
        },
    );

    assert_eq!(cache.len(), ACCOUNTS);
}
