use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use incdict::{DefaultType, Dict, EntryId};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled(seed: u64, n: usize) -> Dict<DefaultType<String, u64>> {
    let mut d = Dict::new();
    for (i, x) in lcg(seed).take(n).enumerate() {
        d.add(key(x), i as u64).unwrap();
    }
    d
}

fn bench_add_fresh_100k(c: &mut Criterion) {
    c.bench_function("dict::add_fresh_100k", |b| {
        b.iter_batched(
            Dict::<DefaultType<String, u64>>::new,
            |mut d| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    d.add(key(x), i as u64).unwrap();
                }
                black_box(d)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_add_presized_100k(c: &mut Criterion) {
    c.bench_function("dict::add_presized_100k", |b| {
        b.iter_batched(
            || {
                let mut d = Dict::<DefaultType<String, u64>>::new();
                d.expand(1 << 17).unwrap();
                d
            },
            |mut d| {
                for (i, x) in lcg(3).take(100_000).enumerate() {
                    d.add(key(x), i as u64).unwrap();
                }
                black_box(d)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_hit_100k(c: &mut Criterion) {
    let mut d = filled(5, 100_000);
    while d.rehash(1000) {}
    let keys: Vec<String> = lcg(5).take(100_000).map(key).collect();
    c.bench_function("dict::find_hit_100k", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for k in &keys {
                let id = d.find(k).unwrap();
                acc = acc.wrapping_add(*d.get(id).unwrap().val().unwrap());
            }
            black_box(acc)
        })
    });
}

fn bench_find_during_rehash(c: &mut Criterion) {
    let keys: Vec<String> = lcg(6).take(65_536).map(key).collect();
    c.bench_function("dict::find_during_rehash_64k", |b| {
        b.iter_batched(
            || {
                let mut d = filled(6, 65_536);
                while d.rehash(1000) {}
                d.expand(1 << 18).unwrap();
                d
            },
            |mut d| {
                for k in &keys {
                    black_box(d.find(k));
                }
                black_box(d)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_delete_10k_of_110k(c: &mut Criterion) {
    c.bench_function("dict::delete_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let d = filled(7, 110_000);
                let doomed: Vec<String> = lcg(7).step_by(11).take(10_000).map(key).collect();
                (d, doomed)
            },
            |(mut d, doomed)| {
                for k in &doomed {
                    d.delete(k).unwrap();
                }
                black_box(d)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_scan_full_100k(c: &mut Criterion) {
    let d = filled(8, 100_000);
    c.bench_function("dict::scan_full_100k", |b| {
        b.iter(|| {
            let mut n = 0usize;
            let mut cursor = 0;
            loop {
                cursor = d.scan(cursor, |_, _| n += 1);
                if cursor == 0 {
                    break;
                }
            }
            black_box(n)
        })
    });
}

fn bench_safe_iterate_100k(c: &mut Criterion) {
    let d = filled(9, 100_000);
    c.bench_function("dict::safe_iterate_100k", |b| {
        b.iter(|| {
            let mut it = d.safe_iterator();
            let mut last: Option<EntryId> = None;
            while let Some(id) = d.next_entry(&mut it) {
                last = Some(id);
            }
            d.release_iterator(it);
            black_box(last)
        })
    });
}

fn bench_random_keys(c: &mut Criterion) {
    let mut d = filled(10, 100_000);
    while d.rehash(1000) {}
    c.bench_function("dict::random_key_10k", |b| {
        b.iter(|| {
            for _ in 0..10_000 {
                black_box(d.random_key());
            }
        })
    });
    c.bench_function("dict::fair_random_key_10k", |b| {
        b.iter(|| {
            for _ in 0..10_000 {
                black_box(d.fair_random_key());
            }
        })
    });
}

fn config() -> Criterion {
    Criterion::default().measurement_time(Duration::from_secs(5))
}

criterion_group! {
    name = benches;
    config = config();
    targets =
        bench_add_fresh_100k,
        bench_add_presized_100k,
        bench_find_hit_100k,
        bench_find_during_rehash,
        bench_delete_10k_of_110k,
        bench_scan_full_100k,
        bench_safe_iterate_100k,
        bench_random_keys
}
criterion_main!(benches);
