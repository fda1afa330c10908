// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use std::hint::black_box;
use tango_bench::{IntoBenchmarks, benchmark_fn, tango_benchmarks, tango_main};
use uowtrack::{CollectionTracker, EntityTracker, Record, record};

fn people(n: u64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            record! {
                "id" => i,
                "name" => format!("person {i}"),
                "age" => i % 90,
            }
        })
        .collect()
}

fn nested_people(n: u64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            record! {
                "id" => i,
                "name" => format!("person {i}"),
                "friends" => people(4),
            }
        })
        .collect()
}

// Every benchmark builds its tracker from a clone of these records, so the tracking cost is
// included in every measurement; `collection::track` measures it on its own.
fn collection_benchmarks() -> impl IntoBenchmarks {
    let flat: &'static Vec<Record> = Box::leak(Box::new(people(255)));
    let nested: &'static Vec<Record> = Box::leak(Box::new(nested_people(64)));
    [
        benchmark_fn("collection::track", move |b| {
            b.iter(move || CollectionTracker::new(black_box(flat).clone()))
        }),
        benchmark_fn("collection::track_nested", move |b| {
            b.iter(move || CollectionTracker::new(black_box(nested).clone()))
        }),
        benchmark_fn("collection::unshift", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(flat).clone());
                list.add(record! { "name" => "new" }, Some(0))
            })
        }),
        benchmark_fn("collection::push", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(flat).clone());
                list.push(record! { "name" => "new" })
            })
        }),
        benchmark_fn("collection::delete", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(flat).clone());
                list.delete(128usize)
            })
        }),
        benchmark_fn("collection::update", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(flat).clone());
                list.entity(128).and_then(|mut item| item.set("age", 100))
            })
        }),
        benchmark_fn("collection::apply", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(flat).clone());
                for i in (0..list.count()).step_by(8) {
                    let _ = list.entity(i).and_then(|mut item| item.set("age", 100));
                }
                let _ = list.push(record! { "name" => "new" });
                let _ = list.delete(1usize);
                list.apply()
            })
        }),
        benchmark_fn("collection::reset", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(flat).clone());
                for i in (0..list.count()).step_by(8) {
                    let _ = list.entity(i).and_then(|mut item| item.set("age", 100));
                }
                let _ = list.push(record! { "name" => "new" });
                let _ = list.delete(1usize);
                list.reset()
            })
        }),
        benchmark_fn("collection::metadata", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(flat).clone());
                let _ = list.delete(1usize);
                list.metadata()
            })
        }),
        benchmark_fn("collection::nested_reset", move |b| {
            b.iter(move || {
                let mut list = CollectionTracker::new(black_box(nested).clone());
                for i in (0..list.count()).step_by(4) {
                    let _ = list.entity(i).and_then(|mut item| {
                        item.in_detail("friends", |friends| friends.delete(0usize))
                    });
                }
                list.reset()
            })
        }),
    ]
}

fn entity_benchmarks() -> impl IntoBenchmarks {
    let person: &'static Record = Box::leak(Box::new(record! {
        "name" => "Alice",
        "age" => 8,
        "friends" => people(16),
    }));
    [
        benchmark_fn("entity::write", move |b| {
            b.iter(move || {
                let mut entity = EntityTracker::original(black_box(person).clone());
                entity.set("age", 9)
            })
        }),
        benchmark_fn("entity::write_back", move |b| {
            b.iter(move || {
                let mut entity = EntityTracker::original(black_box(person).clone());
                let _ = entity.set("age", 9);
                entity.set("age", 8)
            })
        }),
        benchmark_fn("entity::delete", move |b| {
            b.iter(move || {
                let mut entity = EntityTracker::original(black_box(person).clone());
                entity.delete()
            })
        }),
        benchmark_fn("entity::changes", move |b| {
            b.iter(move || {
                let mut entity = EntityTracker::original(black_box(person).clone());
                let _ = entity.set("age", 9);
                entity.changes()
            })
        }),
    ]
}

tango_benchmarks!(collection_benchmarks(), entity_benchmarks());
tango_main!();
