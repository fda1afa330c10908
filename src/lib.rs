// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # uowtrack: unit-of-work change tracking for records
//!
//! This crate keeps track of what happened to a plain data record, or to an ordered list of
//! records, since it was loaded: which properties changed and what their previous values were,
//! which items were added or deleted, and in which order the list originally was. On top of
//! that bookkeeping it offers two operations that close a unit of work:
//!
//! - **apply** (commit): the current state becomes the new baseline.
//! - **reset** (rollback): everything returns to the baseline, including the original order of
//!   a list.
//!
//! In between, a structured report of all pending changes ([`Metadata`]) can be produced, for
//! example to build the requests a persistence layer needs to send.
//!
//! ## Core Concepts
//!
//! - An **entity** tracks one record. It has a lifecycle [`Status`]: `New`, `Original`,
//!   `Modified`, `Deleted` or `Invalid`. Writes go through [`EntityMut::set`], which records the
//!   baseline value of every touched property. Writing a property back to its baseline value
//!   makes the entity `Original` again.
//! - A **collection** tracks an ordered list of entities. Items are inserted with
//!   [`CollectionMut::add`] and removed with [`CollectionMut::delete`]; a deleted item stays
//!   around as a pending deletion until the collection is committed.
//! - In **deep** mode (the default), properties holding a record or an array of records are
//!   tracked recursively as nested collections. A change anywhere below an entity makes the
//!   entity `Modified`.
//! - Every entity and collection publishes **events** to listeners subscribed with `on`. A
//!   listener of [`EntityEvent::Changing`] can veto a write.
//!
//! All trackers live in a [`UnitOfWork`] arena and are addressed through copyable handles
//! ([`EntityId`], [`CollectionId`]). For the common case of a single root, [`EntityTracker`]
//! and [`CollectionTracker`] own their arena.
//!
//! ## Getting Started
//!
//! ```rust
//! use uowtrack::{CollectionTracker, Status, record, records};
//!
//! let mut people = CollectionTracker::new(records![
//!     { "name" => "Alice", "age" => 8 },
//!     { "name" => "Bob", "age" => 7 },
//!     { "name" => "Carol", "age" => 9 }
//! ]);
//!
//! // Modify Alice, delete Bob and add Dave.
//! people.entity(0)?.set("age", 9)?;
//! people.delete(1usize)?;
//! people.push(record! { "name" => "Dave", "age" => 6 })?;
//!
//! let metadata = people.metadata();
//! assert_eq!(metadata.added.len(), 1);
//! assert_eq!(metadata.modified.len(), 1);
//! assert_eq!(metadata.deleted.len(), 1);
//! assert_eq!(metadata.original.len(), 1);
//!
//! // Roll everything back: Bob returns to his place, Dave is gone.
//! people.reset()?;
//! let names: Vec<_> = people
//!     .records()
//!     .into_iter()
//!     .map(|person| person["name"].clone())
//!     .collect();
//! assert_eq!(names, ["Alice", "Bob", "Carol"]);
//! assert_eq!(people.uow().status(people[0])?, Status::Original);
//! # Ok::<(), uowtrack::TrackError>(())
//! ```
//!
//! ## Threading
//!
//! Tracking is synchronous and single-threaded. Listeners run while the operation that raised
//! the event is in progress and cannot access the unit of work.
//!
//! ## Features
//!
//! - `json`: Conversions between values and reports and `serde_json::Value`. This feature is
//!   enabled by default.
//! - `serde`: Provides `serde` support for values, statuses, handles and reports.
//! - `chrono`: Enables the [`Value::Timestamp`] variant. This feature is enabled by default.
//!
//! ## Logging
//!
//! Lifecycle transitions and bulk operations are logged at `debug` level, property writes and
//! event dispatch at `trace` level, through [`tracing`](https://docs.rs/tracing).
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::collections::HashMap;

// Use a constant seed for hashing to make performance benchmarks have less variance.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

fn create_map<K, V>() -> HashMap<K, V, RandomState> {
    HashMap::with_hasher(DETERMINISTIC_HASHER)
}

mod collection;
pub use collection::{CollectionMut, Target};
mod entity;
pub use entity::{EntityMut, Field, Status, WriteOutcome};
mod error;
pub use error::TrackError;
pub mod event;
pub use event::{
    Changing, CollectionEvent, CollectionEventKind, EntityEvent, EntityEventKind, ListenerId,
};
#[cfg(feature = "json")]
mod json;
/// Macros usable for tests and initialization
pub mod macros;
pub mod metadata;
pub use metadata::{Changes, ItemReport, Metadata, PropertyChange};
mod tracker;
pub use tracker::{CollectionTracker, EntityTracker, Tracked, track, track_with};
mod uow;
pub use uow::{CollectionId, EntityId, TrackOptions, UnitOfWork};
mod value;
pub use value::{Record, Shape, Value};

// re-export for the `Value::Timestamp` variant
#[cfg(feature = "chrono")]
pub use chrono;
