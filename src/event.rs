// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Observe changes made through a tracker.
//!
//! Every entity and every collection owns its own registry of listeners. Listeners are plain
//! closures subscribed for one kind of event with `on` and removed again with `off`. They are
//! invoked synchronously, in subscription order, while the operation that raised the event is
//! still running.
//!
//! The one event that can influence the operation is [`EntityEvent::Changing`]: it is raised
//! before a property write and a listener may [`cancel`](Changing::cancel) the write.
use crate::{CollectionId, EntityId, Status, Value};
use smallvec::SmallVec;
use std::{cell::Cell, fmt};

/// Identifies a subscribed listener, for use with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// The kinds of [`EntityEvent`] a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEventKind {
    Changing,
    Change,
    Modify,
    Reset,
    Apply,
    Delete,
    SubChange,
}

/// An event raised by an entity.
#[derive(Debug)]
pub enum EntityEvent {
    /// A property is about to be written. Can be vetoed.
    Changing(Changing),

    /// A property was written.
    Change {
        property: String,
        old_value: Option<Value>,
        new_value: Value,
    },

    /// The entity went from [`Status::Original`] to [`Status::Modified`].
    ///
    /// Raised exactly once per such transition.
    Modify,

    /// The entity was rolled back, or all of its changes were reverted by hand.
    Reset { old_status: Status },

    /// The entity was committed.
    Apply { old_status: Status },

    /// The entity was deleted.
    ///
    /// A `New` entity is rolled back to non-existence instead (its status becomes
    /// [`Status::Invalid`]); `old_status` tells the two cases apart.
    Delete { old_status: Status },

    /// Something happened in a nested collection of the entity (deep mode only).
    SubChange {
        property: String,
        event: CollectionEventKind,
        item: Option<EntityId>,
        index: Option<usize>,
    },
}

impl EntityEvent {
    pub fn kind(&self) -> EntityEventKind {
        match self {
            EntityEvent::Changing(_) => EntityEventKind::Changing,
            EntityEvent::Change { .. } => EntityEventKind::Change,
            EntityEvent::Modify => EntityEventKind::Modify,
            EntityEvent::Reset { .. } => EntityEventKind::Reset,
            EntityEvent::Apply { .. } => EntityEventKind::Apply,
            EntityEvent::Delete { .. } => EntityEventKind::Delete,
            EntityEvent::SubChange { .. } => EntityEventKind::SubChange,
        }
    }
}

/// A pending property write, see [`EntityEvent::Changing`].
pub struct Changing {
    pub property: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
    canceled: Cell<bool>,
}

impl Changing {
    pub(crate) fn new(property: String, old_value: Option<Value>, new_value: Value) -> Self {
        Self {
            property,
            old_value,
            new_value,
            canceled: Cell::new(false),
        }
    }

    /// Vetoes the write. The entity is left exactly as it was.
    pub fn cancel(&self) {
        self.canceled.set(true);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.get()
    }
}

impl fmt::Debug for Changing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Changing")
            .field("property", &self.property)
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// The kinds of [`CollectionEvent`] a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionEventKind {
    Add,
    Delete,
    Change,
    Apply,
    Reset,
    Clean,
    Load,
}

/// An event raised by a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    /// An item entered the view, either newly added or restored by a rollback.
    Add { item: EntityId, index: usize },
    /// An item left the view.
    Delete { item: EntityId, index: usize },
    /// A live item changed.
    Change { item: EntityId, index: usize },
    /// The whole collection was committed.
    Apply,
    /// The whole collection was rolled back.
    Reset,
    /// Every item was deleted at once.
    Clean,
    /// The collection was reloaded from scratch.
    Load,
}

impl CollectionEvent {
    pub fn kind(&self) -> CollectionEventKind {
        match self {
            CollectionEvent::Add { .. } => CollectionEventKind::Add,
            CollectionEvent::Delete { .. } => CollectionEventKind::Delete,
            CollectionEvent::Change { .. } => CollectionEventKind::Change,
            CollectionEvent::Apply => CollectionEventKind::Apply,
            CollectionEvent::Reset => CollectionEventKind::Reset,
            CollectionEvent::Clean => CollectionEventKind::Clean,
            CollectionEvent::Load => CollectionEventKind::Load,
        }
    }

    /// The item and its index, for events that concern a single item.
    pub fn item(&self) -> Option<(EntityId, usize)> {
        match *self {
            CollectionEvent::Add { item, index }
            | CollectionEvent::Delete { item, index }
            | CollectionEvent::Change { item, index } => Some((item, index)),
            _ => None,
        }
    }
}

pub(crate) type EntityListener = dyn FnMut(EntityId, &EntityEvent);
pub(crate) type CollectionListener = dyn FnMut(CollectionId, &CollectionEvent);

/// An ordered registry of listeners, keyed by event kind.
pub(crate) struct Listeners<K, F: ?Sized> {
    entries: SmallVec<[(ListenerId, K, Box<F>); 2]>,
}

impl<K, F: ?Sized> Default for Listeners<K, F> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<K, F> Listeners<K, F>
where
    K: Copy + Eq,
    F: ?Sized,
{
    pub(crate) fn add(&mut self, id: ListenerId, kind: K, listener: Box<F>) {
        self.entries.push((id, kind, listener));
    }

    /// Removes the listener `id`, or every listener of `kind` if `id` is `None`.
    ///
    /// Returns how many listeners were removed.
    pub(crate) fn remove(&mut self, kind: K, id: Option<ListenerId>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(lid, k, _)| *k != kind || id.is_some_and(|id| id != *lid));
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn of_kind(&mut self, kind: K) -> impl Iterator<Item = &mut Box<F>> {
        self.entries
            .iter_mut()
            .filter(move |(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
