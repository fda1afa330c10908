// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The arena that owns every tracker.
//!
//! Entities and collections refer to each other in both directions (an item knows its
//! collection, a nested collection knows the entity and property it belongs to). Instead of
//! shared pointers, every tracker node lives in a [`UnitOfWork`] and is addressed by a small
//! copyable handle. Handles stay valid for the lifetime of the unit of work; a discarded entity
//! is kept around in [`Status::Invalid`] so that stale handles are reported as such.
use crate::{
    CollectionEvent, EntityEvent, ListenerId, Record, Shape, Status, TrackError, Value,
    collection::{CollectionMut, CollectionNode},
    entity::{Detail, EntityMut, EntityNode},
};
use std::fmt;
use tracing::trace;

/// Handle of an entity tracker inside a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct EntityId(pub(crate) usize);

/// Handle of a collection tracker inside a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct CollectionId(pub(crate) usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Runtime configuration of a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOptions {
    /// Track nested records and arrays of records recursively.
    ///
    /// When disabled, nested values are opaque: they are compared and replaced as a whole.
    pub deep: bool,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self { deep: true }
    }
}

impl TrackOptions {
    pub fn shallow() -> Self {
        Self { deep: false }
    }
}

/// Owns every entity and collection tracker of one unit of work.
///
/// All access goes through borrowed views ([`EntityMut`], [`CollectionMut`]), which borrow the
/// unit of work exclusively. Only one view can be alive at a time, so every mutation passes
/// through the tracker.
///
/// ```
/// # use uowtrack::{UnitOfWork, Status, record};
/// let mut uow = UnitOfWork::new();
/// let alice = uow.track(record! { "name" => "Alice", "age" => 8 });
///
/// let mut entity = uow.entity(alice)?;
/// entity.set("age", 9)?;
/// assert_eq!(entity.status(), Status::Modified);
/// entity.reset()?;
/// assert_eq!(entity.value("age"), Some(&8.into()));
/// # Ok::<(), uowtrack::TrackError>(())
/// ```
pub struct UnitOfWork {
    pub(crate) entities: Vec<EntityNode>,
    pub(crate) collections: Vec<CollectionNode>,
    options: TrackOptions,
    next_listener: u64,
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::with_options(TrackOptions::default())
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("entities", &self.entities.len())
            .field("collections", &self.collections.len())
            .field("options", &self.options)
            .finish()
    }
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TrackOptions) -> Self {
        Self {
            entities: Vec::new(),
            collections: Vec::new(),
            options,
            next_listener: 0,
        }
    }

    pub fn options(&self) -> TrackOptions {
        self.options
    }

    /// Starts tracking an existing record. The entity starts out [`Status::Original`].
    pub fn track(&mut self, record: Record) -> EntityId {
        self.insert_entity(record, Status::Original, None)
    }

    /// Starts tracking a record that does not exist yet. The entity starts out [`Status::New`].
    ///
    /// A new entity can later be inserted into a collection with
    /// [`CollectionMut::attach`].
    pub fn track_new(&mut self, record: Record) -> EntityId {
        self.insert_entity(record, Status::New, None)
    }

    /// Starts tracking an ordered collection of existing records.
    pub fn track_list(&mut self, records: Vec<Record>) -> CollectionId {
        self.insert_collection(records, Status::Original, None)
    }

    /// Borrows the entity `id`.
    pub fn entity(&mut self, id: EntityId) -> Result<EntityMut<'_>, TrackError> {
        self.node(id)?;
        Ok(EntityMut::new(self, id))
    }

    /// Borrows the collection `id`.
    pub fn collection(&mut self, id: CollectionId) -> Result<CollectionMut<'_>, TrackError> {
        self.coll(id)?;
        Ok(CollectionMut::new(self, id))
    }

    pub fn status(&self, id: EntityId) -> Result<Status, TrackError> {
        Ok(self.node(id)?.status)
    }

    /// The collection the entity is an item of, if any.
    pub fn owner(&self, id: EntityId) -> Result<Option<CollectionId>, TrackError> {
        Ok(self.node(id)?.owner)
    }

    /// The entity and property a nested collection belongs to, if any.
    pub fn parent(&self, id: CollectionId) -> Result<Option<(EntityId, &str)>, TrackError> {
        Ok(self
            .coll(id)?
            .parent
            .as_ref()
            .map(|(entity, property)| (*entity, property.as_str())))
    }

    /// A plain snapshot of the entity's current data, with nested values reassembled.
    pub fn record(&self, id: EntityId) -> Result<Record, TrackError> {
        self.node(id)?;
        Ok(self.snapshot(id))
    }

    pub(crate) fn node(&self, id: EntityId) -> Result<&EntityNode, TrackError> {
        self.entities.get(id.0).ok_or(TrackError::UnknownEntity(id))
    }

    pub(crate) fn coll(&self, id: CollectionId) -> Result<&CollectionNode, TrackError> {
        self.collections
            .get(id.0)
            .ok_or(TrackError::UnknownCollection(id))
    }

    pub(crate) fn next_listener_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }

    /// Creates the entity node for `record`.
    ///
    /// In deep mode, every trackable property is moved out of the record into a nested
    /// collection of its own. Its items share the entity's status, so the nested records of a
    /// new entity are new as well.
    pub(crate) fn insert_entity(
        &mut self,
        record: Record,
        status: Status,
        owner: Option<CollectionId>,
    ) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(EntityNode::new(status, owner));

        let mut source = Record::new();
        let mut details = std::collections::BTreeMap::new();
        for (property, value) in record {
            let shape = value.shape();
            if !self.options.deep || shape == Shape::Opaque {
                source.insert(property, value);
                continue;
            }
            let records = match value {
                Value::Record(child) => vec![child],
                other => other.into_records().unwrap_or_default(),
            };
            let detail = self.insert_collection(records, status, Some((id, property.clone())));
            let detail = match shape {
                Shape::Record => Detail::Single(detail),
                _ => Detail::Multi(detail),
            };
            details.insert(property, detail);
        }

        let node = &mut self.entities[id.0];
        node.source = source;
        node.details = details;
        trace!(entity = %id, ?status, "tracking entity");
        id
    }

    pub(crate) fn insert_collection(
        &mut self,
        records: Vec<Record>,
        status: Status,
        parent: Option<(EntityId, String)>,
    ) -> CollectionId {
        let id = CollectionId(self.collections.len());
        self.collections.push(CollectionNode::new(parent));
        let items: Vec<EntityId> = records
            .into_iter()
            .map(|record| self.insert_entity(record, status, Some(id)))
            .collect();
        let node = &mut self.collections[id.0];
        node.rebase(items);
        if status == Status::New {
            // nothing is committed yet
            node.baseline.clear();
            node.added = node.view.len();
        }
        trace!(collection = %id, "tracking collection");
        id
    }

    /// Delivers an entity event to the entity's listeners, then to its owning collection.
    pub(crate) fn notify(&mut self, id: EntityId, event: &EntityEvent) {
        let node = &mut self.entities[id.0];
        for listener in node.listeners.of_kind(event.kind()) {
            listener(id, event);
        }
        let owner = node.owner;
        if let Some(owner) = owner {
            self.on_item_event(owner, id, event);
        }
    }

    /// Delivers a collection event to the collection's listeners, then to its parent entity.
    pub(crate) fn emit(&mut self, id: CollectionId, event: CollectionEvent) {
        let node = &mut self.collections[id.0];
        for listener in node.listeners.of_kind(event.kind()) {
            listener(id, &event);
        }
        if let Some((parent, property)) = node.parent.clone() {
            self.on_detail_event(parent, &property, id, &event);
        }
    }
}
