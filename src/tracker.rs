// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Self-contained trackers for the common case of a single root.
//!
//! [`EntityTracker`] and [`CollectionTracker`] own their [`UnitOfWork`] and forward to the
//! borrowed views, so that a lone record or list can be tracked without handling handles.
use crate::{
    CollectionEvent, CollectionEventKind, CollectionId, EntityEvent, EntityEventKind, EntityId,
    ListenerId, Record, Shape, Status, TrackError, TrackOptions, UnitOfWork, Value,
    collection::{CollectionMut, Target},
    entity::{EntityMut, Field, WriteOutcome},
    metadata::{Changes, Metadata},
};
use std::ops::Index;

/// Tracks a single record.
///
/// ```
/// # use uowtrack::{EntityTracker, Status, record};
/// let mut person = EntityTracker::original(record! { "name" => "Alice", "age" => 8 });
/// person.set("age", 9)?;
/// assert_eq!(person.status(), Status::Modified);
/// assert_eq!(person.changes()?.len(), 1);
///
/// person.apply()?;
/// assert_eq!(person.status(), Status::Original);
/// # Ok::<(), uowtrack::TrackError>(())
/// ```
#[derive(Debug)]
pub struct EntityTracker {
    uow: UnitOfWork,
    id: EntityId,
}

impl EntityTracker {
    /// Tracks a record that does not exist yet ([`Status::New`]). Its nested records are new
    /// as well.
    pub fn new(record: Record) -> Self {
        Self::new_with(record, TrackOptions::default())
    }

    pub fn new_with(record: Record, options: TrackOptions) -> Self {
        let mut uow = UnitOfWork::with_options(options);
        let id = uow.track_new(record);
        Self { uow, id }
    }

    /// Tracks an existing record ([`Status::Original`]).
    pub fn original(record: Record) -> Self {
        Self::original_with(record, TrackOptions::default())
    }

    pub fn original_with(record: Record, options: TrackOptions) -> Self {
        let mut uow = UnitOfWork::with_options(options);
        let id = uow.track(record);
        Self { uow, id }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn uow(&self) -> &UnitOfWork {
        &self.uow
    }

    /// Gives access to the nested trackers.
    pub fn uow_mut(&mut self) -> &mut UnitOfWork {
        &mut self.uow
    }

    pub fn view(&mut self) -> EntityMut<'_> {
        EntityMut::new(&mut self.uow, self.id)
    }

    pub fn status(&self) -> Status {
        self.uow.entities[self.id.0].status
    }

    pub fn is_changed(&self) -> bool {
        self.status().is_changed()
    }

    pub fn get(&self, property: &str) -> Result<Option<Field<'_>>, TrackError> {
        self.uow.field(self.id, property)
    }

    pub fn value(&self, property: &str) -> Option<&Value> {
        self.uow.entities[self.id.0].source.get(property)
    }

    pub fn set(
        &mut self,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<WriteOutcome, TrackError> {
        self.view().set(property, value)
    }

    pub fn apply(&mut self) -> Result<(), TrackError> {
        self.view().apply()
    }

    pub fn reset(&mut self) -> Result<(), TrackError> {
        self.view().reset()
    }

    pub fn delete(&mut self) -> Result<(), TrackError> {
        self.view().delete()
    }

    pub fn changes(&self) -> Result<Changes, TrackError> {
        self.uow.entity_changes(self.id)
    }

    pub fn record(&self) -> Record {
        self.uow.snapshot(self.id)
    }

    pub fn detail(&mut self, property: &str) -> Result<CollectionMut<'_>, TrackError> {
        let detail = self.uow.checked_detail(self.id, property)?;
        Ok(CollectionMut::new(&mut self.uow, detail.collection()))
    }

    pub fn on(
        &mut self,
        kind: EntityEventKind,
        listener: impl FnMut(EntityId, &EntityEvent) + 'static,
    ) -> ListenerId {
        self.view().on(kind, listener)
    }

    pub fn off(&mut self, kind: EntityEventKind, id: Option<ListenerId>) -> usize {
        self.view().off(kind, id)
    }
}

/// Tracks an ordered list of records.
///
/// ```
/// # use uowtrack::{CollectionTracker, record, records};
/// let mut people = CollectionTracker::new(records![
///     { "name" => "Alice" },
///     { "name" => "Bob" }
/// ]);
/// people.push(record! { "name" => "Carol" })?;
/// people.delete(0usize)?;
///
/// let metadata = people.metadata();
/// assert_eq!(metadata.to_string(), "added=1 modified=0 deleted=1 original=1");
///
/// people.reset()?;
/// assert_eq!(people.count(), 2);
/// # Ok::<(), uowtrack::TrackError>(())
/// ```
#[derive(Debug)]
pub struct CollectionTracker {
    uow: UnitOfWork,
    id: CollectionId,
}

impl CollectionTracker {
    pub fn new(records: Vec<Record>) -> Self {
        Self::with_options(records, TrackOptions::default())
    }

    pub fn with_options(records: Vec<Record>, options: TrackOptions) -> Self {
        let mut uow = UnitOfWork::with_options(options);
        let id = uow.track_list(records);
        Self { uow, id }
    }

    pub fn id(&self) -> CollectionId {
        self.id
    }

    pub fn uow(&self) -> &UnitOfWork {
        &self.uow
    }

    /// Gives access to the item trackers.
    pub fn uow_mut(&mut self) -> &mut UnitOfWork {
        &mut self.uow
    }

    pub fn view(&mut self) -> CollectionMut<'_> {
        CollectionMut::new(&mut self.uow, self.id)
    }

    pub fn count(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn items(&self) -> &[EntityId] {
        &self.uow.collections[self.id.0].view
    }

    pub fn item(&self, index: usize) -> Option<EntityId> {
        self.items().get(index).copied()
    }

    /// Borrows the item at `index`.
    pub fn entity(&mut self, index: usize) -> Result<EntityMut<'_>, TrackError> {
        let id = self.item(index).ok_or(TrackError::OutOfRange {
            index,
            len: self.count(),
        })?;
        Ok(EntityMut::new(&mut self.uow, id))
    }

    pub fn added_count(&self) -> usize {
        self.uow.collections[self.id.0].added
    }

    pub fn deleted_count(&self) -> usize {
        self.uow.collections[self.id.0].deleted
    }

    pub fn modified_count(&self) -> usize {
        self.uow.collections[self.id.0].modified
    }

    pub fn is_changed(&self) -> bool {
        self.uow.collections[self.id.0].is_changed()
    }

    pub fn add(&mut self, record: Record, index: Option<usize>) -> Result<EntityId, TrackError> {
        self.view().add(record, index)
    }

    pub fn push(&mut self, record: Record) -> Result<EntityId, TrackError> {
        self.view().push(record)
    }

    pub fn extend(
        &mut self,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Vec<EntityId>, TrackError> {
        self.view().extend(records)
    }

    /// Creates a [`Status::New`] entity without inserting it; see [`CollectionTracker::attach`].
    pub fn track_new(&mut self, record: Record) -> EntityId {
        self.uow.track_new(record)
    }

    pub fn attach(&mut self, id: EntityId, index: Option<usize>) -> Result<(), TrackError> {
        self.view().attach(id, index)
    }

    pub fn delete(&mut self, target: impl Into<Target>) -> Result<EntityId, TrackError> {
        self.view().delete(target)
    }

    pub fn apply(&mut self) -> Result<(), TrackError> {
        self.view().apply()
    }

    pub fn apply_item(&mut self, target: impl Into<Target>) -> Result<EntityId, TrackError> {
        self.view().apply_item(target)
    }

    pub fn reset(&mut self) -> Result<(), TrackError> {
        self.view().reset()
    }

    pub fn reset_item(&mut self, target: impl Into<Target>) -> Result<EntityId, TrackError> {
        self.view().reset_item(target)
    }

    pub fn clean(&mut self) -> Result<(), TrackError> {
        self.view().clean()
    }

    pub fn load(&mut self, records: Vec<Record>) -> Result<(), TrackError> {
        self.view().load(records)
    }

    pub fn metadata(&self) -> Metadata {
        self.uow.collection_metadata(self.id)
    }

    pub fn records(&self) -> Vec<Record> {
        self.items().iter().map(|&id| self.uow.snapshot(id)).collect()
    }

    pub fn on(
        &mut self,
        kind: CollectionEventKind,
        listener: impl FnMut(CollectionId, &CollectionEvent) + 'static,
    ) -> ListenerId {
        self.view().on(kind, listener)
    }

    pub fn off(&mut self, kind: CollectionEventKind, id: Option<ListenerId>) -> usize {
        self.view().off(kind, id)
    }
}

/// Resolves a position to the item's handle.
///
/// There is no `IndexMut`: items are replaced through
/// [`CollectionTracker::add`] and [`CollectionTracker::delete`].
impl Index<usize> for CollectionTracker {
    type Output = EntityId;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items()[index]
    }
}

/// A tracker built by [`track`].
#[derive(Debug)]
pub enum Tracked {
    Entity(EntityTracker),
    Collection(CollectionTracker),
}

impl Tracked {
    pub fn into_entity(self) -> Option<EntityTracker> {
        match self {
            Tracked::Entity(tracker) => Some(tracker),
            Tracked::Collection(_) => None,
        }
    }

    pub fn into_collection(self) -> Option<CollectionTracker> {
        match self {
            Tracked::Collection(tracker) => Some(tracker),
            Tracked::Entity(_) => None,
        }
    }
}

/// Tracks an existing record or array of records, whichever `value` is.
///
/// ```
/// # use uowtrack::{track, Shape, TrackError, Value, records};
/// let people = track(records![{ "name" => "Alice" }].into())?;
/// assert_eq!(people.into_collection().map(|c| c.count()), Some(1));
///
/// assert_eq!(track(Value::from(1)).err(), Some(TrackError::NotTrackable(Shape::Opaque)));
/// # Ok::<(), TrackError>(())
/// ```
pub fn track(value: Value) -> Result<Tracked, TrackError> {
    track_with(value, TrackOptions::default())
}

pub fn track_with(value: Value, options: TrackOptions) -> Result<Tracked, TrackError> {
    match value.shape() {
        Shape::Opaque => Err(TrackError::NotTrackable(Shape::Opaque)),
        Shape::Record => {
            let record = value.as_record().cloned().unwrap_or_default();
            Ok(Tracked::Entity(EntityTracker::original_with(record, options)))
        }
        Shape::Records => {
            let records = value.into_records().unwrap_or_default();
            Ok(Tracked::Collection(CollectionTracker::with_options(
                records, options,
            )))
        }
    }
}
