// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Tracking of a single record.
//!
//! Every tracked record is an entity with a lifecycle [`Status`]. Writes go through
//! [`EntityMut::set`], which keeps the baseline value of every touched property so that the
//! entity can be rolled back ([`EntityMut::reset`]) or committed ([`EntityMut::apply`]).
//!
//! ```text
//!             apply                      write
//!   New ─────────────────► Original ◄───────────► Modified
//!    │                      │   ▲   revert/reset     │
//!    │ reset/delete  delete │   │ reset              │ delete
//!    ▼                      ▼   │                    │
//!  Invalid ◄──────────── Deleted ◄───────────────────┘
//!             apply
//! ```
//!
//! In deep mode, properties holding a record or an array of records are tracked recursively:
//! each one is wrapped into a nested collection (a *detail*) whose items are entities of their
//! own. A change inside a detail makes the parent [`Status::Modified`]; committing, rolling back
//! or deleting the parent cascades into its details.
use crate::{
    CollectionEvent, CollectionId, EntityEvent, EntityEventKind, EntityId, ListenerId, Record,
    Shape, TrackError, UnitOfWork, Value,
    collection::CollectionMut,
    event::{Changing, EntityListener, Listeners},
    metadata::{Changes, PropertyChange},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};
use tracing::{debug, trace, warn};

/// The lifecycle state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Status {
    /// Created since the last commit; rolling back discards it.
    New,
    /// Equal to its baseline.
    Original,
    /// At least one property (or nested collection) differs from the baseline.
    Modified,
    /// Marked for deletion; committing discards it, rolling back restores it.
    Deleted,
    /// Discarded. No further mutation is possible.
    Invalid,
}

impl Status {
    /// Returns `true` if committing would change anything.
    pub fn is_changed(self) -> bool {
        matches!(self, Status::New | Status::Modified | Status::Deleted)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::New => "new",
            Status::Original => "original",
            Status::Modified => "modified",
            Status::Deleted => "deleted",
            Status::Invalid => "invalid",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detail {
    /// A nested record, kept in a collection with at most one live item.
    Single(CollectionId),
    /// A nested array of records.
    Multi(CollectionId),
}

impl Detail {
    pub(crate) fn collection(self) -> CollectionId {
        match self {
            Detail::Single(id) | Detail::Multi(id) => id,
        }
    }
}

pub(crate) struct EntityNode {
    pub(crate) status: Status,
    /// Current values of the opaque properties.
    pub(crate) source: Record,
    /// Baseline values of the touched properties. `None` if the property did not exist.
    pub(crate) diff: BTreeMap<String, Option<Value>>,
    pub(crate) details: BTreeMap<String, Detail>,
    /// Details whose collection currently reports changes.
    pub(crate) dirty_details: BTreeSet<String>,
    pub(crate) owner: Option<CollectionId>,
    /// Set while the entity cascades an operation into its own details.
    pub(crate) busy: bool,
    pub(crate) listeners: Listeners<EntityEventKind, EntityListener>,
}

impl EntityNode {
    pub(crate) fn new(status: Status, owner: Option<CollectionId>) -> Self {
        Self {
            status,
            source: Record::new(),
            diff: BTreeMap::new(),
            details: BTreeMap::new(),
            dirty_details: BTreeSet::new(),
            owner,
            busy: false,
            listeners: Listeners::default(),
        }
    }

    fn is_clean(&self) -> bool {
        self.diff.is_empty() && self.dirty_details.is_empty()
    }

    /// Writes every diffed property back to its baseline value.
    fn restore_baseline(&mut self) {
        for (property, value) in std::mem::take(&mut self.diff) {
            match value {
                Some(value) => {
                    self.source.insert(property, value);
                }
                None => {
                    self.source.remove(&property);
                }
            }
        }
    }
}

/// What a property of an entity holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// An opaque value.
    Value(&'a Value),
    /// A nested record, tracked as an entity of its own.
    Entity(EntityId),
    /// A nested array of records, tracked as a collection.
    Collection(CollectionId),
}

impl<'a> Field<'a> {
    pub fn as_value(&self) -> Option<&'a Value> {
        match *self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// The result of a successful [`EntityMut::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The property already held the value; nothing happened.
    Unchanged,
    /// A [`Changing`] listener canceled the write.
    Vetoed,
}

impl UnitOfWork {
    fn live_status(&self, id: EntityId, operation: &'static str) -> Result<Status, TrackError> {
        let status = self.node(id)?.status;
        if status == Status::Invalid {
            return Err(TrackError::InvalidState { status, operation });
        }
        Ok(status)
    }

    pub(crate) fn field(&self, id: EntityId, property: &str) -> Result<Option<Field<'_>>, TrackError> {
        let node = self.node(id)?;
        if let Some(value) = node.source.get(property) {
            return Ok(Some(Field::Value(value)));
        }
        if !node.details.contains_key(property) {
            return Ok(None);
        }
        Ok(match self.checked_detail(id, property)? {
            Detail::Single(c) => self.collections[c.0].view.first().copied().map(Field::Entity),
            Detail::Multi(c) => Some(Field::Collection(c)),
        })
    }

    /// Looks up the detail of `property`.
    ///
    /// A detail points back to its entity from creation on. A nested record never holds more
    /// than one live item, so finding more means the arena was changed behind the tracker.
    pub(crate) fn checked_detail(&self, id: EntityId, property: &str) -> Result<Detail, TrackError> {
        let node = self.node(id)?;
        let Some(&detail) = node.details.get(property) else {
            let shape = node.source.get(property).map_or(Shape::Opaque, Value::shape);
            return Err(TrackError::NotTrackable(shape));
        };
        let collection = &self.collections[detail.collection().0];
        if matches!(detail, Detail::Single(_)) && collection.view.len() > 1 {
            return Err(TrackError::ForeignMutation {
                property: property.to_owned(),
            });
        }
        Ok(detail)
    }

    pub(crate) fn set_property(
        &mut self,
        id: EntityId,
        property: &str,
        value: Value,
    ) -> Result<WriteOutcome, TrackError> {
        let node = self.node(id)?;
        if matches!(node.status, Status::Invalid | Status::Deleted) {
            return Err(TrackError::InvalidState {
                status: node.status,
                operation: "write",
            });
        }
        if node.details.contains_key(property) {
            return match self.checked_detail(id, property)? {
                Detail::Multi(_) => Err(TrackError::IllegalDirectWrite {
                    operation: "assigning an array of records",
                }),
                Detail::Single(detail) => self.replace_single(id, property, detail, value),
            };
        }

        let old_value = node.source.get(property);
        let from = old_value.map_or(Shape::Opaque, Value::shape);
        let to = value.shape();
        if from != to {
            return Err(TrackError::TypeShapeViolation {
                property: property.to_owned(),
                from,
                to,
            });
        }
        if old_value == Some(&value) {
            return Ok(WriteOutcome::Unchanged);
        }
        let old_value = old_value.cloned();
        if self.vetoed(id, property, &old_value, &value) {
            trace!(entity = %id, property, "write vetoed");
            return Ok(WriteOutcome::Vetoed);
        }

        let node = &mut self.entities[id.0];
        node.source.insert(property.to_owned(), value.clone());
        let old_status = node.status;
        if old_status != Status::New {
            let baseline = node
                .diff
                .entry(property.to_owned())
                .or_insert_with(|| old_value.clone());
            let reverted = baseline.as_ref() == Some(&value);
            if reverted {
                node.diff.remove(property);
            }
            node.status = if node.is_clean() {
                Status::Original
            } else {
                Status::Modified
            };
        }
        let new_status = node.status;
        trace!(entity = %id, property, "property written");

        self.notify(
            id,
            &EntityEvent::Change {
                property: property.to_owned(),
                old_value,
                new_value: value,
            },
        );
        self.announce_transition(id, old_status, new_status);
        Ok(WriteOutcome::Written)
    }

    /// Replaces the nested record of `property` by deleting the current item of its detail and
    /// adding the new one.
    fn replace_single(
        &mut self,
        id: EntityId,
        property: &str,
        detail: CollectionId,
        value: Value,
    ) -> Result<WriteOutcome, TrackError> {
        let record = match value {
            Value::Record(record) => record,
            other => {
                return Err(TrackError::TypeShapeViolation {
                    property: property.to_owned(),
                    from: Shape::Record,
                    to: other.shape(),
                });
            }
        };
        let current = self.collections[detail.0].view.first().copied();
        let old_value = current.map(|item| Value::Record(self.snapshot(item)));
        let new_value = Value::Record(record.clone());
        if old_value.as_ref() == Some(&new_value) {
            return Ok(WriteOutcome::Unchanged);
        }
        if self.vetoed(id, property, &old_value, &new_value) {
            trace!(entity = %id, property, "write vetoed");
            return Ok(WriteOutcome::Vetoed);
        }

        self.entities[id.0].busy = true;
        let swapped = self.swap_single(detail, current, record);
        self.entities[id.0].busy = false;
        swapped?;
        trace!(entity = %id, property, "nested record replaced");

        self.notify(
            id,
            &EntityEvent::Change {
                property: property.to_owned(),
                old_value,
                new_value,
            },
        );
        self.refresh_detail(id, property, detail);
        Ok(WriteOutcome::Written)
    }

    fn swap_single(
        &mut self,
        detail: CollectionId,
        current: Option<EntityId>,
        record: Record,
    ) -> Result<EntityId, TrackError> {
        if let Some(item) = current {
            self.delete_entity(item)?;
        }
        self.collection_add(detail, record, None)
    }

    /// Raises [`EntityEvent::Changing`] and reports whether a listener canceled the write.
    fn vetoed(
        &mut self,
        id: EntityId,
        property: &str,
        old_value: &Option<Value>,
        new_value: &Value,
    ) -> bool {
        let event = EntityEvent::Changing(Changing::new(
            property.to_owned(),
            old_value.clone(),
            new_value.clone(),
        ));
        self.notify(id, &event);
        matches!(&event, EntityEvent::Changing(changing) if changing.is_canceled())
    }

    fn announce_transition(&mut self, id: EntityId, from: Status, to: Status) {
        match (from, to) {
            (Status::Original, Status::Modified) => self.notify(id, &EntityEvent::Modify),
            (Status::Modified, Status::Original) => self.notify(
                id,
                &EntityEvent::Reset {
                    old_status: Status::Modified,
                },
            ),
            _ => {}
        }
    }

    /// Runs `op` on every detail of the entity while the entity ignores their events.
    fn cascade(
        &mut self,
        id: EntityId,
        mut op: impl FnMut(&mut Self, CollectionId) -> Result<(), TrackError>,
    ) -> Result<(), TrackError> {
        let details: Vec<CollectionId> = self.entities[id.0]
            .details
            .values()
            .map(|detail| detail.collection())
            .collect();
        self.entities[id.0].busy = true;
        let result = details.into_iter().try_for_each(|detail| op(self, detail));
        self.entities[id.0].busy = false;
        result
    }

    pub(crate) fn apply_entity(&mut self, id: EntityId) -> Result<(), TrackError> {
        let old_status = self.live_status(id, "apply")?;
        self.cascade(id, |uow, detail| uow.collection_apply(detail))?;

        let node = &mut self.entities[id.0];
        node.diff.clear();
        node.dirty_details.clear();
        node.status = match old_status {
            Status::Deleted => Status::Invalid,
            _ => Status::Original,
        };
        let status = node.status;
        debug!(entity = %id, %old_status, %status, "applied entity");

        self.notify(id, &EntityEvent::Apply { old_status });
        if status == Status::Invalid {
            self.detach(id);
        }
        Ok(())
    }

    pub(crate) fn reset_entity(&mut self, id: EntityId) -> Result<(), TrackError> {
        let old_status = self.live_status(id, "reset")?;
        if old_status == Status::Deleted {
            self.check_restore(id)?;
        }
        match old_status {
            // Invalid was rejected above.
            Status::Original | Status::Invalid => return Ok(()),
            Status::New => self.entities[id.0].status = Status::Invalid,
            Status::Modified | Status::Deleted => {
                self.cascade(id, |uow, detail| uow.collection_reset(detail))?;
                let node = &mut self.entities[id.0];
                node.restore_baseline();
                node.dirty_details.clear();
                node.status = Status::Original;
            }
        }
        debug!(entity = %id, %old_status, "reset entity");

        self.notify(id, &EntityEvent::Reset { old_status });
        if old_status == Status::New {
            self.detach(id);
        }
        Ok(())
    }

    pub(crate) fn delete_entity(&mut self, id: EntityId) -> Result<(), TrackError> {
        let old_status = self.node(id)?.status;
        match old_status {
            Status::Invalid | Status::Deleted => {
                return Err(TrackError::InvalidState {
                    status: old_status,
                    operation: "delete",
                });
            }
            Status::New => self.entities[id.0].status = Status::Invalid,
            Status::Original | Status::Modified => {
                self.entities[id.0].restore_baseline();
                self.cascade(id, |uow, detail| uow.collection_clean(detail))?;
                let node = &mut self.entities[id.0];
                node.dirty_details.clear();
                node.status = Status::Deleted;
            }
        }
        debug!(entity = %id, %old_status, "deleted entity");

        self.notify(id, &EntityEvent::Delete { old_status });
        if old_status == Status::New {
            self.detach(id);
        }
        Ok(())
    }

    /// Removes a discarded entity from its collection and drops its listeners.
    pub(crate) fn detach(&mut self, id: EntityId) {
        let node = &mut self.entities[id.0];
        node.listeners.clear();
        let owner = node.owner.take();
        if let Some(owner) = owner {
            self.collections[owner.0].forget(id);
        }
        trace!(entity = %id, "detached entity");
    }

    pub(crate) fn entity_changes(&self, id: EntityId) -> Result<Changes, TrackError> {
        self.live_status(id, "report changes of")?;
        Ok(self.changes_of(id))
    }

    pub(crate) fn changes_of(&self, id: EntityId) -> Changes {
        let node = &self.entities[id.0];
        let mut changes: Changes = if node.status == Status::New {
            node.source
                .iter()
                .map(|(property, value)| {
                    let change = PropertyChange::Value {
                        old_value: None,
                        new_value: Some(value.clone()),
                    };
                    (property.clone(), change)
                })
                .collect()
        } else {
            node.diff
                .iter()
                .map(|(property, old_value)| {
                    let change = PropertyChange::Value {
                        old_value: old_value.clone(),
                        new_value: node.source.get(property).cloned(),
                    };
                    (property.clone(), change)
                })
                .collect()
        };
        for (property, detail) in &node.details {
            let metadata = self.collection_metadata(detail.collection());
            changes.insert(property.clone(), PropertyChange::Detail(metadata));
        }
        changes
    }

    /// The entity's current data with its details reassembled.
    pub(crate) fn snapshot(&self, id: EntityId) -> Record {
        let node = &self.entities[id.0];
        let mut record = node.source.clone();
        for (property, detail) in &node.details {
            let view = &self.collections[detail.collection().0].view;
            let value = match detail {
                Detail::Single(_) => view
                    .first()
                    .map_or(Value::Null, |&item| Value::Record(self.snapshot(item))),
                Detail::Multi(_) => Value::Array(
                    view.iter()
                        .map(|&item| Value::Record(self.snapshot(item)))
                        .collect(),
                ),
            };
            record.insert(property.clone(), value);
        }
        record
    }

    /// Reacts to an event of the detail collection of `property`.
    pub(crate) fn on_detail_event(
        &mut self,
        parent: EntityId,
        property: &str,
        detail: CollectionId,
        event: &CollectionEvent,
    ) {
        let node = &self.entities[parent.0];
        if node.busy || matches!(node.status, Status::Invalid | Status::Deleted) {
            return;
        }
        if node.details.get(property).map(|d| d.collection()) != Some(detail) {
            warn!(entity = %parent, property, collection = %detail, "ignoring event of unknown detail");
            return;
        }
        let (item, index) = event.item().unzip();
        self.notify(
            parent,
            &EntityEvent::SubChange {
                property: property.to_owned(),
                event: event.kind(),
                item,
                index,
            },
        );
        self.refresh_detail(parent, property, detail);
    }

    /// Re-evaluates whether the detail of `property` is dirty and updates the parent's status.
    pub(crate) fn refresh_detail(&mut self, parent: EntityId, property: &str, detail: CollectionId) {
        let changed = self.collections[detail.0].is_changed();
        let node = &mut self.entities[parent.0];
        if node.busy {
            return;
        }
        if changed {
            node.dirty_details.insert(property.to_owned());
        } else {
            node.dirty_details.remove(property);
        }
        let old_status = node.status;
        if matches!(old_status, Status::Original | Status::Modified) {
            node.status = if node.is_clean() {
                Status::Original
            } else {
                Status::Modified
            };
        }
        let new_status = node.status;
        self.announce_transition(parent, old_status, new_status);
    }
}

/// Exclusive access to one entity of a [`UnitOfWork`].
pub struct EntityMut<'a> {
    uow: &'a mut UnitOfWork,
    id: EntityId,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(uow: &'a mut UnitOfWork, id: EntityId) -> Self {
        Self { uow, id }
    }

    fn node(&self) -> &EntityNode {
        &self.uow.entities[self.id.0]
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn status(&self) -> Status {
        self.node().status
    }

    /// Returns `true` if the entity is new, modified or deleted.
    pub fn is_changed(&self) -> bool {
        self.status().is_changed()
    }

    /// Reads a property.
    ///
    /// Reads are allowed in every state, including [`Status::Invalid`].
    pub fn get(&self, property: &str) -> Result<Option<Field<'_>>, TrackError> {
        self.uow.field(self.id, property)
    }

    /// Reads an opaque property.
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.node().source.get(property)
    }

    /// Writes a property.
    ///
    /// A write may not change the [`Shape`] of a property; an absent property counts as
    /// [`Shape::Opaque`]. In deep mode, writing a record to a nested record replaces the nested
    /// item, and writing an array of records is rejected: use the nested collection returned by
    /// [`EntityMut::detail`] instead.
    ///
    /// ```
    /// # use uowtrack::{UnitOfWork, Status, WriteOutcome, record};
    /// let mut uow = UnitOfWork::new();
    /// let id = uow.track(record! { "age" => 8 });
    /// let mut entity = uow.entity(id)?;
    ///
    /// assert_eq!(entity.set("age", 8)?, WriteOutcome::Unchanged);
    /// assert_eq!(entity.set("age", 9)?, WriteOutcome::Written);
    /// assert_eq!(entity.status(), Status::Modified);
    /// assert_eq!(entity.set("age", 8)?, WriteOutcome::Written);
    /// assert_eq!(entity.status(), Status::Original);
    /// # Ok::<(), uowtrack::TrackError>(())
    /// ```
    pub fn set(
        &mut self,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<WriteOutcome, TrackError> {
        self.uow.set_property(self.id, property, value.into())
    }

    /// Commits the entity: its current state becomes the baseline.
    pub fn apply(&mut self) -> Result<(), TrackError> {
        self.uow.apply_entity(self.id)
    }

    /// Rolls the entity back to its baseline.
    pub fn reset(&mut self) -> Result<(), TrackError> {
        self.uow.reset_entity(self.id)
    }

    /// Marks the entity for deletion, or discards it if it is [`Status::New`].
    pub fn delete(&mut self) -> Result<(), TrackError> {
        self.uow.delete_entity(self.id)
    }

    pub fn changes(&self) -> Result<Changes, TrackError> {
        self.uow.entity_changes(self.id)
    }

    /// A plain snapshot of the entity's current data.
    pub fn record(&self) -> Record {
        self.uow.snapshot(self.id)
    }

    /// The nested collection tracking `property`.
    ///
    /// It can always be read. Once the entity is deleted or discarded, every change to it fails
    /// with [`TrackError::InvalidState`].
    pub fn detail(&mut self, property: &str) -> Result<CollectionMut<'_>, TrackError> {
        let detail = self.uow.checked_detail(self.id, property)?;
        Ok(CollectionMut::new(&mut *self.uow, detail.collection()))
    }

    /// Runs `f` on the nested collection tracking `property`.
    pub fn in_detail<R>(
        &mut self,
        property: &str,
        f: impl FnOnce(&mut CollectionMut<'_>) -> Result<R, TrackError>,
    ) -> Result<R, TrackError> {
        let mut detail = self.detail(property)?;
        f(&mut detail)
    }

    /// The live entity tracking the nested record `property`, if there is one.
    pub fn child(&mut self, property: &str) -> Result<Option<EntityMut<'_>>, TrackError> {
        match self.uow.checked_detail(self.id, property)? {
            Detail::Single(detail) => {
                let item = self.uow.collections[detail.0].view.first().copied();
                Ok(item.map(|item| EntityMut::new(&mut *self.uow, item)))
            }
            Detail::Multi(_) => Err(TrackError::TypeShapeViolation {
                property: property.to_owned(),
                from: Shape::Records,
                to: Shape::Record,
            }),
        }
    }

    /// Subscribes `listener` to events of `kind`.
    pub fn on(
        &mut self,
        kind: EntityEventKind,
        listener: impl FnMut(EntityId, &EntityEvent) + 'static,
    ) -> ListenerId {
        let id = self.uow.next_listener_id();
        self.uow.entities[self.id.0]
            .listeners
            .add(id, kind, Box::new(listener));
        id
    }

    /// Unsubscribes the listener `id`, or every listener of `kind` if `id` is `None`.
    ///
    /// Returns how many listeners were removed.
    pub fn off(&mut self, kind: EntityEventKind, id: Option<ListenerId>) -> usize {
        self.uow.entities[self.id.0].listeners.remove(kind, id)
    }
}

impl fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMut")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("record", &self.record())
            .finish()
    }
}
