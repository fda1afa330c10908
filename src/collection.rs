// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Tracking of an ordered collection of records.
//!
//! A collection owns one entity per item and keeps three orderings of them: the current *view*,
//! the *baseline* order captured at the last commit, and every attached member (live items plus
//! pending deletions). It follows the lifecycle transitions of its items to keep the
//! added/deleted/modified counters and the view in sync, so deleting or rolling back an item
//! through the item itself has the same effect as doing it through the collection.
use crate::{
    CollectionEvent, CollectionEventKind, CollectionId, EntityEvent, EntityId, ListenerId,
    Record, Status, TrackError, UnitOfWork,
    entity::{Detail, EntityMut},
    event::{CollectionListener, Listeners},
    metadata::{ItemReport, Metadata},
};
use ahash::RandomState;
use std::{collections::HashMap, fmt};
use tracing::{debug, trace};

pub(crate) struct CollectionNode {
    pub(crate) view: Vec<EntityId>,
    pub(crate) baseline: Vec<EntityId>,
    /// Live items and pending deletions, in attach order.
    pub(crate) members: Vec<EntityId>,
    /// Position of each item at attach time or at the last commit.
    pub(crate) original_index: HashMap<EntityId, usize, RandomState>,
    pub(crate) added: usize,
    pub(crate) deleted: usize,
    pub(crate) modified: usize,
    applying: bool,
    resetting: bool,
    cleaning: bool,
    pub(crate) parent: Option<(EntityId, String)>,
    pub(crate) listeners: Listeners<CollectionEventKind, CollectionListener>,
}

impl CollectionNode {
    pub(crate) fn new(parent: Option<(EntityId, String)>) -> Self {
        Self {
            view: Vec::new(),
            baseline: Vec::new(),
            members: Vec::new(),
            original_index: crate::create_map(),
            added: 0,
            deleted: 0,
            modified: 0,
            applying: false,
            resetting: false,
            cleaning: false,
            parent,
            listeners: Listeners::default(),
        }
    }

    /// Makes `items` the view, the baseline and the full member list, with clean counters.
    pub(crate) fn rebase(&mut self, items: Vec<EntityId>) {
        self.original_index.clear();
        self.original_index
            .extend(items.iter().enumerate().map(|(index, &id)| (id, index)));
        self.view = items.clone();
        self.baseline = items.clone();
        self.members = items;
        self.added = 0;
        self.deleted = 0;
        self.modified = 0;
    }

    pub(crate) fn forget(&mut self, id: EntityId) {
        self.view.retain(|&item| item != id);
        self.baseline.retain(|&item| item != id);
        self.members.retain(|&item| item != id);
        self.original_index.remove(&id);
    }

    pub(crate) fn is_changed(&self) -> bool {
        self.added + self.deleted + self.modified > 0
    }

    fn position(&self, id: EntityId) -> Option<usize> {
        self.view.iter().position(|&item| item == id)
    }

    fn remove(&mut self, id: EntityId) -> Option<usize> {
        let index = self.position(id)?;
        self.view.remove(index);
        Some(index)
    }
}

/// Addresses one item of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A position in the current view.
    Index(usize),
    /// An attached item, live or pending deletion.
    Entity(EntityId),
}

impl From<usize> for Target {
    fn from(index: usize) -> Self {
        Target::Index(index)
    }
}

impl From<EntityId> for Target {
    fn from(id: EntityId) -> Self {
        Target::Entity(id)
    }
}

impl UnitOfWork {
    fn resolve(&self, collection: CollectionId, target: Target) -> Result<EntityId, TrackError> {
        let node = self.coll(collection)?;
        match target {
            Target::Index(index) => node.view.get(index).copied().ok_or(TrackError::OutOfRange {
                index,
                len: node.view.len(),
            }),
            Target::Entity(id) => {
                self.node(id)?;
                if node.members.contains(&id) {
                    Ok(id)
                } else {
                    Err(TrackError::NotTracked(id))
                }
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but only items live in the view qualify.
    fn resolve_live(
        &self,
        collection: CollectionId,
        target: Target,
    ) -> Result<EntityId, TrackError> {
        let id = self.resolve(collection, target)?;
        if self.coll(collection)?.view.contains(&id) {
            Ok(id)
        } else {
            Err(TrackError::NotTracked(id))
        }
    }

    /// Refuses changes to a detail whose parent entity is deleted or discarded.
    ///
    /// The parent's own cascades run while it is busy and pass.
    fn check_parent(&self, collection: CollectionId) -> Result<(), TrackError> {
        let Some((parent, _)) = &self.coll(collection)?.parent else {
            return Ok(());
        };
        let node = &self.entities[parent.0];
        match node.status {
            Status::Deleted | Status::Invalid if !node.busy => Err(TrackError::InvalidState {
                status: node.status,
                operation: "write",
            }),
            _ => Ok(()),
        }
    }

    /// Returns `true` if `collection` holds the nested record of its parent.
    fn is_single(&self, collection: CollectionId) -> bool {
        let Some((parent, property)) = &self.collections[collection.0].parent else {
            return false;
        };
        self.entities[parent.0].details.get(property) == Some(&Detail::Single(collection))
    }

    /// A nested record has room for one live item.
    fn check_room(&self, collection: CollectionId) -> Result<(), TrackError> {
        if self.is_single(collection) && !self.collections[collection.0].view.is_empty() {
            return Err(TrackError::IllegalDirectWrite {
                operation: "adding to a nested record",
            });
        }
        Ok(())
    }

    /// Checks that rolling back the deletion of `id` does not crowd its collection.
    pub(crate) fn check_restore(&self, id: EntityId) -> Result<(), TrackError> {
        match self.entities[id.0].owner {
            Some(owner) if !self.collections[owner.0].resetting => self.check_room(owner),
            _ => Ok(()),
        }
    }

    fn insertion_index(
        &self,
        collection: CollectionId,
        index: Option<usize>,
    ) -> Result<usize, TrackError> {
        let len = self.coll(collection)?.view.len();
        match index {
            None => Ok(len),
            Some(index) if index <= len => Ok(index),
            Some(index) => Err(TrackError::OutOfRange { index, len }),
        }
    }

    pub(crate) fn collection_add(
        &mut self,
        collection: CollectionId,
        record: Record,
        index: Option<usize>,
    ) -> Result<EntityId, TrackError> {
        let index = self.insertion_index(collection, index)?;
        self.check_parent(collection)?;
        self.check_room(collection)?;
        let id = self.insert_entity(record, Status::New, Some(collection));
        self.link(collection, id, index);
        Ok(id)
    }

    pub(crate) fn collection_attach(
        &mut self,
        collection: CollectionId,
        id: EntityId,
        index: Option<usize>,
    ) -> Result<(), TrackError> {
        let index = self.insertion_index(collection, index)?;
        let node = self.node(id)?;
        if node.owner.is_some() || self.is_ancestor(id, collection) {
            return Err(TrackError::DuplicateTracking(id));
        }
        if node.status != Status::New {
            return Err(TrackError::InvalidState {
                status: node.status,
                operation: "attach",
            });
        }
        self.check_parent(collection)?;
        self.check_room(collection)?;
        self.entities[id.0].owner = Some(collection);
        self.link(collection, id, index);
        Ok(())
    }

    /// Returns `true` if `collection` is nested, at any depth, inside `id`.
    fn is_ancestor(&self, id: EntityId, collection: CollectionId) -> bool {
        let mut current = Some(collection);
        while let Some(collection) = current {
            let Some((parent, _)) = &self.collections[collection.0].parent else {
                return false;
            };
            if *parent == id {
                return true;
            }
            current = self.entities[parent.0].owner;
        }
        false
    }

    fn link(&mut self, collection: CollectionId, id: EntityId, index: usize) {
        let node = &mut self.collections[collection.0];
        node.view.insert(index, id);
        node.members.push(id);
        node.original_index.insert(id, index);
        node.added += 1;
        trace!(%collection, entity = %id, index, "item added");
        self.emit(collection, CollectionEvent::Add { item: id, index });
    }

    pub(crate) fn collection_delete(
        &mut self,
        collection: CollectionId,
        target: Target,
    ) -> Result<EntityId, TrackError> {
        self.check_parent(collection)?;
        let id = self.resolve_live(collection, target)?;
        self.delete_entity(id)?;
        Ok(id)
    }

    pub(crate) fn collection_apply_item(
        &mut self,
        collection: CollectionId,
        target: Target,
    ) -> Result<EntityId, TrackError> {
        self.check_parent(collection)?;
        let id = self.resolve(collection, target)?;
        self.apply_entity(id)?;
        Ok(id)
    }

    pub(crate) fn collection_reset_item(
        &mut self,
        collection: CollectionId,
        target: Target,
    ) -> Result<EntityId, TrackError> {
        self.check_parent(collection)?;
        let id = self.resolve(collection, target)?;
        self.reset_entity(id)?;
        Ok(id)
    }

    /// Commits every item; the current view becomes the baseline.
    pub(crate) fn collection_apply(&mut self, collection: CollectionId) -> Result<(), TrackError> {
        self.check_parent(collection)?;
        let node = &mut self.collections[collection.0];
        node.applying = true;
        let members = node.members.clone();
        let result = members.into_iter().try_for_each(|id| self.apply_entity(id));
        let node = &mut self.collections[collection.0];
        node.applying = false;
        result?;

        let view = node.view.clone();
        node.rebase(view);
        debug!(%collection, items = node.view.len(), "applied collection");
        self.emit(collection, CollectionEvent::Apply);
        Ok(())
    }

    /// Rolls every item back; the view returns to the baseline order.
    pub(crate) fn collection_reset(&mut self, collection: CollectionId) -> Result<(), TrackError> {
        self.check_parent(collection)?;
        let node = &mut self.collections[collection.0];
        node.resetting = true;
        let members = node.members.clone();
        let result = members.into_iter().try_for_each(|id| self.reset_entity(id));
        let node = &mut self.collections[collection.0];
        node.resetting = false;
        result?;

        let baseline = node.baseline.clone();
        node.rebase(baseline);
        debug!(%collection, items = node.view.len(), "reset collection");
        self.emit(collection, CollectionEvent::Reset);
        Ok(())
    }

    /// Deletes every live item at once.
    pub(crate) fn collection_clean(&mut self, collection: CollectionId) -> Result<(), TrackError> {
        self.check_parent(collection)?;
        let node = &mut self.collections[collection.0];
        node.cleaning = true;
        let live = node.view.clone();
        let result = live.into_iter().try_for_each(|id| self.delete_entity(id));
        let node = &mut self.collections[collection.0];
        node.cleaning = false;
        result?;

        node.view.clear();
        debug!(%collection, deleted = node.deleted, "cleaned collection");
        self.emit(collection, CollectionEvent::Clean);
        Ok(())
    }

    /// Discards every item and starts over with `records` as the baseline.
    pub(crate) fn collection_load(
        &mut self,
        collection: CollectionId,
        records: Vec<Record>,
    ) -> Result<(), TrackError> {
        self.check_parent(collection)?;
        let members = self.coll(collection)?.members.clone();
        for id in members {
            self.entities[id.0].status = Status::Invalid;
            self.detach(id);
        }
        let items: Vec<EntityId> = records
            .into_iter()
            .map(|record| self.insert_entity(record, Status::Original, Some(collection)))
            .collect();
        self.collections[collection.0].rebase(items);
        debug!(%collection, items = self.collections[collection.0].view.len(), "loaded collection");
        self.emit(collection, CollectionEvent::Load);
        Ok(())
    }

    /// Live items in view order, then pending deletions in their original order.
    pub(crate) fn collection_metadata(&self, collection: CollectionId) -> Metadata {
        let node = &self.collections[collection.0];
        let mut pending: Vec<EntityId> = node
            .members
            .iter()
            .copied()
            .filter(|id| self.entities[id.0].status == Status::Deleted)
            .collect();
        pending.sort_by_key(|id| node.original_index.get(id).copied().unwrap_or(usize::MAX));

        let mut metadata = Metadata::default();
        for id in node.view.iter().copied().chain(pending) {
            let report = ItemReport {
                entity: id,
                item: self.snapshot(id),
                changes: self.changes_of(id),
            };
            match self.entities[id.0].status {
                Status::New => metadata.added.push(report),
                Status::Modified => metadata.modified.push(report),
                Status::Deleted => metadata.deleted.push(report),
                Status::Original => metadata.original.push(report),
                Status::Invalid => {}
            }
        }
        metadata
    }

    /// Keeps the collection in sync with a lifecycle transition of one of its items.
    pub(crate) fn on_item_event(&mut self, collection: CollectionId, item: EntityId, event: &EntityEvent) {
        let node = &mut self.collections[collection.0];
        // bulk operations do their own bookkeeping once they are done
        let bulk = node.applying || node.resetting;
        let cleaning = node.cleaning;
        trace!(%collection, entity = %item, event = ?event.kind(), "item event");

        match *event {
            EntityEvent::Changing(_) => {}
            EntityEvent::Change { .. } | EntityEvent::SubChange { .. } => {
                if let Some(index) = node.position(item) {
                    self.emit(collection, CollectionEvent::Change { item, index });
                }
            }
            EntityEvent::Modify => {
                node.modified += 1;
                self.refresh_parent(collection);
            }
            EntityEvent::Reset { .. } if bulk => {}
            EntityEvent::Reset { old_status } => match old_status {
                Status::New => {
                    node.added = node.added.saturating_sub(1);
                    match node.remove(item) {
                        Some(index) => self.emit(collection, CollectionEvent::Delete { item, index }),
                        None => self.refresh_parent(collection),
                    }
                }
                Status::Modified => {
                    node.modified = node.modified.saturating_sub(1);
                    match node.position(item) {
                        Some(index) => self.emit(collection, CollectionEvent::Change { item, index }),
                        None => self.refresh_parent(collection),
                    }
                }
                Status::Deleted => {
                    node.deleted = node.deleted.saturating_sub(1);
                    let original = node.original_index.get(&item).copied().unwrap_or(usize::MAX);
                    let index = original.min(node.view.len());
                    node.view.insert(index, item);
                    self.emit(collection, CollectionEvent::Add { item, index });
                }
                Status::Original | Status::Invalid => {}
            },
            EntityEvent::Apply { .. } if bulk => {}
            EntityEvent::Apply { old_status } => {
                match old_status {
                    Status::New => {
                        node.added = node.added.saturating_sub(1);
                        // enter the baseline right before the next committed item
                        let next = node.position(item).and_then(|index| {
                            node.view[index + 1..]
                                .iter()
                                .find_map(|id| node.baseline.iter().position(|b| b == id))
                        });
                        let index = next.unwrap_or(node.baseline.len());
                        node.baseline.insert(index, item);
                        node.original_index.insert(item, index);
                    }
                    Status::Modified => node.modified = node.modified.saturating_sub(1),
                    Status::Deleted => {
                        node.deleted = node.deleted.saturating_sub(1);
                        node.baseline.retain(|&id| id != item);
                    }
                    Status::Original | Status::Invalid => {}
                }
                self.refresh_parent(collection);
            }
            EntityEvent::Delete { old_status } => {
                match old_status {
                    Status::New => node.added = node.added.saturating_sub(1),
                    Status::Modified => {
                        node.modified = node.modified.saturating_sub(1);
                        node.deleted += 1;
                    }
                    Status::Original => node.deleted += 1,
                    Status::Deleted | Status::Invalid => {}
                }
                // a clean empties the view and reports once for all items
                if cleaning {
                    return;
                }
                match node.remove(item) {
                    Some(index) => self.emit(collection, CollectionEvent::Delete { item, index }),
                    None => self.refresh_parent(collection),
                }
            }
        }
    }

    /// Lets the parent entity of a nested collection re-evaluate its status.
    fn refresh_parent(&mut self, collection: CollectionId) {
        if let Some((parent, property)) = self.collections[collection.0].parent.clone() {
            self.refresh_detail(parent, &property, collection);
        }
    }
}

/// Exclusive access to one collection of a [`UnitOfWork`].
pub struct CollectionMut<'a> {
    uow: &'a mut UnitOfWork,
    id: CollectionId,
}

impl<'a> CollectionMut<'a> {
    pub(crate) fn new(uow: &'a mut UnitOfWork, id: CollectionId) -> Self {
        Self { uow, id }
    }

    fn node(&self) -> &CollectionNode {
        &self.uow.collections[self.id.0]
    }

    pub fn id(&self) -> CollectionId {
        self.id
    }

    /// Number of live items.
    pub fn count(&self) -> usize {
        self.node().view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node().view.is_empty()
    }

    /// The live items, in order.
    pub fn items(&self) -> &[EntityId] {
        &self.node().view
    }

    /// The item at `index`.
    pub fn item(&self, index: usize) -> Option<EntityId> {
        self.node().view.get(index).copied()
    }

    /// Borrows the item at `index`.
    pub fn entity(&mut self, index: usize) -> Result<EntityMut<'_>, TrackError> {
        let id = self.uow.resolve(self.id, Target::Index(index))?;
        Ok(EntityMut::new(&mut *self.uow, id))
    }

    pub fn added_count(&self) -> usize {
        self.node().added
    }

    pub fn deleted_count(&self) -> usize {
        self.node().deleted
    }

    pub fn modified_count(&self) -> usize {
        self.node().modified
    }

    /// Returns `true` if any item was added, deleted or modified since the last commit.
    pub fn is_changed(&self) -> bool {
        self.node().is_changed()
    }

    /// Inserts a new item at `index`, or at the end if `index` is `None`. Nested records of the
    /// item are new as well.
    ///
    /// Fails with [`TrackError::InvalidState`] if the collection is the detail of a deleted or
    /// discarded entity, and with [`TrackError::IllegalDirectWrite`] if it already holds the
    /// nested record of its entity.
    pub fn add(&mut self, record: Record, index: Option<usize>) -> Result<EntityId, TrackError> {
        self.uow.collection_add(self.id, record, index)
    }

    /// Appends a new item.
    pub fn push(&mut self, record: Record) -> Result<EntityId, TrackError> {
        self.uow.collection_add(self.id, record, None)
    }

    /// Appends a new item per record, stopping at the first failure.
    pub fn extend(
        &mut self,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Vec<EntityId>, TrackError> {
        records.into_iter().map(|record| self.push(record)).collect()
    }

    /// Inserts an entity created with [`UnitOfWork::track_new`].
    pub fn attach(&mut self, id: EntityId, index: Option<usize>) -> Result<(), TrackError> {
        self.uow.collection_attach(self.id, id, index)
    }

    /// Deletes an item. A new item is discarded, any other one is kept as a pending deletion.
    pub fn delete(&mut self, target: impl Into<Target>) -> Result<EntityId, TrackError> {
        self.uow.collection_delete(self.id, target.into())
    }

    /// Commits every item.
    pub fn apply(&mut self) -> Result<(), TrackError> {
        self.uow.collection_apply(self.id)
    }

    /// Commits a single item.
    pub fn apply_item(&mut self, target: impl Into<Target>) -> Result<EntityId, TrackError> {
        self.uow.collection_apply_item(self.id, target.into())
    }

    /// Rolls every item back and restores the baseline order.
    pub fn reset(&mut self) -> Result<(), TrackError> {
        self.uow.collection_reset(self.id)
    }

    /// Rolls a single item back.
    ///
    /// A rolled back deletion returns to the position the item had at the last commit, or to
    /// the end if the collection has shrunk below that position since.
    pub fn reset_item(&mut self, target: impl Into<Target>) -> Result<EntityId, TrackError> {
        self.uow.collection_reset_item(self.id, target.into())
    }

    /// Deletes every live item.
    pub fn clean(&mut self) -> Result<(), TrackError> {
        self.uow.collection_clean(self.id)
    }

    /// Discards all tracking state and starts over with `records` as the baseline.
    pub fn load(&mut self, records: Vec<Record>) -> Result<(), TrackError> {
        self.uow.collection_load(self.id, records)
    }

    /// Always fails: items are inserted and removed with [`add`](Self::add) and
    /// [`delete`](Self::delete) only.
    pub fn splice(
        &mut self,
        _index: usize,
        _delete_count: usize,
        _records: Vec<Record>,
    ) -> Result<(), TrackError> {
        Err(TrackError::IllegalDirectWrite {
            operation: "splice",
        })
    }

    pub fn metadata(&self) -> Metadata {
        self.uow.collection_metadata(self.id)
    }

    /// Plain snapshots of the live items.
    pub fn records(&self) -> Vec<Record> {
        self.node()
            .view
            .iter()
            .map(|&id| self.uow.snapshot(id))
            .collect()
    }

    /// Subscribes `listener` to events of `kind`.
    pub fn on(
        &mut self,
        kind: CollectionEventKind,
        listener: impl FnMut(CollectionId, &CollectionEvent) + 'static,
    ) -> ListenerId {
        let id = self.uow.next_listener_id();
        self.uow.collections[self.id.0]
            .listeners
            .add(id, kind, Box::new(listener));
        id
    }

    /// Unsubscribes the listener `id`, or every listener of `kind` if `id` is `None`.
    pub fn off(&mut self, kind: CollectionEventKind, id: Option<ListenerId>) -> usize {
        self.uow.collections[self.id.0].listeners.remove(kind, id)
    }
}

impl fmt::Debug for CollectionMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node();
        f.debug_struct("CollectionMut")
            .field("id", &self.id)
            .field("items", &node.view)
            .field("added", &node.added)
            .field("deleted", &node.deleted)
            .field("modified", &node.modified)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record, records};

    fn names(collection: &CollectionMut<'_>) -> Vec<String> {
        collection
            .records()
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_owned())
            .collect()
    }

    #[test]
    fn add_rejects_out_of_range() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }]);
        let mut collection = uow.collection(c).unwrap();
        assert_eq!(
            collection.add(record! { "name" => "B" }, Some(2)),
            Err(TrackError::OutOfRange { index: 2, len: 1 })
        );
        collection.add(record! { "name" => "B" }, Some(0)).unwrap();
        assert_eq!(names(&collection), ["B", "A"]);
        assert_eq!(collection.added_count(), 1);
    }

    #[test]
    fn deleting_a_new_item_discards_it() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }]);
        let mut collection = uow.collection(c).unwrap();
        let b = collection.push(record! { "name" => "B" }).unwrap();
        collection.delete(b).unwrap();

        assert_eq!(collection.count(), 1);
        assert_eq!(collection.added_count(), 0);
        assert_eq!(collection.deleted_count(), 0);
        assert!(!collection.is_changed());
        assert_eq!(uow.status(b), Ok(Status::Invalid));
        assert_eq!(uow.owner(b), Ok(None));
    }

    #[test]
    fn reset_item_clamps_restored_position() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }, { "name" => "B" }, { "name" => "C" }]);
        let mut collection = uow.collection(c).unwrap();
        let a = collection.delete(0usize).unwrap();
        let b = collection.delete(0usize).unwrap();
        let c = collection.delete(0usize).unwrap();
        assert!(collection.is_empty());

        // C was at index 2, but the view is empty now
        collection.reset_item(c).unwrap();
        assert_eq!(names(&collection), ["C"]);
        collection.reset_item(a).unwrap();
        assert_eq!(names(&collection), ["A", "C"]);
        collection.reset_item(b).unwrap();
        assert_eq!(names(&collection), ["A", "B", "C"]);
        assert!(!collection.is_changed());
    }

    #[test]
    fn single_item_apply_updates_baseline() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }, { "name" => "B" }]);
        let mut collection = uow.collection(c).unwrap();
        let x = collection.add(record! { "name" => "X" }, Some(1)).unwrap();
        collection.delete(0usize).unwrap();
        collection.apply_item(x).unwrap();
        assert_eq!(collection.added_count(), 0);
        assert_eq!(collection.deleted_count(), 1);

        collection.reset().unwrap();
        assert_eq!(names(&collection), ["A", "X", "B"]);
    }

    #[test]
    fn committed_deletions_leave_for_good() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }, { "name" => "B" }]);
        let mut collection = uow.collection(c).unwrap();
        let a = collection.delete(0usize).unwrap();
        collection.apply_item(a).unwrap();
        assert_eq!(collection.deleted_count(), 0);
        assert_eq!(
            collection.reset_item(a),
            Err(TrackError::NotTracked(a))
        );
        collection.reset().unwrap();
        assert_eq!(names(&collection), ["B"]);
    }

    #[test]
    fn attach_checks_ownership_and_status() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }]);
        let other = uow.track_list(records![]);
        let fresh = uow.track_new(record! { "name" => "N" });
        let existing = uow.track(record! { "name" => "E" });

        let mut collection = uow.collection(c).unwrap();
        assert_eq!(
            collection.attach(existing, None),
            Err(TrackError::InvalidState {
                status: Status::Original,
                operation: "attach",
            })
        );
        collection.attach(fresh, Some(0)).unwrap();
        assert_eq!(collection.added_count(), 1);

        let mut other = uow.collection(other).unwrap();
        assert_eq!(
            other.attach(fresh, None),
            Err(TrackError::DuplicateTracking(fresh))
        );
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut uow = UnitOfWork::new();
        let parent = uow.track_new(record! { "children" => records![] });
        let mut entity = uow.entity(parent).unwrap();
        let children = entity.detail("children").unwrap().id();
        let mut children = uow.collection(children).unwrap();
        assert_eq!(
            children.attach(parent, None),
            Err(TrackError::DuplicateTracking(parent))
        );
    }

    #[test]
    fn clean_deletes_everything_at_once() {
        use std::{cell::RefCell, rc::Rc};

        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }, { "name" => "B" }]);
        let mut collection = uow.collection(c).unwrap();
        collection.push(record! { "name" => "C" }).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in [CollectionEventKind::Delete, CollectionEventKind::Clean] {
            let seen = Rc::clone(&seen);
            collection.on(kind, move |_, event| seen.borrow_mut().push(event.kind()));
        }
        collection.clean().unwrap();

        assert!(collection.is_empty());
        assert_eq!(*seen.borrow(), [CollectionEventKind::Clean]);
        assert_eq!(collection.added_count(), 0);
        assert_eq!(collection.deleted_count(), 2);
        assert_eq!(collection.metadata().deleted.len(), 2);

        collection.reset().unwrap();
        assert_eq!(names(&collection), ["A", "B"]);
    }

    #[test]
    fn load_starts_over() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }]);
        let mut collection = uow.collection(c).unwrap();
        let old = collection.item(0).unwrap();
        collection.push(record! { "name" => "B" }).unwrap();
        collection.load(records![{ "name" => "X" }, { "name" => "Y" }]).unwrap();

        assert!(!collection.is_changed());
        assert_eq!(names(&collection), ["X", "Y"]);
        assert_eq!(collection.metadata().original.len(), 2);
        assert_eq!(uow.status(old), Ok(Status::Invalid));
    }

    #[test]
    fn splice_is_rejected() {
        let mut uow = UnitOfWork::new();
        let c = uow.track_list(records![{ "name" => "A" }]);
        let mut collection = uow.collection(c).unwrap();
        assert_eq!(
            collection.splice(0, 1, vec![]),
            Err(TrackError::IllegalDirectWrite {
                operation: "splice"
            })
        );
        assert_eq!(collection.count(), 1);
    }
}
